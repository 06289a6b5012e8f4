// Service commands
pub mod clean;
pub mod deploy;
pub mod lifecycle;
pub mod precheck;
pub mod status;
pub mod upgrade;

// Ad-hoc access
pub mod enter;
pub mod exec;

// Other record kinds
pub mod client;
pub mod hosts;
pub mod monitor;

pub mod audit;

use crate::config::Settings;
use crate::error::CancelledByUser;
use crate::progress::TerminalProgress;
use crate::tasks::ClusterTaskBuilder;
use crate::ui;
use anyhow::{Context as _, Result, bail};
use dialoguer::Confirm;
use playbook::{NoProgress, Playbook, PlaybookReport, SharedContext};
use std::path::PathBuf;
use topology::{DeployConfig, FilterOptions, HostDirectory, Topology, filter_configs};

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
    pub yes: bool,
    pub hosts_path: PathBuf,
    pub topology_path: PathBuf,
    pub settings: Settings,
}

impl Context {
    pub fn load_hosts(&self) -> Result<HostDirectory> {
        HostDirectory::load(&self.hosts_path)
            .with_context(|| format!("Failed to load hosts from {}", self.hosts_path.display()))
    }

    pub fn load_topology(&self) -> Result<Topology> {
        Topology::load(&self.topology_path).with_context(|| {
            format!("Failed to load topology from {}", self.topology_path.display())
        })
    }

    pub fn task_builder(&self, hosts: HostDirectory) -> ClusterTaskBuilder {
        ClusterTaskBuilder::new(hosts, self.settings.ssh_connect_timeout())
    }

    /// Tasks in flight per step
    pub fn concurrency(&self) -> usize {
        self.settings.execution.parallelism
    }
}

/// Deploy records matching `options`; an empty selection is an error
pub fn select(topology: &Topology, options: &FilterOptions) -> Result<Vec<DeployConfig>> {
    let configs = filter_configs(topology.deploy_configs(), options);
    if configs.is_empty() {
        bail!("No service matches the given id/role/host");
    }
    log::debug!("{} service(s) selected", configs.len());
    Ok(configs)
}

/// Ask before touching the cluster; `--yes` answers for the user
pub fn confirm(ctx: &Context, prompt: &str) -> Result<bool> {
    if ctx.yes {
        return Ok(true);
    }
    Confirm::new()
        .with_prompt(prompt)
        .default(true)
        .interact()
        .context("Failed to read confirmation")
}

/// Confirm (when `prompt` is given), then run the playbook.
///
/// Declining runs only the post steps and fails with [`CancelledByUser`].
pub fn execute(
    ctx: &Context,
    playbook: &Playbook,
    builder: &ClusterTaskBuilder,
    prompt: Option<&str>,
) -> Result<PlaybookReport> {
    let shared = SharedContext::global();
    if let Some(prompt) = prompt
        && !confirm(ctx, prompt)?
    {
        playbook.run_post_steps(builder, shared, &NoProgress);
        return Err(CancelledByUser.into());
    }

    let progress = TerminalProgress::new(ctx.quiet);
    Ok(playbook.run(builder, shared, &progress))
}

/// [`execute`], then print every failed task and surface the first error
pub fn run_playbook(
    ctx: &Context,
    playbook: &Playbook,
    builder: &ClusterTaskBuilder,
    prompt: Option<&str>,
    what: &str,
) -> Result<PlaybookReport> {
    let report = execute(ctx, playbook, builder, prompt)?;
    print_failures(ctx, &report);
    report.into_result().with_context(|| format!("{what} failed"))
}

/// One line per failed task, with remote output under `-v`
pub fn print_failures(ctx: &Context, report: &PlaybookReport) {
    for step in &report.steps {
        for result in &step.results {
            let Some(err) = result.error() else {
                continue;
            };
            ui::error(&format!("{} on {}: {}", step.kind.description(), result.host, err.message));
            if ctx.verbose > 0 && !err.output.is_empty() {
                for line in err.output.lines() {
                    ui::dim(line);
                }
            }
        }
    }
}
