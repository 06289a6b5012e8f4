use super::{Context, run_playbook};
use crate::cli::HostsCommand;
use crate::ui;
use anyhow::{Context as _, Result, bail};
use playbook::{AggregateError, ErrorCode, NoProgress, Playbook, SharedContext, Step, StepKind};
use playbook::{Task, TaskError, stream_tasks};
use std::path::Path;
use topology::{ConfigRecord, FilterOptions, HostDirectory, filter_configs};

pub fn run(ctx: &Context, cmd: &HostsCommand) -> Result<()> {
    match cmd {
        HostsCommand::Check => check(ctx),
        HostsCommand::List => list(ctx),
        HostsCommand::Copy {
            source,
            destination,
            host,
        } => copy(ctx, source, destination, host),
    }
}

fn check(ctx: &Context) -> Result<()> {
    let hosts = ctx.load_hosts()?;
    let count = hosts.len();
    let targets = hosts.as_generic_configs();
    let builder = ctx.task_builder(hosts);

    let mut playbook = Playbook::new();
    playbook.add_step(
        Step::new(StepKind::CheckSshConnect, targets)
            .concurrency(ctx.concurrency())
            .skip_error(true),
    );
    run_playbook(ctx, &playbook, &builder, None, "Host check")?;

    if !ctx.quiet {
        ui::success(&format!("All {count} host(s) reachable"));
    }
    Ok(())
}

fn list(ctx: &Context) -> Result<()> {
    let hosts = ctx.load_hosts()?;
    ui::table(&["Host", "Hostname", "User", "Port", "Key"], &rows(&hosts));
    Ok(())
}

fn rows(hosts: &HostDirectory) -> Vec<Vec<String>> {
    hosts
        .iter()
        .map(|h| {
            vec![
                h.host.clone(),
                h.hostname.clone(),
                h.become_user
                    .as_ref()
                    .map_or_else(|| h.user.clone(), |b| format!("{} (as {b})", h.user)),
                h.ssh_port.to_string(),
                h.private_key_file.clone().unwrap_or_else(|| "-".to_string()),
            ]
        })
        .collect()
}

fn copy(ctx: &Context, source: &Path, destination: &str, host: &str) -> Result<()> {
    if !source.is_file() {
        bail!("{} is not a file", source.display());
    }
    let hosts = ctx.load_hosts()?;
    let targets = filter_configs(&hosts.as_generic_configs(), &FilterOptions::default().host(host));
    if targets.is_empty() {
        bail!("No host matches '{host}'");
    }
    let builder = ctx.task_builder(hosts);

    let mut tasks = Vec::with_capacity(targets.len());
    for target in &targets {
        let remote = builder.remote(target.host())?;
        let source = source.to_path_buf();
        let destination = destination.to_string();
        tasks.push(Task::new("Copy", target.host(), move |_: &playbook::TaskContext<'_>| {
            let output = remote
                .copy(&source, &destination)
                .map_err(|e| TaskError::new(ErrorCode::SshConnectFailed, format!("scp: {e}")))?;
            if output.success() {
                Ok(destination.clone())
            } else {
                Err(TaskError::new(ErrorCode::CopyFailed, format!("exit status {}", output.status))
                    .with_output(output.combined()))
            }
        }));
    }

    let mut failures = Vec::new();
    stream_tasks(&tasks, SharedContext::global(), &NoProgress, |result| match result.error() {
        None => ui::success(&format!("{}:{}", result.host, result.output())),
        Some(err) => {
            ui::error(&format!("{}: {}", result.host, err.message));
            failures.push(err.clone());
        }
    });

    if !failures.is_empty() {
        return Err(playbook::Error::from(AggregateError::new(failures)))
            .context("Copy failed on some hosts");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::tests::HOSTS;

    #[test]
    fn test_rows() {
        let hosts = HostDirectory::parse(HOSTS).unwrap();
        let rows = rows(&hosts);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], vec!["local", "127.0.0.1", "curve", "22", "-"]);
    }
}
