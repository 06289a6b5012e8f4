use super::{Context, run_playbook, select};
use crate::cli::FilterArgs;
use crate::tasks::{OPTION_POOL_TOPOLOGY, pool_topology};
use crate::ui;
use anyhow::{Context as _, Result};
use playbook::{Playbook, Step, StepKind};
use serde_json::Value;
use topology::{DeployConfig, Role, Topology};

const SERVICE_STEPS: [StepKind; 4] = [
    StepKind::PullImage,
    StepKind::CreateContainer,
    StepKind::SyncConfig,
    StepKind::StartService,
];

const BOOTSTRAP_STEPS: [StepKind; 3] = [
    StepKind::CreatePhysicalPool,
    StepKind::CreateLogicalPool,
    StepKind::BalanceLeader,
];

pub fn run(ctx: &Context, filter: &FilterArgs) -> Result<()> {
    let topology = ctx.load_topology()?;
    let options = filter.options();
    let configs = select(&topology, &options)?;
    let hosts = ctx.load_hosts()?;

    // pools are created only when the whole cluster is deployed
    let pools = if options.is_wildcard() {
        Some(pool_topology(topology.deploy_configs(), &hosts).context("Failed to lay out pools")?)
    } else {
        None
    };

    let playbook = build(&topology, &configs, pools, ctx.concurrency());
    let builder = ctx.task_builder(hosts);
    let prompt = format!("Deploy {} service(s) of the {} cluster?", configs.len(), topology.kind);
    let report = run_playbook(ctx, &playbook, &builder, Some(&prompt), "Deploy")?;

    if !ctx.quiet {
        ui::success(&format!("Deployed {} service(s)", report.by_service().len()));
    }
    Ok(())
}

/// Service steps role by role in bring-up order, then pool bootstrap
fn build(
    topology: &Topology,
    configs: &[DeployConfig],
    pools: Option<Value>,
    concurrency: usize,
) -> Playbook {
    let mut playbook = Playbook::new();
    for role in topology.kind.roles() {
        let of_role: Vec<DeployConfig> = configs.iter().filter(|c| c.role == *role).cloned().collect();
        if of_role.is_empty() {
            continue;
        }
        for kind in SERVICE_STEPS {
            playbook.add_step(Step::new(kind, of_role.clone()).concurrency(concurrency));
        }
    }

    if let Some(pools) = pools {
        let mds = topology.by_role(Role::Mds);
        for kind in BOOTSTRAP_STEPS {
            playbook.add_step(
                Step::new(kind, mds.clone())
                    .option(OPTION_POOL_TOPOLOGY, pools.clone())
                    .limit(1),
            );
        }
    }
    playbook
}
