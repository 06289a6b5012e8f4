use super::{Context, run_playbook, select};
use crate::cli::FilterArgs;
use crate::tasks::{CleanItem, OPTION_CLEAN_ITEMS};
use crate::ui;
use anyhow::Result;
use playbook::{Playbook, Step, StepKind};
use topology::DeployConfig;

pub fn run(ctx: &Context, filter: &FilterArgs) -> Result<()> {
    let topology = ctx.load_topology()?;
    let configs = select(&topology, &filter.options())?;
    let count = configs.len();
    let builder = ctx.task_builder(ctx.load_hosts()?);

    let playbook = build(configs, ctx.concurrency());
    let prompt = format!("Upgrade {count} service(s)? Each one is restarted");
    run_playbook(ctx, &playbook, &builder, Some(&prompt), "Upgrade")?;

    if !ctx.quiet {
        ui::success(&format!("Upgraded {count} service(s)"));
    }
    Ok(())
}

/// Recreate each container from the current image; data and logs stay
fn build(configs: Vec<DeployConfig>, concurrency: usize) -> Playbook {
    let step = |kind| Step::new(kind, configs.clone()).concurrency(concurrency);

    let mut playbook = Playbook::new();
    playbook
        .add_step(step(StepKind::PullImage))
        .add_step(step(StepKind::StopService))
        .add_step(
            step(StepKind::CleanService).option(OPTION_CLEAN_ITEMS, CleanItem::Container.as_str()),
        )
        .add_step(step(StepKind::CreateContainer))
        .add_step(step(StepKind::SyncConfig))
        .add_step(step(StepKind::StartService));
    playbook
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::tests::TOPOLOGY;
    use topology::Topology;

    #[test]
    fn test_only_the_container_is_cleaned() {
        let topology = Topology::parse(TOPOLOGY).unwrap();
        let playbook = build(topology.deploy_configs().to_vec(), 1);

        let kinds: Vec<StepKind> = playbook.steps().iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![
                StepKind::PullImage,
                StepKind::StopService,
                StepKind::CleanService,
                StepKind::CreateContainer,
                StepKind::SyncConfig,
                StepKind::StartService,
            ]
        );
        assert_eq!(playbook.steps()[2].options[OPTION_CLEAN_ITEMS], "container");
    }
}
