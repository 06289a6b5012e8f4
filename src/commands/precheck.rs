use super::{Context, run_playbook, select};
use crate::cli::FilterArgs;
use crate::ui;
use anyhow::Result;
use crate::tasks::OPTION_MIN_KERNEL;
use playbook::{Playbook, Step, StepKind};
use topology::DeployConfig;

const CHECKS: [StepKind; 4] = [
    StepKind::CheckSshConnect,
    StepKind::CheckPermission,
    StepKind::CheckKernelVersion,
    StepKind::CheckPortInUse,
];

pub fn run(ctx: &Context, filter: &FilterArgs) -> Result<()> {
    let topology = ctx.load_topology()?;
    let configs = select(&topology, &filter.options())?;
    let builder = ctx.task_builder(ctx.load_hosts()?);

    let playbook = build(configs, ctx.concurrency(), &ctx.settings.precheck.min_kernel);
    run_playbook(ctx, &playbook, &builder, None, "Precheck")?;

    if !ctx.quiet {
        ui::success("All hosts passed precheck");
    }
    Ok(())
}

fn build(configs: Vec<DeployConfig>, concurrency: usize, min_kernel: &str) -> Playbook {
    let mut playbook = Playbook::new();
    for kind in CHECKS {
        let mut step = Step::new(kind, configs.clone()).concurrency(concurrency);
        if kind == StepKind::CheckKernelVersion {
            step = step.option(OPTION_MIN_KERNEL, min_kernel);
        }
        playbook.add_step(step);
    }
    playbook.add_post_step(
        Step::new(StepKind::CleanPrecheckEnvironment, configs)
            .concurrency(concurrency)
            .skip_error(true),
    );
    playbook
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::tests::{TOPOLOGY, builder};
    use playbook::{NoProgress, SharedContext};
    use topology::Topology;

    #[test]
    fn test_build() {
        let topology = Topology::parse(TOPOLOGY).unwrap();
        let playbook = build(topology.deploy_configs().to_vec(), 2, "3.15");
        let kinds: Vec<StepKind> = playbook.steps().iter().map(|s| s.kind).collect();
        assert_eq!(kinds, CHECKS);
        assert_eq!(playbook.post_steps().len(), 1);
        assert!(playbook.post_steps()[0].exec.skip_error);
    }

    #[test]
    fn test_configured_min_kernel_reaches_check() {
        let topology = Topology::parse(TOPOLOGY).unwrap();
        let built = build(topology.deploy_configs().to_vec(), 2, "not-a-version");
        let kernel = built
            .steps()
            .iter()
            .find(|s| s.kind == StepKind::CheckKernelVersion)
            .unwrap();
        assert_eq!(kernel.options.len(), 1);
        assert_eq!(
            built.steps().iter().filter(|s| s.options.is_empty()).count(),
            CHECKS.len() - 1
        );

        // the option is published before the check is built, so a bad
        // value fails construction without touching any host
        let mut playbook = Playbook::new();
        playbook.add_step(kernel.clone());
        let report = playbook.run(&builder(), &SharedContext::new(), &NoProgress);
        let err = report.error().unwrap();
        assert!(err.is_construction());
        assert!(err.to_string().contains("not-a-version"));
    }
}
