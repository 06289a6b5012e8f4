use super::{Context, run_playbook};
use crate::cli::{MonitorArgs, MonitorCommand};
use crate::ui;
use anyhow::{Context as _, Result, bail};
use playbook::{Playbook, Step, StepKind};
use topology::{FilterOptions, filter_configs, load_monitors};

pub fn run(ctx: &Context, cmd: &MonitorCommand) -> Result<()> {
    match cmd {
        MonitorCommand::Start(args) => apply(ctx, args, StepKind::StartMonitor, "Start"),
        MonitorCommand::Stop(args) => apply(ctx, args, StepKind::StopMonitor, "Stop"),
    }
}

fn apply(ctx: &Context, args: &MonitorArgs, kind: StepKind, verb: &str) -> Result<()> {
    let monitors = load_monitors(&args.monitors)
        .with_context(|| format!("Failed to load monitors from {}", args.monitors.display()))?;
    let monitors = filter_configs(&monitors, &FilterOptions::default().role(&args.role));
    if monitors.is_empty() {
        bail!("No monitor matches role '{}'", args.role);
    }

    let count = monitors.len();
    let builder = ctx.task_builder(ctx.load_hosts()?);
    let mut playbook = Playbook::new();
    playbook.add_step(Step::new(kind, monitors).concurrency(ctx.concurrency()));

    let prompt = format!("{verb} {count} monitor service(s)?");
    run_playbook(ctx, &playbook, &builder, Some(&prompt), verb)?;

    if !ctx.quiet {
        ui::success(&format!("{verb}: {count} monitor service(s) done"));
    }
    Ok(())
}
