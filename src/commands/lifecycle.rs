//! start / stop / restart

use super::{Context, run_playbook, select};
use crate::cli::FilterArgs;
use crate::ui;
use anyhow::Result;
use playbook::{Playbook, Step, StepKind};

pub fn run(ctx: &Context, filter: &FilterArgs, kind: StepKind) -> Result<()> {
    let topology = ctx.load_topology()?;
    let configs = select(&topology, &filter.options())?;
    let count = configs.len();
    let builder = ctx.task_builder(ctx.load_hosts()?);

    let mut playbook = Playbook::new();
    playbook.add_step(Step::new(kind, configs).concurrency(ctx.concurrency()));

    let verb = verb(kind);
    let prompt = format!("{verb} {count} service(s)?");
    run_playbook(ctx, &playbook, &builder, Some(&prompt), verb)?;

    if !ctx.quiet {
        ui::success(&format!("{verb}: {count} service(s) done"));
    }
    Ok(())
}

fn verb(kind: StepKind) -> &'static str {
    match kind {
        StepKind::StartService => "Start",
        StepKind::StopService => "Stop",
        StepKind::RestartService => "Restart",
        other => other.description(),
    }
}
