use super::{Context, run_playbook, select};
use crate::cli::CleanArgs;
use crate::tasks::{CleanItem, OPTION_CLEAN_ITEMS};
use crate::ui;
use anyhow::{Result, anyhow};
use playbook::{Playbook, Step, StepKind};

pub fn run(ctx: &Context, args: &CleanArgs) -> Result<()> {
    let items = CleanItem::parse_list(&args.only.join(",")).map_err(|e| anyhow!(e))?;
    let names: Vec<&str> = items.iter().map(CleanItem::as_str).collect();

    let topology = ctx.load_topology()?;
    let configs = select(&topology, &args.filter.options())?;
    let count = configs.len();
    let builder = ctx.task_builder(ctx.load_hosts()?);

    let mut playbook = Playbook::new();
    playbook.add_step(
        Step::new(StepKind::CleanService, configs)
            .option(OPTION_CLEAN_ITEMS, names.join(","))
            .concurrency(ctx.concurrency()),
    );

    ui::warn(&format!("This removes {} of {count} service(s)", names.join(", ")));
    run_playbook(ctx, &playbook, &builder, Some("Continue?"), "Clean")?;

    if !ctx.quiet {
        ui::success(&format!("Cleaned {count} service(s)"));
    }
    Ok(())
}
