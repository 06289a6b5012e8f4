use super::{Context, run_playbook};
use crate::cli::{ClientArgs, ClientCommand};
use crate::ui;
use anyhow::{Context as _, Result, bail};
use playbook::{Playbook, Step, StepKind};
use topology::{FilterOptions, filter_configs, load_clients};

pub fn run(ctx: &Context, cmd: &ClientCommand) -> Result<()> {
    match cmd {
        ClientCommand::Mount(args) => apply(ctx, args, StepKind::MountFs, "Mount"),
        ClientCommand::Umount(args) => apply(ctx, args, StepKind::UmountFs, "Umount"),
    }
}

fn apply(ctx: &Context, args: &ClientArgs, kind: StepKind, verb: &str) -> Result<()> {
    let clients = load_clients(&args.clients)
        .with_context(|| format!("Failed to load clients from {}", args.clients.display()))?;
    let clients = filter_configs(&clients, &FilterOptions::default().host(&args.host));
    if clients.is_empty() {
        bail!("No client matches host '{}'", args.host);
    }

    let mounts: Vec<String> = clients
        .iter()
        .map(|c| format!("{}:{}", c.host, c.mount_point))
        .collect();
    let builder = ctx.task_builder(ctx.load_hosts()?);

    let mut playbook = Playbook::new();
    playbook.add_step(Step::new(kind, clients).concurrency(ctx.concurrency()));

    let prompt = format!("{verb} {}?", mounts.join(", "));
    run_playbook(ctx, &playbook, &builder, Some(&prompt), verb)?;

    if !ctx.quiet {
        for mount in &mounts {
            ui::success(mount);
        }
    }
    Ok(())
}
