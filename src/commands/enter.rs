use super::Context;
use crate::ssh::Remote;
use anyhow::{Context as _, Result, bail};
use topology::{FilterOptions, filter_configs};

pub fn run(ctx: &Context, id: &str) -> Result<()> {
    let topology = ctx.load_topology()?;
    let matches = filter_configs(topology.deploy_configs(), &FilterOptions::default().id(id));
    let Some(cfg) = matches.first() else {
        bail!("No service with id '{id}'");
    };

    let hosts = ctx.load_hosts()?;
    let host = hosts.resolve(&cfg.host)?;
    let remote = Remote::new(host, ctx.settings.ssh_connect_timeout());
    let container = cfg.container_name();

    log::info!("attaching to {container} on {}", cfg.host);
    let status = remote
        .attach(&container)
        .with_context(|| format!("Failed to attach to {container} on {}", cfg.host))?;
    if status != 0 {
        bail!("Shell in {container} exited with status {status}");
    }
    Ok(())
}
