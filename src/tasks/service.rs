//! Service container lifecycle: pull, create, configure, start/stop, clean

use super::{
    OPTION_CLEAN_ITEMS, Op, container_name, exec, exec_ignore_status, exec_with_input, op,
};
use crate::ssh::{Remote, quote};
use playbook::{ConfigRef, ErrorCode, SharedContext, StepKind, TaskError};
use serde_json::Value;
use std::fmt::Write as _;
use topology::{ConfigRecord, DeployConfig, KEY_IMAGE};

/// Staging directory for files uploaded before `docker cp`
pub const STAGING_DIR: &str = "/tmp/clusteradm";

/// What CLEAN_SERVICE may remove
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanItem {
    Log,
    Data,
    Container,
}

impl CleanItem {
    pub const ALL: [CleanItem; 3] = [Self::Log, Self::Data, Self::Container];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Log => "log",
            Self::Data => "data",
            Self::Container => "container",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "log" => Some(Self::Log),
            "data" => Some(Self::Data),
            "container" => Some(Self::Container),
            _ => None,
        }
    }

    /// Parse a comma separated list; empty means everything
    pub fn parse_list(s: &str) -> Result<Vec<Self>, String> {
        let mut items = Vec::new();
        for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let item = Self::parse(part)
                .ok_or_else(|| format!("unknown clean item '{part}' (log, data, container)"))?;
            if !items.contains(&item) {
                items.push(item);
            }
        }
        if items.is_empty() {
            items = Self::ALL.to_vec();
        }
        Ok(items)
    }
}

/// Root of a role inside its container, e.g. `/curvebs/mds`
fn container_root(cfg: &DeployConfig) -> String {
    format!("/{}/{}", cfg.kind, cfg.role)
}

/// The service config file, one `key=value` per line, sorted by key
pub fn render_config(cfg: &DeployConfig) -> String {
    let mut out = String::new();
    for (key, value) in &cfg.config {
        let _ = writeln!(out, "{key}={value}");
    }
    out
}

fn image_of(kind: StepKind, entry: ConfigRef<'_>) -> playbook::Result<String> {
    entry.attribute(KEY_IMAGE).map(str::to_string).ok_or_else(|| {
        playbook::Error::construction(
            kind.name(),
            format!("{} on {} has no {KEY_IMAGE}", entry.id(), entry.host()),
        )
    })
}

pub(super) fn pull_image(entry: ConfigRef<'_>, remote: Remote) -> playbook::Result<Option<Op>> {
    let image = image_of(StepKind::PullImage, entry)?;
    Ok(op(move |tctx| {
        tctx.sub_step(&image);
        exec(
            &remote,
            &format!("docker pull {}", quote(&image)),
            ErrorCode::RemoteCommandFailed,
        )
    }))
}

/// `docker create` arguments for one service instance
pub fn create_command(cfg: &DeployConfig) -> Option<String> {
    let image = cfg.image()?;
    let root = container_root(cfg);
    let name = cfg.container_name();

    let mut dirs = Vec::new();
    let mut command = format!(
        "docker create --name {name} --hostname {name} --network host --restart always"
    );
    if let Some(data) = cfg.data_dir() {
        let _ = write!(command, " -v {}:{root}/data", quote(data));
        dirs.push(quote(data));
    }
    if let Some(log) = cfg.log_dir() {
        let _ = write!(command, " -v {}:{root}/logs", quote(log));
        dirs.push(quote(log));
    }
    let _ = write!(command, " {} --role {}", quote(image), cfg.role);

    if dirs.is_empty() {
        Some(command)
    } else {
        Some(format!("mkdir -p {} && {command}", dirs.join(" ")))
    }
}

pub(super) fn create_container(
    entry: ConfigRef<'_>,
    remote: Remote,
) -> playbook::Result<Option<Op>> {
    let cfg = entry.as_deploy()?;
    let command = create_command(cfg).ok_or_else(|| {
        playbook::Error::construction(
            StepKind::CreateContainer.name(),
            format!("{} has no {KEY_IMAGE}", cfg.name()),
        )
    })?;
    let name = cfg.container_name();

    Ok(op(move |_| {
        // recreate from scratch when a stale container is left behind
        exec_ignore_status(&remote, &format!("docker rm -f {name} >/dev/null 2>&1"))?;
        exec(&remote, &command, ErrorCode::RemoteCommandFailed)
    }))
}

pub(super) fn sync_config(entry: ConfigRef<'_>, remote: Remote) -> playbook::Result<Option<Op>> {
    let cfg = entry.as_deploy()?;
    let content = render_config(cfg);
    let staged = format!("{STAGING_DIR}/{}.conf", cfg.id);
    let target = format!(
        "{}:{}/conf/{}.conf",
        cfg.container_name(),
        container_root(cfg),
        cfg.role
    );

    Ok(op(move |tctx| {
        tctx.sub_step("upload");
        exec_with_input(
            &remote,
            &format!("mkdir -p {STAGING_DIR} && cat > {staged}"),
            content.as_bytes(),
            ErrorCode::CopyFailed,
        )?;

        tctx.sub_step("install");
        exec(
            &remote,
            &format!("docker cp {staged} {target} && rm -f {staged}"),
            ErrorCode::CopyFailed,
        )
    }))
}

/// START/STOP/RESTART_SERVICE: `docker <verb> <container>`
pub(super) fn lifecycle(
    kind: StepKind,
    entry: ConfigRef<'_>,
    remote: Remote,
    verb: &'static str,
) -> playbook::Result<Option<Op>> {
    let name = container_name(kind, entry)?;
    Ok(op(move |_| {
        exec(
            &remote,
            &format!("docker {verb} {name}"),
            ErrorCode::RemoteCommandFailed,
        )
    }))
}

/// Items to clean, from the step option
fn clean_items(ctx: &SharedContext) -> playbook::Result<Vec<CleanItem>> {
    let raw = match ctx.get(OPTION_CLEAN_ITEMS) {
        None => String::new(),
        Some(Value::String(s)) => s,
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join(","),
        Some(other) => other.to_string(),
    };
    CleanItem::parse_list(&raw)
        .map_err(|e| playbook::Error::construction(StepKind::CleanService.name(), e))
}

pub(super) fn clean_service(
    entry: ConfigRef<'_>,
    remote: Remote,
    ctx: &SharedContext,
) -> playbook::Result<Option<Op>> {
    let cfg = entry.as_deploy()?;
    let mut commands = Vec::new();
    for item in clean_items(ctx)? {
        match item {
            CleanItem::Log => {
                if let Some(dir) = cfg.log_dir() {
                    commands.push(("log", format!("rm -rf {}", quote(dir))));
                }
            }
            CleanItem::Data => {
                if let Some(dir) = cfg.data_dir() {
                    commands.push(("data", format!("rm -rf {}", quote(dir))));
                }
            }
            CleanItem::Container => {
                commands.push((
                    "container",
                    format!("docker rm -f {} >/dev/null 2>&1 || true", cfg.container_name()),
                ));
            }
        }
    }

    Ok(op(move |tctx| {
        for (label, command) in &commands {
            tctx.sub_step(label);
            exec(&remote, command, ErrorCode::RemoteCommandFailed).map_err(|e| {
                TaskError::new(e.code, format!("clean {label}: {}", e.message)).with_output(e.output)
            })?;
        }
        Ok(format!("cleaned {}", commands.len()))
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::tests::{TOPOLOGY, builder};
    use playbook::Step;
    use topology::{Role, Topology};

    fn mds() -> DeployConfig {
        Topology::parse(TOPOLOGY).unwrap().by_role(Role::Mds).remove(0)
    }

    #[test]
    fn test_clean_items() {
        assert_eq!(CleanItem::parse_list("").unwrap(), CleanItem::ALL.to_vec());
        assert_eq!(
            CleanItem::parse_list("log, container,log").unwrap(),
            vec![CleanItem::Log, CleanItem::Container]
        );
        assert!(CleanItem::parse_list("disk").is_err());
    }

    #[test]
    fn test_clean_items_from_context() {
        let ctx = SharedContext::new();
        ctx.set(OPTION_CLEAN_ITEMS, serde_json::json!(["data"]));
        assert_eq!(clean_items(&ctx).unwrap(), vec![CleanItem::Data]);

        ctx.set(OPTION_CLEAN_ITEMS, "bogus");
        assert!(clean_items(&ctx).unwrap_err().is_construction());
    }

    #[test]
    fn test_create_command_mounts_dirs() {
        let cfg = mds();
        let command = create_command(&cfg).unwrap();
        assert!(command.starts_with("mkdir -p /data/mds0 /logs/mds0 && docker create"));
        assert!(command.contains("-v /data/mds0:/curvebs/mds/data"));
        assert!(command.contains("-v /logs/mds0:/curvebs/mds/logs"));
        assert!(command.contains(&format!("--name {}", cfg.container_name())));
        assert!(command.ends_with("opencurvedocker/curvebs:v1.2 --role mds"));
    }

    #[test]
    fn test_render_config_is_sorted() {
        let mut cfg = mds();
        cfg.config.clear();
        cfg.config.insert("mds.listen.addr".into(), "10.0.1.1:6700".into());
        cfg.config.insert("etcd.endpoint".into(), "10.0.1.1:2379".into());
        assert_eq!(
            render_config(&cfg),
            "etcd.endpoint=10.0.1.1:2379\nmds.listen.addr=10.0.1.1:6700\n"
        );
    }

    #[test]
    fn test_missing_image_aborts_pull() {
        let mut cfg = mds();
        cfg.config.remove(KEY_IMAGE);
        let step = Step::new(StepKind::PullImage, vec![cfg]);
        let err = playbook::build_tasks(&step, &builder(), &SharedContext::new()).unwrap_err();
        assert!(err.is_construction());
        assert!(err.to_string().contains(KEY_IMAGE));
    }
}
