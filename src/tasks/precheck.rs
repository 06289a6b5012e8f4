//! Host checks run before anything is deployed

use super::{Op, OPTION_MIN_KERNEL, exec, op};
use crate::ssh::Remote;
use playbook::{ConfigRef, ErrorCode, SharedContext, StepKind, TaskError};
use regex::Regex;
use topology::{ConfigRecord, KEY_DATA_DIR, KEY_LISTEN_PORT, KEY_LOG_DIR};

/// Scratch directory the permission check creates on every host
pub const PRECHECK_DIR: &str = "/tmp/clusteradm-precheck";

/// Oldest kernel accepted when no minimum is configured
pub const DEFAULT_MIN_KERNEL: &str = "3.15";

/// `major.minor.patch` of a `uname -r` string
pub fn parse_kernel_version(release: &str) -> Option<(u32, u32, u32)> {
    let pattern = Regex::new(r"^(\d+)\.(\d+)(?:\.(\d+))?").ok()?;
    let caps = pattern.captures(release.trim())?;
    let part = |i: usize| caps.get(i).map_or(Some(0), |m| m.as_str().parse().ok());
    Some((part(1)?, part(2)?, part(3)?))
}

pub(super) fn check_ssh_connect(remote: Remote) -> Option<Op> {
    op(move |_| exec(&remote, "echo ok", ErrorCode::SshConnectFailed))
}

pub(super) fn check_permission(entry: ConfigRef<'_>, remote: Remote) -> Option<Op> {
    let dirs: Vec<String> = [KEY_DATA_DIR, KEY_LOG_DIR]
        .iter()
        .filter_map(|key| entry.attribute(key))
        .map(str::to_string)
        .collect();

    op(move |tctx| {
        tctx.sub_step("docker");
        exec(&remote, "docker info >/dev/null", ErrorCode::PermissionDenied)?;

        tctx.sub_step("directories");
        let mut command = format!("mkdir -p {PRECHECK_DIR}");
        for dir in &dirs {
            let parent = crate::ssh::quote(dir);
            command.push_str(&format!(" && mkdir -p {parent} && test -w {parent}"));
        }
        exec(&remote, &command, ErrorCode::PermissionDenied)
    })
}

pub(super) fn check_kernel_version(
    remote: Remote,
    ctx: &SharedContext,
) -> playbook::Result<Option<Op>> {
    let wanted = ctx
        .get_str(OPTION_MIN_KERNEL)
        .unwrap_or_else(|| DEFAULT_MIN_KERNEL.to_string());
    let Some(minimum) = parse_kernel_version(&wanted) else {
        return Err(playbook::Error::construction(
            StepKind::CheckKernelVersion.name(),
            format!("invalid minimum kernel version '{wanted}'"),
        ));
    };

    Ok(op(move |_| {
        let release = exec(&remote, "uname -r", ErrorCode::RemoteCommandFailed)?;
        match parse_kernel_version(&release) {
            Some(version) if version >= minimum => Ok(release),
            Some(_) => Err(TaskError::new(
                ErrorCode::KernelUnsupported,
                format!("kernel {release} is older than {wanted}"),
            )),
            None => Err(TaskError::new(
                ErrorCode::KernelUnsupported,
                format!("cannot parse kernel release '{release}'"),
            )),
        }
    }))
}

/// Listening port of an entry, if it has one
fn listen_port(entry: ConfigRef<'_>) -> Option<u16> {
    match entry {
        ConfigRef::Deploy(c) => Some(c.listen_port()),
        ConfigRef::Monitor(c) => Some(c.listen_port),
        other => other.attribute(KEY_LISTEN_PORT).and_then(|p| p.parse().ok()),
    }
}

pub(super) fn check_port_in_use(entry: ConfigRef<'_>, remote: Remote) -> Option<Op> {
    let Some(port) = listen_port(entry) else {
        log::debug!("{}: no listen port on {}", StepKind::CheckPortInUse, entry.id());
        return None;
    };

    op(move |_| {
        let command = format!("ss -tlnH 'sport = :{port}'");
        let listening = exec(&remote, &command, ErrorCode::RemoteCommandFailed)?;
        if listening.is_empty() {
            Ok(format!("port {port} is free"))
        } else {
            Err(TaskError::new(ErrorCode::PortInUse, format!("port {port} is already in use"))
                .with_output(listening))
        }
    })
}

pub(super) fn clean_precheck_environment(remote: Remote) -> Option<Op> {
    op(move |_| {
        exec(
            &remote,
            &format!("rm -rf {PRECHECK_DIR}"),
            ErrorCode::RemoteCommandFailed,
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::tests::{TOPOLOGY, builder};
    use playbook::Step;
    use topology::Topology;

    #[test]
    fn test_parse_kernel_version() {
        assert_eq!(parse_kernel_version("5.15.0-91-generic"), Some((5, 15, 0)));
        assert_eq!(parse_kernel_version("4.19"), Some((4, 19, 0)));
        assert_eq!(parse_kernel_version("3.10.0-1160.el7.x86_64\n"), Some((3, 10, 0)));
        assert_eq!(parse_kernel_version("unknown"), None);
        assert!(parse_kernel_version("3.10.0").unwrap() < parse_kernel_version("3.15").unwrap());
    }

    #[test]
    fn test_invalid_minimum_kernel_aborts_build() {
        let topology = Topology::parse(TOPOLOGY).unwrap();
        let step = Step::new(StepKind::CheckKernelVersion, topology.deploy_configs().to_vec())
            .option(OPTION_MIN_KERNEL, "latest");
        let ctx = SharedContext::new();
        ctx.set(OPTION_MIN_KERNEL, "latest");
        let err = playbook::build_tasks(&step, &builder(), &ctx).unwrap_err();
        assert!(err.is_construction());
    }

    #[test]
    fn test_host_checks_dedup_per_host() {
        let topology = Topology::parse(TOPOLOGY).unwrap();
        let ctx = SharedContext::new();
        for kind in [
            StepKind::CheckSshConnect,
            StepKind::CheckPermission,
            StepKind::CheckKernelVersion,
            StepKind::CleanPrecheckEnvironment,
        ] {
            let step = Step::new(kind, topology.deploy_configs().to_vec());
            assert_eq!(playbook::build_tasks(&step, &builder(), &ctx).unwrap().len(), 1);
        }

        let step = Step::new(StepKind::CheckPortInUse, topology.deploy_configs().to_vec());
        assert_eq!(playbook::build_tasks(&step, &builder(), &ctx).unwrap().len(), 2);
    }
}
