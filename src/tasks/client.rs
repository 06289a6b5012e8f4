//! Filesystem client mounts: a FUSE client container per mount point

use super::{Op, exec, op};
use crate::ssh::{Remote, quote};
use playbook::{ConfigRef, ErrorCode};
use std::fmt::Write as _;
use topology::ClientConfig;

/// Mount point inside the client container
const CONTAINER_MOUNT: &str = "/curvefs/client/mnt";

/// `docker run` for a client container
pub fn mount_command(cfg: &ClientConfig) -> String {
    let mount_point = quote(&cfg.mount_point);
    let mut command = format!(
        "mkdir -p {mount_point} && docker run -d --name {} --network host \
         --cap-add SYS_ADMIN --device /dev/fuse --security-opt apparmor:unconfined \
         -v {mount_point}:{CONTAINER_MOUNT}:rshared",
        cfg.container_name()
    );
    for (key, value) in &cfg.config {
        let _ = write!(command, " -e {}", quote(&format!("{key}={value}")));
    }
    let _ = write!(
        command,
        " {} --fsname {} --mdsaddr {} --mountpoint {CONTAINER_MOUNT}",
        quote(&cfg.image),
        quote(&cfg.fs_name),
        quote(&cfg.mds_addrs)
    );
    command
}

pub(super) fn mount_fs(entry: ConfigRef<'_>, remote: Remote) -> playbook::Result<Option<Op>> {
    let cfg = entry.as_client()?;
    let command = mount_command(cfg);
    let mount_point = cfg.mount_point.clone();

    Ok(op(move |tctx| {
        tctx.sub_step(&mount_point);
        exec(&remote, &command, ErrorCode::RemoteCommandFailed)
    }))
}

pub(super) fn umount_fs(entry: ConfigRef<'_>, remote: Remote) -> playbook::Result<Option<Op>> {
    let cfg = entry.as_client()?;
    let command = format!(
        "docker rm -f {} >/dev/null 2>&1; (mountpoint -q {mp} && umount -l {mp}) || true",
        cfg.container_name(),
        mp = quote(&cfg.mount_point)
    );

    Ok(op(move |_| exec(&remote, &command, ErrorCode::RemoteCommandFailed)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::tests::builder;
    use playbook::{SharedContext, Step, StepKind};
    use topology::parse_clients;

    const CLIENTS: &str = r#"
container_image: opencurvedocker/curvefs:v2.4
mds_addrs: 10.0.1.1:6700,10.0.1.2:6700
config:
  s3.bucket_name: curve
mounts:
  - host: server-host1
    fs_name: fs1
    mount_point: /mnt/fs1
"#;

    #[test]
    fn test_mount_command() {
        let clients = parse_clients(CLIENTS).unwrap();
        let command = mount_command(&clients[0]);
        assert!(command.starts_with("mkdir -p /mnt/fs1 && docker run -d"));
        assert!(command.contains("-v /mnt/fs1:/curvefs/client/mnt:rshared"));
        assert!(command.contains("-e s3.bucket_name=curve"));
        assert!(command.contains("--fsname fs1 --mdsaddr 10.0.1.1:6700,10.0.1.2:6700"));
    }

    #[test]
    fn test_client_steps_build_per_mount() {
        let clients = parse_clients(CLIENTS).unwrap();
        for kind in [StepKind::MountFs, StepKind::UmountFs] {
            let step = Step::new(kind, clients.clone());
            let tasks = playbook::build_tasks(&step, &builder(), &SharedContext::new()).unwrap();
            assert_eq!(tasks.len(), 1);
            assert!(tasks[0].tid().is_none());
        }
    }
}
