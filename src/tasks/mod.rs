//! Task constructors: what each step kind does on a host.
//!
//! [`ClusterTaskBuilder`] is the [`TaskBuilder`] every command hands to the
//! playbook engine. It resolves the entry's host, then dispatches on the step
//! kind to one of the per-area constructors below. All remote work is
//! shell commands over [`Remote`], mostly `docker` invocations.

mod bootstrap;
mod client;
mod monitor;
mod precheck;
mod service;
mod status;

pub use bootstrap::pool_topology;
pub use precheck::DEFAULT_MIN_KERNEL;
pub use service::CleanItem;
pub use status::{StatusRow, merge_by_parent, status_rows};

use crate::ssh::{CommandOutput, Remote};
use playbook::{ConfigRef, ErrorCode, SharedContext, StepKind, Task, TaskBuilder, TaskError};
use std::io;
use std::time::Duration;
use topology::{ConfigRecord, HostDirectory};

/// Step option: comma separated items for CLEAN_SERVICE (log,data,container)
pub const OPTION_CLEAN_ITEMS: &str = "clean_items";
/// Step option: minimum kernel version for CHECK_KERNEL_VERSION
pub const OPTION_MIN_KERNEL: &str = "min_kernel";
/// Step option: pool topology document for CREATE_*_POOL
pub const OPTION_POOL_TOPOLOGY: &str = "pool_topology";

/// Builds the tasks of every step kind
pub struct ClusterTaskBuilder {
    hosts: HostDirectory,
    connect_timeout: Duration,
}

impl ClusterTaskBuilder {
    pub fn new(hosts: HostDirectory, connect_timeout: Duration) -> Self {
        Self {
            hosts,
            connect_timeout,
        }
    }

    pub fn remote(&self, host: &str) -> topology::Result<Remote> {
        let cfg = self.hosts.resolve(host)?;
        Ok(Remote::new(cfg, self.connect_timeout))
    }
}

impl TaskBuilder for ClusterTaskBuilder {
    fn build(
        &self,
        kind: StepKind,
        entry: ConfigRef<'_>,
        ctx: &SharedContext,
    ) -> playbook::Result<Option<Task>> {
        let remote = self
            .remote(entry.host())
            .map_err(|e| playbook::Error::construction(kind.name(), e))?;

        let task = match kind {
            StepKind::CheckSshConnect => precheck::check_ssh_connect(remote),
            StepKind::CheckPermission => precheck::check_permission(entry, remote),
            StepKind::CheckKernelVersion => precheck::check_kernel_version(remote, ctx)?,
            StepKind::CheckPortInUse => precheck::check_port_in_use(entry, remote),
            StepKind::CleanPrecheckEnvironment => precheck::clean_precheck_environment(remote),
            StepKind::PullImage => service::pull_image(entry, remote)?,
            StepKind::CreateContainer => service::create_container(entry, remote)?,
            StepKind::SyncConfig => service::sync_config(entry, remote)?,
            StepKind::StartService => service::lifecycle(kind, entry, remote, "start")?,
            StepKind::StopService => service::lifecycle(kind, entry, remote, "stop")?,
            StepKind::RestartService => service::lifecycle(kind, entry, remote, "restart")?,
            StepKind::CleanService => service::clean_service(entry, remote, ctx)?,
            StepKind::InitServiceStatus => status::init_service_status(entry)?,
            StepKind::GetServiceStatus => status::get_service_status(entry, remote)?,
            StepKind::CreatePhysicalPool => bootstrap::create_pool(kind, entry, remote, ctx)?,
            StepKind::CreateLogicalPool => bootstrap::create_pool(kind, entry, remote, ctx)?,
            StepKind::BalanceLeader => bootstrap::balance_leader(entry, remote)?,
            StepKind::MountFs => client::mount_fs(entry, remote)?,
            StepKind::UmountFs => client::umount_fs(entry, remote)?,
            StepKind::StartMonitor => monitor::start_monitor(entry, remote)?,
            StepKind::StopMonitor => monitor::stop_monitor(entry, remote)?,
        };

        Ok(task.map(|op| Task::new(kind.description(), entry.host(), op)))
    }
}

/// A boxed operation, ready to wrap in a [`Task`]
type Op = Box<dyn Fn(&playbook::TaskContext<'_>) -> Result<String, TaskError> + Send + Sync>;

fn op<F>(f: F) -> Option<Op>
where
    F: Fn(&playbook::TaskContext<'_>) -> Result<String, TaskError> + Send + Sync + 'static,
{
    Some(Box::new(f))
}

/// Run a command, mapping failures to task errors.
///
/// A transport failure is `SshConnectFailed`; a non-zero exit is `code`.
/// Returns trimmed stdout.
pub(crate) fn exec(remote: &Remote, command: &str, code: ErrorCode) -> Result<String, TaskError> {
    let output = remote
        .run(command)
        .map_err(|e| TaskError::new(ErrorCode::SshConnectFailed, format!("ssh: {e}")))?;
    check(remote, output, code)
}

/// Like [`exec`], feeding `input` on stdin
pub(crate) fn exec_with_input(
    remote: &Remote,
    command: &str,
    input: &[u8],
    code: ErrorCode,
) -> Result<String, TaskError> {
    let output = remote
        .run_with_input(command, input)
        .map_err(|e| TaskError::new(ErrorCode::SshConnectFailed, format!("ssh: {e}")))?;
    check(remote, output, code)
}

/// Run a command whose exit status does not matter.
///
/// Only a failed connection is an error.
pub(crate) fn exec_ignore_status(remote: &Remote, command: &str) -> Result<(), TaskError> {
    ignore_status(remote, remote.run(command))
}

fn ignore_status(remote: &Remote, result: io::Result<CommandOutput>) -> Result<(), TaskError> {
    let output =
        result.map_err(|e| TaskError::new(ErrorCode::SshConnectFailed, format!("ssh: {e}")))?;
    if let Some(err) = connection_error(remote, &output) {
        return Err(err);
    }
    if !output.success() {
        log::debug!("[{}] ignored exit status {}", remote.host, output.status);
    }
    Ok(())
}

fn connection_error(remote: &Remote, output: &CommandOutput) -> Option<TaskError> {
    (output.connection_failed() && !remote.is_local()).then(|| {
        TaskError::new(
            ErrorCode::SshConnectFailed,
            format!("cannot connect to {}", remote.hostname),
        )
        .with_output(output.combined())
    })
}

fn check(remote: &Remote, output: CommandOutput, code: ErrorCode) -> Result<String, TaskError> {
    if output.success() {
        return Ok(output.stdout.trim().to_string());
    }
    if let Some(err) = connection_error(remote, &output) {
        return Err(err);
    }
    Err(TaskError::new(code, format!("exit status {}", output.status)).with_output(output.combined()))
}

/// Container name of an entry that owns a container
fn container_name(kind: StepKind, entry: ConfigRef<'_>) -> playbook::Result<String> {
    match entry {
        ConfigRef::Deploy(c) => Ok(c.container_name()),
        ConfigRef::Client(c) => Ok(c.container_name()),
        ConfigRef::Monitor(c) => Ok(c.container_name()),
        ConfigRef::Generic(c) => Err(playbook::Error::construction(
            kind.name(),
            format!("{} on {} has no container", c.id, c.host),
        )),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use playbook::{NoProgress, Playbook, Step};
    use topology::{GenericConfig, Topology};

    pub(crate) const HOSTS: &str = r#"
global:
  user: curve
hosts:
  - host: local
    hostname: 127.0.0.1
  - host: server-host1
    hostname: 10.0.1.1
"#;

    pub(crate) const TOPOLOGY: &str = r#"
kind: curvebs
global:
  container_image: opencurvedocker/curvebs:v1.2
  log_dir: /logs/${service_role}${service_host_sequence}
  data_dir: /data/${service_role}${service_host_sequence}

etcd_services:
  deploy:
    - host: server-host1

mds_services:
  deploy:
    - host: server-host1
"#;

    pub(crate) fn builder() -> ClusterTaskBuilder {
        ClusterTaskBuilder::new(HostDirectory::parse(HOSTS).unwrap(), Duration::from_secs(1))
    }

    #[test]
    fn test_unknown_host_is_construction_error() {
        let configs = vec![GenericConfig::new("nowhere", "host")];
        let step = Step::new(StepKind::CheckSshConnect, configs);
        let err = playbook::build_tasks(&step, &builder(), &SharedContext::new()).unwrap_err();
        assert!(err.is_construction());
        assert!(err.to_string().contains("nowhere"));
    }

    #[test]
    fn test_every_deploy_step_builds() {
        let topology = Topology::parse(TOPOLOGY).unwrap();
        let ctx = SharedContext::new();
        ctx.set(OPTION_POOL_TOPOLOGY, serde_json::json!({"servers": []}));
        for kind in [
            StepKind::CreateContainer,
            StepKind::SyncConfig,
            StepKind::StartService,
            StepKind::StopService,
            StepKind::RestartService,
            StepKind::CleanService,
            StepKind::InitServiceStatus,
            StepKind::GetServiceStatus,
            StepKind::CreatePhysicalPool,
            StepKind::CreateLogicalPool,
            StepKind::BalanceLeader,
        ] {
            let step = Step::new(kind, topology.deploy_configs().to_vec());
            let tasks = playbook::build_tasks(&step, &builder(), &ctx).unwrap();
            assert_eq!(tasks.len(), 2, "{kind}");
            assert_eq!(tasks[0].name(), kind.description());
            assert_eq!(tasks[0].host(), "server-host1");
            assert!(tasks[0].tid().is_some());
        }

        // etcd and mds share host and image
        let step = Step::new(StepKind::PullImage, topology.deploy_configs().to_vec());
        assert_eq!(playbook::build_tasks(&step, &builder(), &ctx).unwrap().len(), 1);
    }

    #[test]
    fn test_container_steps_reject_generic_records() {
        let configs = vec![GenericConfig::new("local", "host")];
        let step = Step::new(StepKind::StartService, configs);
        let err = playbook::build_tasks(&step, &builder(), &SharedContext::new()).unwrap_err();
        assert!(err.is_construction());
    }

    #[test]
    fn test_ssh_check_runs_on_local_host() {
        let mut playbook = Playbook::new();
        playbook.add_step(Step::new(
            StepKind::CheckSshConnect,
            vec![GenericConfig::new("local", "host")],
        ));
        let report = playbook.run(&builder(), &SharedContext::new(), &NoProgress);
        assert!(report.is_success(), "{:?}", report.error());
        assert_eq!(report.steps[0].results[0].output(), "ok");
    }

    #[test]
    fn test_failed_command_keeps_output() {
        let remote = builder().remote("local").unwrap();
        let err = exec(&remote, "echo boom >&2; exit 4", ErrorCode::RemoteCommandFailed)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::RemoteCommandFailed);
        assert_eq!(err.message, "exit status 4");
        assert_eq!(err.output, "boom");
    }

    fn exited(status: i32) -> io::Result<CommandOutput> {
        Ok(CommandOutput {
            status,
            stdout: String::new(),
            stderr: String::new(),
        })
    }

    #[test]
    fn test_ignore_status_still_reports_unreachable_host() {
        let remote = builder().remote("server-host1").unwrap();

        let err = ignore_status(&remote, Err(io::Error::from(io::ErrorKind::NotFound)))
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::SshConnectFailed);

        let err = ignore_status(&remote, exited(crate::ssh::SSH_CONNECTION_FAILED)).unwrap_err();
        assert_eq!(err.code, ErrorCode::SshConnectFailed);
        assert!(err.message.contains("10.0.1.1"));

        assert!(ignore_status(&remote, exited(1)).is_ok());
    }

    #[test]
    fn test_ignore_status_on_local_host() {
        let remote = builder().remote("local").unwrap();
        assert!(exec_ignore_status(&remote, "exit 3").is_ok());
        // a local 255 is a plain exit status
        assert!(ignore_status(&remote, exited(255)).is_ok());
    }
}
