//! Steps: one named stage of a playbook

use crate::config::ConfigList;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use topology::CLIENT_ROLE;

/// Every kind of step the engine knows how to build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StepKind {
    // precheck
    CheckSshConnect,
    CheckPermission,
    CheckKernelVersion,
    CheckPortInUse,
    CleanPrecheckEnvironment,
    // service lifecycle
    PullImage,
    CreateContainer,
    SyncConfig,
    StartService,
    StopService,
    RestartService,
    CleanService,
    InitServiceStatus,
    GetServiceStatus,
    // cluster bootstrap, run once
    CreatePhysicalPool,
    CreateLogicalPool,
    BalanceLeader,
    // client
    MountFs,
    UmountFs,
    // monitor
    StartMonitor,
    StopMonitor,
}

/// Which entries a step kind applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applicability {
    Any,
    /// Only long-running services; client records are excluded
    ServicesOnly,
}

impl Applicability {
    pub fn admits(&self, role: &str) -> bool {
        match self {
            Self::Any => true,
            Self::ServicesOnly => role != CLIENT_ROLE,
        }
    }
}

/// Which entries of one step collapse into a single task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupScope {
    /// Every entry gets its own task
    None,
    /// Once per host
    Host,
    /// Once per (host, value of the named attribute)
    HostResource(&'static str),
}

impl StepKind {
    pub const ALL: [StepKind; 21] = [
        Self::CheckSshConnect,
        Self::CheckPermission,
        Self::CheckKernelVersion,
        Self::CheckPortInUse,
        Self::CleanPrecheckEnvironment,
        Self::PullImage,
        Self::CreateContainer,
        Self::SyncConfig,
        Self::StartService,
        Self::StopService,
        Self::RestartService,
        Self::CleanService,
        Self::InitServiceStatus,
        Self::GetServiceStatus,
        Self::CreatePhysicalPool,
        Self::CreateLogicalPool,
        Self::BalanceLeader,
        Self::MountFs,
        Self::UmountFs,
        Self::StartMonitor,
        Self::StopMonitor,
    ];

    /// Stable identifier, e.g. `START_SERVICE`
    pub fn name(&self) -> &'static str {
        match self {
            Self::CheckSshConnect => "CHECK_SSH_CONNECT",
            Self::CheckPermission => "CHECK_PERMISSION",
            Self::CheckKernelVersion => "CHECK_KERNEL_VERSION",
            Self::CheckPortInUse => "CHECK_PORT_IN_USE",
            Self::CleanPrecheckEnvironment => "CLEAN_PRECHECK_ENVIRONMENT",
            Self::PullImage => "PULL_IMAGE",
            Self::CreateContainer => "CREATE_CONTAINER",
            Self::SyncConfig => "SYNC_CONFIG",
            Self::StartService => "START_SERVICE",
            Self::StopService => "STOP_SERVICE",
            Self::RestartService => "RESTART_SERVICE",
            Self::CleanService => "CLEAN_SERVICE",
            Self::InitServiceStatus => "INIT_SERVICE_STATUS",
            Self::GetServiceStatus => "GET_SERVICE_STATUS",
            Self::CreatePhysicalPool => "CREATE_PHYSICAL_POOL",
            Self::CreateLogicalPool => "CREATE_LOGICAL_POOL",
            Self::BalanceLeader => "BALANCE_LEADER",
            Self::MountFs => "MOUNT_FILESYSTEM",
            Self::UmountFs => "UMOUNT_FILESYSTEM",
            Self::StartMonitor => "START_MONITOR",
            Self::StopMonitor => "STOP_MONITOR",
        }
    }

    /// Human label for progress output
    pub fn description(&self) -> &'static str {
        match self {
            Self::CheckSshConnect => "Check SSH Connect",
            Self::CheckPermission => "Check Permission",
            Self::CheckKernelVersion => "Check Kernel Version",
            Self::CheckPortInUse => "Check Port In Use",
            Self::CleanPrecheckEnvironment => "Clean Precheck Environment",
            Self::PullImage => "Pull Image",
            Self::CreateContainer => "Create Container",
            Self::SyncConfig => "Sync Config",
            Self::StartService => "Start Service",
            Self::StopService => "Stop Service",
            Self::RestartService => "Restart Service",
            Self::CleanService => "Clean Service",
            Self::InitServiceStatus => "Init Service Status",
            Self::GetServiceStatus => "Get Service Status",
            Self::CreatePhysicalPool => "Create Physical Pool",
            Self::CreateLogicalPool => "Create Logical Pool",
            Self::BalanceLeader => "Balance Leader",
            Self::MountFs => "Mount Filesystem",
            Self::UmountFs => "Umount Filesystem",
            Self::StartMonitor => "Start Monitor",
            Self::StopMonitor => "Stop Monitor",
        }
    }

    pub fn applicability(&self) -> Applicability {
        match self {
            Self::CheckPortInUse
            | Self::StartService
            | Self::StopService
            | Self::RestartService
            | Self::InitServiceStatus
            | Self::GetServiceStatus
            | Self::CreatePhysicalPool
            | Self::CreateLogicalPool
            | Self::BalanceLeader => Applicability::ServicesOnly,
            Self::CheckSshConnect
            | Self::CheckPermission
            | Self::CheckKernelVersion
            | Self::CleanPrecheckEnvironment
            | Self::PullImage
            | Self::CreateContainer
            | Self::SyncConfig
            | Self::CleanService
            | Self::MountFs
            | Self::UmountFs
            | Self::StartMonitor
            | Self::StopMonitor => Applicability::Any,
        }
    }

    pub fn dedup_scope(&self) -> DedupScope {
        match self {
            Self::CheckSshConnect
            | Self::CheckPermission
            | Self::CheckKernelVersion
            | Self::CleanPrecheckEnvironment => DedupScope::Host,
            Self::PullImage => DedupScope::HostResource(topology::KEY_IMAGE),
            Self::CheckPortInUse
            | Self::CreateContainer
            | Self::SyncConfig
            | Self::StartService
            | Self::StopService
            | Self::RestartService
            | Self::CleanService
            | Self::InitServiceStatus
            | Self::GetServiceStatus
            | Self::CreatePhysicalPool
            | Self::CreateLogicalPool
            | Self::BalanceLeader
            | Self::MountFs
            | Self::UmountFs
            | Self::StartMonitor
            | Self::StopMonitor => DedupScope::None,
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How a step's tasks are executed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOptions {
    /// Maximum tasks in flight; 0 runs every task at once
    pub concurrency: usize,
    pub silent_main_bar: bool,
    pub silent_sub_bar: bool,
    /// Run every task and merge failures instead of halting on the first
    pub skip_error: bool,
    /// Use only the first N applicable entries; 0 means all
    pub limit: usize,
}

/// Step kind + targets + options + execution policy
#[derive(Debug, Clone)]
pub struct Step {
    pub kind: StepKind,
    pub configs: ConfigList,
    pub options: BTreeMap<String, Value>,
    pub exec: ExecOptions,
}

impl Step {
    pub fn new(kind: StepKind, configs: impl Into<ConfigList>) -> Self {
        Self {
            kind,
            configs: configs.into(),
            options: BTreeMap::new(),
            exec: ExecOptions::default(),
        }
    }

    pub fn option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.exec.concurrency = concurrency;
        self
    }

    pub fn skip_error(mut self, skip: bool) -> Self {
        self.exec.skip_error = skip;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.exec.limit = limit;
        self
    }

    pub fn silent_main_bar(mut self, silent: bool) -> Self {
        self.exec.silent_main_bar = silent;
        self
    }

    pub fn silent_sub_bar(mut self, silent: bool) -> Self {
        self.exec.silent_sub_bar = silent;
        self
    }

    pub fn name(&self) -> &'static str {
        self.kind.description()
    }
}
