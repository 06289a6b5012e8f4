//! Error types for playbook construction and execution.
//!
//! Errors fall in two families: construction errors, raised while a step's
//! tasks are being built (nothing remote has happened yet), and task errors,
//! raised by a task's remote operation. When a step collects failures
//! instead of aborting, its task errors are merged into one
//! [`AggregateError`] that keeps the most severe code and every message.

use serde::Serialize;
use std::fmt;
use thiserror::Error;
use topology::ConfigKind;

/// Numeric code reported for a failed task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorCode {
    /// Service reported itself down or unhealthy
    ServiceUnhealthy,
    /// A precheck found a listening port already taken
    PortInUse,
    /// Host kernel is too old for the service
    KernelUnsupported,
    /// Remote user lacks a required permission
    PermissionDenied,
    /// Remote command exited non-zero
    RemoteCommandFailed,
    /// Copying a file to the host failed
    CopyFailed,
    /// Metadata service RPC failed
    RpcFailed,
    /// Operation exceeded its deadline
    Timeout,
    /// Host could not be reached over SSH
    SshConnectFailed,
    /// Anything else
    Unknown,
}

impl ErrorCode {
    pub fn value(&self) -> u32 {
        match self {
            Self::ServiceUnhealthy => 410_000,
            Self::PortInUse => 510_000,
            Self::KernelUnsupported => 520_000,
            Self::PermissionDenied => 530_000,
            Self::RemoteCommandFailed => 620_000,
            Self::CopyFailed => 630_000,
            Self::RpcFailed => 640_000,
            Self::Timeout => 650_000,
            Self::SshConnectFailed => 710_000,
            Self::Unknown => 999_999,
        }
    }

    /// Higher is worse. Used to pick the code of an aggregate failure.
    pub fn severity(&self) -> u8 {
        match self {
            Self::ServiceUnhealthy => 1,
            Self::PortInUse | Self::KernelUnsupported | Self::PermissionDenied => 2,
            Self::RemoteCommandFailed
            | Self::CopyFailed
            | Self::RpcFailed
            | Self::Timeout
            | Self::Unknown => 3,
            Self::SshConnectFailed => 4,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::ServiceUnhealthy => "service unhealthy",
            Self::PortInUse => "port already in use",
            Self::KernelUnsupported => "kernel version unsupported",
            Self::PermissionDenied => "permission denied",
            Self::RemoteCommandFailed => "remote command failed",
            Self::CopyFailed => "file copy failed",
            Self::RpcFailed => "rpc failed",
            Self::Timeout => "operation timed out",
            Self::SshConnectFailed => "ssh connect failed",
            Self::Unknown => "unknown error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value())
    }
}

/// One task's remote operation failed.
///
/// `output` keeps whatever the remote side printed so callers can show it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("[{host}] {task}: {message} (code {code})")]
pub struct TaskError {
    pub code: ErrorCode,
    pub host: String,
    pub task: String,
    pub message: String,
    pub output: String,
}

impl TaskError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            host: String::new(),
            task: String::new(),
            message: message.into(),
            output: String::new(),
        }
    }

    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = output.into();
        self
    }

    /// Fill in where the error happened; fields already set are kept
    pub(crate) fn locate(mut self, task: &str, host: &str) -> Self {
        if self.task.is_empty() {
            self.task = task.to_string();
        }
        if self.host.is_empty() {
            self.host = host.to_string();
        }
        self
    }
}

/// Several task failures reported as one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateError {
    pub code: ErrorCode,
    pub errors: Vec<TaskError>,
}

impl AggregateError {
    /// Merge task errors, keeping the most severe code (first wins on ties)
    pub fn new(errors: Vec<TaskError>) -> Self {
        let mut code = ErrorCode::Unknown;
        let mut worst = 0;
        for e in &errors {
            if e.code.severity() > worst {
                worst = e.code.severity();
                code = e.code;
            }
        }
        Self { code, errors }
    }
}

impl fmt::Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} task(s) failed (code {})", self.errors.len(), self.code)?;
        for e in &self.errors {
            write!(f, "\n  - {e}")?;
        }
        Ok(())
    }
}

impl std::error::Error for AggregateError {}

/// Errors raised by the orchestration engine
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// A step's tasks could not be built
    #[error("failed to build step {step}: {message}")]
    Construction { step: String, message: String },

    /// A kind-specific accessor was called on a list of another kind
    #[error("config list holds {actual} records, {expected} requested")]
    KindMismatch {
        expected: ConfigKind,
        actual: ConfigKind,
    },

    /// Config index past the end of the list
    #[error("config index {index} out of range (len {len})")]
    IndexOutOfRange { index: usize, len: usize },

    /// A projection was requested over records of different kinds
    #[error("mixed config kinds in one list: {first} and {other}")]
    MixedKinds { first: ConfigKind, other: ConfigKind },

    /// A single task failed and the step does not skip errors
    #[error(transparent)]
    Task(#[from] TaskError),

    /// Task failures collected by a step that skips errors
    #[error(transparent)]
    Aggregate(#[from] AggregateError),

    /// Worker pool could not be started
    #[error("failed to create worker pool: {0}")]
    ThreadPool(String),
}

impl Error {
    pub fn construction(step: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Construction {
            step: step.into(),
            message: message.to_string(),
        }
    }

    /// True when nothing remote was attempted for the failing step
    pub fn is_construction(&self) -> bool {
        matches!(
            self,
            Self::Construction { .. }
                | Self::KindMismatch { .. }
                | Self::IndexOutOfRange { .. }
                | Self::MixedKinds { .. }
        )
    }

    /// Code of the failed task(s), if the error came from execution
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Self::Task(e) => Some(e.code),
            Self::Aggregate(e) => Some(e.code),
            _ => None,
        }
    }
}

/// Result type for playbook operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    fn task_error(code: ErrorCode, host: &str) -> TaskError {
        TaskError::new(code, "boom").locate("Start Service", host)
    }

    #[test]
    fn test_aggregate_keeps_most_severe_code() {
        let agg = AggregateError::new(vec![
            task_error(ErrorCode::ServiceUnhealthy, "a"),
            task_error(ErrorCode::SshConnectFailed, "b"),
            task_error(ErrorCode::RemoteCommandFailed, "c"),
        ]);
        assert_eq!(agg.code, ErrorCode::SshConnectFailed);
    }

    #[test]
    fn test_aggregate_ties_keep_first() {
        let agg = AggregateError::new(vec![
            task_error(ErrorCode::RpcFailed, "a"),
            task_error(ErrorCode::RemoteCommandFailed, "b"),
        ]);
        assert_eq!(agg.code, ErrorCode::RpcFailed);
    }

    #[test]
    fn test_aggregate_message_lists_every_host() {
        let agg = AggregateError::new(vec![
            task_error(ErrorCode::RemoteCommandFailed, "host-a"),
            task_error(ErrorCode::RemoteCommandFailed, "host-b"),
        ]);
        let text = Error::from(agg).to_string();
        assert!(text.contains("2 task(s) failed"));
        assert!(text.contains("[host-a]"));
        assert!(text.contains("[host-b]"));
    }

    #[test]
    fn test_locate_keeps_existing_fields() {
        let mut e = TaskError::new(ErrorCode::Timeout, "slow");
        e.host = "explicit".to_string();
        let e = e.locate("Pull Image", "fallback");
        assert_eq!(e.host, "explicit");
        assert_eq!(e.task, "Pull Image");
    }

    #[test]
    fn test_error_classification() {
        assert!(Error::construction("START_SERVICE", "bad option").is_construction());
        let task = Error::from(task_error(ErrorCode::PortInUse, "a"));
        assert!(!task.is_construction());
        assert_eq!(task.code(), Some(ErrorCode::PortInUse));
    }
}
