//! Tasks: host-bound units of work produced for a step

use crate::context::SharedContext;
use crate::error::{ErrorCode, TaskError};
use crate::progress::ProgressReporter;
use serde::Serialize;
use std::fmt;

/// The work a task performs. Returns the remote output on success.
pub trait Operation: Send + Sync {
    fn run(&self, ctx: &TaskContext<'_>) -> Result<String, TaskError>;
}

impl<F> Operation for F
where
    F: Fn(&TaskContext<'_>) -> Result<String, TaskError> + Send + Sync,
{
    fn run(&self, ctx: &TaskContext<'_>) -> Result<String, TaskError> {
        self(ctx)
    }
}

/// One operation bound to one host.
///
/// `tid`/`ptid` correlate results of several steps with one service record;
/// they are set only for tasks built from deploy configs.
pub struct Task {
    name: String,
    host: String,
    tid: Option<String>,
    ptid: Option<String>,
    operation: Box<dyn Operation>,
}

impl Task {
    pub fn new(
        name: impl Into<String>,
        host: impl Into<String>,
        operation: impl Operation + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            tid: None,
            ptid: None,
            operation: Box::new(operation),
        }
    }

    pub fn with_ids(mut self, tid: impl Into<String>, ptid: impl Into<String>) -> Self {
        self.tid = Some(tid.into());
        self.ptid = Some(ptid.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn tid(&self) -> Option<&str> {
        self.tid.as_deref()
    }

    pub fn ptid(&self) -> Option<&str> {
        self.ptid.as_deref()
    }

    /// Run the operation; a panic inside it becomes a task error
    pub fn run(&self, ctx: &TaskContext<'_>) -> Result<String, TaskError> {
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            self.operation.run(ctx)
        }));
        let result = match outcome {
            Ok(result) => result,
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "task panicked".to_string());
                Err(TaskError::new(ErrorCode::Unknown, message))
            }
        };
        result.map_err(|e| e.locate(&self.name, &self.host))
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("host", &self.host)
            .field("tid", &self.tid)
            .field("ptid", &self.ptid)
            .finish_non_exhaustive()
    }
}

/// What an operation can see while it runs
pub struct TaskContext<'a> {
    index: usize,
    host: &'a str,
    shared: &'a SharedContext,
    progress: &'a dyn ProgressReporter,
    silent: bool,
}

impl<'a> TaskContext<'a> {
    pub fn new(
        index: usize,
        host: &'a str,
        shared: &'a SharedContext,
        progress: &'a dyn ProgressReporter,
        silent: bool,
    ) -> Self {
        Self {
            index,
            host,
            shared,
            progress,
            silent,
        }
    }

    /// Position of the task in its step
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn host(&self) -> &str {
        self.host
    }

    pub fn shared(&self) -> &SharedContext {
        self.shared
    }

    /// Report a stage change on the task's sub bar
    pub fn sub_step(&self, message: &str) {
        if !self.silent {
            self.progress.on_sub_step(self.index, self.host, message);
        }
    }
}

/// How a task ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Succeeded(String),
    Failed(TaskError),
    /// Skipped because an earlier failure halted the step
    NotRun,
}

/// Result of one task, tagged with its submission index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskResult {
    pub index: usize,
    pub name: String,
    pub host: String,
    pub tid: Option<String>,
    pub ptid: Option<String>,
    pub outcome: Outcome,
}

impl TaskResult {
    pub fn new(index: usize, task: &Task, outcome: Outcome) -> Self {
        Self {
            index,
            name: task.name.clone(),
            host: task.host.clone(),
            tid: task.tid.clone(),
            ptid: task.ptid.clone(),
            outcome,
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self.outcome, Outcome::Succeeded(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, Outcome::Failed(_))
    }

    pub fn error(&self) -> Option<&TaskError> {
        match &self.outcome {
            Outcome::Failed(e) => Some(e),
            _ => None,
        }
    }

    /// Remote output, from success or failure
    pub fn output(&self) -> &str {
        match &self.outcome {
            Outcome::Succeeded(out) => out,
            Outcome::Failed(e) => &e.output,
            Outcome::NotRun => "",
        }
    }

    pub fn state(&self) -> TaskState {
        match self.outcome {
            Outcome::Succeeded(_) => TaskState::Succeeded,
            Outcome::Failed(_) => TaskState::Failed,
            Outcome::NotRun => TaskState::NotRun,
        }
    }
}

/// Outcome without payload, for summaries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TaskState {
    Succeeded,
    Failed,
    NotRun,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoProgress;

    #[test]
    fn test_run_locates_errors() {
        let task = Task::new("Start Service", "host-a", |_: &TaskContext<'_>| {
            Err(TaskError::new(ErrorCode::RemoteCommandFailed, "exit 1").with_output("oops"))
        });
        let ctx = SharedContext::new();
        let tctx = TaskContext::new(0, task.host(), &ctx, &NoProgress, false);
        let err = task.run(&tctx).unwrap_err();
        assert_eq!(err.host, "host-a");
        assert_eq!(err.task, "Start Service");
        assert_eq!(err.output, "oops");
    }

    #[test]
    fn test_panic_becomes_task_error() {
        let task = Task::new("Explode", "host-a", |_: &TaskContext<'_>| -> Result<String, TaskError> {
            panic!("kaboom")
        });
        let ctx = SharedContext::new();
        let tctx = TaskContext::new(0, task.host(), &ctx, &NoProgress, false);
        let err = task.run(&tctx).unwrap_err();
        assert_eq!(err.code, ErrorCode::Unknown);
        assert!(err.message.contains("kaboom"));
    }

    #[test]
    fn test_result_accessors() {
        let task = Task::new("Get Status", "h", |_: &TaskContext<'_>| Ok("up".to_string()))
            .with_ids("tid1", "ptid1");
        let ok = TaskResult::new(2, &task, Outcome::Succeeded("up".into()));
        assert!(ok.is_ok());
        assert_eq!(ok.output(), "up");
        assert_eq!(ok.tid.as_deref(), Some("tid1"));
        assert_eq!(ok.state(), TaskState::Succeeded);

        let skipped = TaskResult::new(3, &task, Outcome::NotRun);
        assert_eq!(skipped.state(), TaskState::NotRun);
        assert!(skipped.error().is_none());
    }
}
