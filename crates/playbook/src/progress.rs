//! Progress hooks
//!
//! The main bar counts finished tasks of a step; the sub bar reports
//! finer-grained stages inside one task. Either can be silenced per step.

use crate::task::TaskResult;

/// Receives progress updates during execution.
///
/// Called from worker threads; main-bar hooks are serialized by the
/// executor, sub-bar hooks are not.
pub trait ProgressReporter: Send + Sync {
    /// A step is about to run `total` tasks
    fn on_step_start(&self, _step: &str, _total: usize) {}

    /// A task finished (or was not run)
    fn on_task_complete(&self, _result: &TaskResult) {}

    /// A task moved to a new stage
    fn on_sub_step(&self, _index: usize, _host: &str, _message: &str) {}

    /// Every task of the step has been accounted for
    fn on_step_finish(&self, _step: &str, _succeeded: usize, _failed: usize) {}
}

/// No-op reporter
pub struct NoProgress;

impl ProgressReporter for NoProgress {}
