//! # Playbook
//!
//! Step/task orchestration for fleet operations.
//!
//! A [`Playbook`] is an ordered list of [`Step`]s plus post steps that always
//! run. Each step turns its [`ConfigList`] into [`Task`]s through a caller
//! supplied [`TaskBuilder`], then runs them on a bounded worker pool.
//!
//! ## Core Concepts
//!
//! - **ConfigList**: a homogeneous, indexable view over deploy, client,
//!   monitor or generic records
//! - **Task**: one operation bound to one host, tagged with service ids when
//!   built from deploy records
//! - **Step**: a [`StepKind`] with targets, options and an [`ExecOptions`]
//!   policy (concurrency, skip-error, limit, progress silencing)
//! - **SharedContext**: process-wide key/value store; step options are
//!   published there before tasks are built
//! - **OrderedFanout**: unbounded fan-out that delivers results in
//!   submission order as they stream in
//!
//! ## Example
//!
//! ```ignore
//! use playbook::{NoProgress, Playbook, SharedContext, Step, StepKind};
//!
//! let mut playbook = Playbook::new();
//! playbook
//!     .add_step(Step::new(StepKind::PullImage, configs.clone()).concurrency(4))
//!     .add_step(Step::new(StepKind::StartService, configs).concurrency(4))
//!     .add_post_step(Step::new(StepKind::CleanPrecheckEnvironment, hosts));
//!
//! let report = playbook.run(&builder, SharedContext::global(), &NoProgress);
//! report.into_result()?;
//! ```

mod config;
mod context;
mod error;
mod executor;
mod factory;
mod playbook;
mod progress;
mod report;
mod step;
mod stream;
mod task;

pub use config::{ConfigEntry, ConfigList, ConfigRef};
pub use context::{ContextTransaction, SharedContext};
pub use error::{AggregateError, Error, ErrorCode, Result, TaskError};
pub use executor::{StepOutcome, execute, worker_count};
pub use factory::{TaskBuilder, build_tasks};
pub use playbook::Playbook;
pub use progress::{NoProgress, ProgressReporter};
pub use report::{PlaybookReport, ServiceRecord, StepReport};
pub use step::{Applicability, DedupScope, ExecOptions, Step, StepKind};
pub use stream::{OrderedFanout, stream_tasks};
pub use task::{Operation, Outcome, Task, TaskContext, TaskResult, TaskState};
