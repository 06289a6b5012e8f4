//! Bounded worker pool for the tasks of one step.
//!
//! At most `concurrency` tasks run at once (all of them when it is 0).
//! Without `skip_error` the first failure halts the step: tasks that have not
//! started yet are recorded as [`Outcome::NotRun`] and tasks already in
//! flight finish normally. With `skip_error` every task runs and the failures
//! are merged into one [`AggregateError`].

use crate::context::SharedContext;
use crate::error::{AggregateError, Error, TaskError};
use crate::progress::{NoProgress, ProgressReporter};
use crate::step::ExecOptions;
use crate::task::{Outcome, Task, TaskContext, TaskResult};
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

/// Everything a step run produced
#[derive(Debug, Default)]
pub struct StepOutcome {
    /// One result per task, in submission order
    pub results: Vec<TaskResult>,
    pub error: Option<Error>,
}

impl StepOutcome {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.iter().filter(|r| r.is_failed()).count()
    }
}

/// Completion bookkeeping, updated under one lock so progress callbacks are
/// serialized and failures keep completion order
#[derive(Default)]
struct Tally {
    completed: usize,
    failures: Vec<TaskError>,
}

fn lock(tally: &Mutex<Tally>) -> MutexGuard<'_, Tally> {
    match tally.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Number of worker threads for `total` tasks
pub fn worker_count(concurrency: usize, total: usize) -> usize {
    if concurrency == 0 {
        total
    } else {
        concurrency.min(total)
    }
}

/// Run the tasks of one step
pub fn execute(
    step: &str,
    tasks: &[Task],
    exec: &ExecOptions,
    ctx: &SharedContext,
    progress: &dyn ProgressReporter,
) -> StepOutcome {
    let total = tasks.len();
    let main: &dyn ProgressReporter = if exec.silent_main_bar {
        &NoProgress
    } else {
        progress
    };

    main.on_step_start(step, total);
    if total == 0 {
        main.on_step_finish(step, 0, 0);
        return StepOutcome::default();
    }

    let workers = worker_count(exec.concurrency, total);
    let pool = match rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("playbook-worker-{i}"))
        .build()
    {
        Ok(pool) => pool,
        Err(e) => {
            return StepOutcome {
                results: Vec::new(),
                error: Some(Error::ThreadPool(e.to_string())),
            };
        }
    };

    log::debug!("{step}: {total} task(s) on {workers} worker(s)");

    let halted = AtomicBool::new(false);
    let tally = Mutex::new(Tally::default());

    let results: Vec<TaskResult> = pool.install(|| {
        tasks
            .par_iter()
            .enumerate()
            .map(|(index, task)| {
                let outcome = if halted.load(Ordering::SeqCst) {
                    Outcome::NotRun
                } else {
                    let tctx =
                        TaskContext::new(index, task.host(), ctx, progress, exec.silent_sub_bar);
                    match task.run(&tctx) {
                        Ok(output) => Outcome::Succeeded(output),
                        Err(e) => {
                            if !exec.skip_error {
                                halted.store(true, Ordering::SeqCst);
                            }
                            Outcome::Failed(e)
                        }
                    }
                };

                let result = TaskResult::new(index, task, outcome);
                let mut tally = lock(&tally);
                tally.completed += 1;
                if let Some(e) = result.error() {
                    log::debug!("{step}: {e}");
                    tally.failures.push(e.clone());
                }
                main.on_task_complete(&result);
                drop(tally);
                result
            })
            .collect()
    });

    let tally = match tally.into_inner() {
        Ok(t) => t,
        Err(poisoned) => poisoned.into_inner(),
    };

    let mut outcome = StepOutcome {
        results,
        error: None,
    };
    main.on_step_finish(step, outcome.succeeded(), tally.failures.len());

    let mut failures = tally.failures;
    if !failures.is_empty() {
        outcome.error = Some(if exec.skip_error {
            Error::Aggregate(AggregateError::new(failures))
        } else {
            Error::Task(failures.swap_remove(0))
        });
    }
    outcome
}
