//! Unbounded fan-out with ordered delivery.
//!
//! Every job gets its own thread. Results arrive in completion order and are
//! handed to the consumer in submission order: an out-of-order result waits
//! in a buffer until every lower index has been delivered. The consumer
//! stops once every producer is done, so nothing is lost to an early close.

use crate::context::SharedContext;
use crate::progress::ProgressReporter;
use crate::task::{Outcome, Task, TaskContext, TaskResult};
use std::collections::BTreeMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

/// One-shot ordered fan-out over a set of jobs
pub struct OrderedFanout<T> {
    sender: Option<Sender<(usize, T)>>,
    receiver: Receiver<(usize, T)>,
    pending: BTreeMap<usize, T>,
    next: usize,
}

impl<T: Send> Default for OrderedFanout<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send> OrderedFanout<T> {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            sender: Some(sender),
            receiver,
            pending: BTreeMap::new(),
            next: 0,
        }
    }

    /// Run every job concurrently and feed `sink` with `(index, value)` in
    /// index order. Returns the number of values delivered.
    ///
    /// A job that panics produces no value; results behind it are still
    /// delivered once all producers have finished.
    pub fn run<F, S>(mut self, jobs: Vec<F>, mut sink: S) -> usize
    where
        F: FnOnce() -> T + Send,
        S: FnMut(usize, T),
    {
        let Some(sender) = self.sender.take() else {
            return 0;
        };
        let mut delivered = 0;

        thread::scope(|scope| {
            for (index, job) in jobs.into_iter().enumerate() {
                let tx = sender.clone();
                scope.spawn(move || {
                    if let Ok(value) = catch_unwind(AssertUnwindSafe(job)) {
                        // receiver outlives the scope
                        let _ = tx.send((index, value));
                    }
                });
            }
            drop(sender);

            for (index, value) in self.receiver.iter() {
                self.pending.insert(index, value);
                while let Some(value) = self.pending.remove(&self.next) {
                    sink(self.next, value);
                    self.next += 1;
                    delivered += 1;
                }
            }
        });

        for (index, value) in std::mem::take(&mut self.pending) {
            log::debug!("delivering result {index} after a gap at {}", self.next);
            sink(index, value);
            delivered += 1;
        }
        delivered
    }
}

/// Run every task at once and hand results to `sink` in task order
pub fn stream_tasks(
    tasks: &[Task],
    ctx: &SharedContext,
    progress: &dyn ProgressReporter,
    mut sink: impl FnMut(TaskResult),
) -> usize {
    let jobs: Vec<_> = tasks
        .iter()
        .enumerate()
        .map(|(index, task)| {
            move || {
                let tctx = TaskContext::new(index, task.host(), ctx, progress, false);
                let outcome = match task.run(&tctx) {
                    Ok(output) => Outcome::Succeeded(output),
                    Err(e) => Outcome::Failed(e),
                };
                TaskResult::new(index, task, outcome)
            }
        })
        .collect();

    OrderedFanout::new().run(jobs, |_, result| {
        progress.on_task_complete(&result);
        sink(result);
    })
}
