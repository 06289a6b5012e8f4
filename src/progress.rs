//! Terminal progress for playbook runs.
//!
//! One main bar per step counts finished tasks; each task that reports a
//! stage gets a spinner underneath it, cleared when the step ends.

use colored::Colorize;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use playbook::{Outcome, ProgressReporter, TaskResult};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

fn main_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{spinner:.green} {prefix:.bold} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=>-")
}

fn sub_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("    {spinner:.blue} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

#[derive(Default)]
struct Bars {
    main: Option<ProgressBar>,
    subs: HashMap<usize, ProgressBar>,
}

/// indicatif-backed [`ProgressReporter`]
pub struct TerminalProgress {
    multi: MultiProgress,
    bars: Mutex<Bars>,
}

impl TerminalProgress {
    pub fn new(quiet: bool) -> Self {
        let multi = MultiProgress::new();
        if quiet {
            multi.set_draw_target(ProgressDrawTarget::hidden());
        }
        Self {
            multi,
            bars: Mutex::new(Bars::default()),
        }
    }

    fn bars(&self) -> MutexGuard<'_, Bars> {
        match self.bars.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl ProgressReporter for TerminalProgress {
    fn on_step_start(&self, step: &str, total: usize) {
        let pb = self.multi.add(ProgressBar::new(total as u64));
        pb.set_style(main_style());
        pb.set_prefix(step.to_string());
        pb.enable_steady_tick(Duration::from_millis(120));

        let mut bars = self.bars();
        bars.subs.clear();
        bars.main = Some(pb);
    }

    fn on_task_complete(&self, result: &TaskResult) {
        let bars = self.bars();
        if let Some(main) = &bars.main {
            main.inc(1);
        }
        if let Some(sub) = bars.subs.get(&result.index) {
            let mark = match &result.outcome {
                Outcome::Succeeded(_) => "✓".green(),
                Outcome::Failed(_) => "✗".red(),
                Outcome::NotRun => "-".dimmed(),
            };
            sub.finish_with_message(format!("{mark} {}", result.host));
        }
    }

    fn on_sub_step(&self, index: usize, host: &str, message: &str) {
        let mut bars = self.bars();
        let multi = &self.multi;
        let sub = bars.subs.entry(index).or_insert_with(|| {
            let pb = multi.add(ProgressBar::new_spinner());
            pb.set_style(sub_style());
            pb.enable_steady_tick(Duration::from_millis(120));
            pb
        });
        sub.set_message(format!("{host}: {message}"));
    }

    fn on_step_finish(&self, _step: &str, succeeded: usize, failed: usize) {
        let mut bars = self.bars();
        for (_, sub) in bars.subs.drain() {
            sub.finish_and_clear();
            self.multi.remove(&sub);
        }
        if let Some(main) = bars.main.take() {
            let summary = if failed == 0 {
                format!("{} {succeeded} ok", "✓".green())
            } else {
                format!("{} {succeeded} ok, {failed} failed", "✗".red())
            };
            main.finish_with_message(summary);
        }
    }
}
