//! Ordered steps plus cleanup steps that always run

use crate::context::SharedContext;
use crate::error::Result;
use crate::executor::execute;
use crate::factory::{TaskBuilder, build_tasks};
use crate::progress::ProgressReporter;
use crate::report::{PlaybookReport, StepReport};
use crate::step::Step;

/// A sequence of steps and the post steps that follow it.
///
/// Steps run strictly one after another. A step that fails without
/// `skip_error` ends the chain; a construction error always does. Post steps
/// run afterwards no matter how the chain ended, and their failures are only
/// logged.
#[derive(Debug, Default)]
pub struct Playbook {
    steps: Vec<Step>,
    post_steps: Vec<Step>,
}

impl Playbook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_step(&mut self, step: Step) -> &mut Self {
        self.steps.push(step);
        self
    }

    pub fn add_post_step(&mut self, step: Step) -> &mut Self {
        self.post_steps.push(step);
        self
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn post_steps(&self) -> &[Step] {
        &self.post_steps
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Run the main chain, then the post steps
    pub fn run(
        &self,
        builder: &dyn TaskBuilder,
        ctx: &SharedContext,
        progress: &dyn ProgressReporter,
    ) -> PlaybookReport {
        let mut report = PlaybookReport::default();

        for step in &self.steps {
            let step_report = match run_step(step, builder, ctx, progress) {
                Ok(r) => r,
                Err(e) => {
                    log::error!("{}: {e}", step.kind);
                    report.error.get_or_insert(e);
                    break;
                }
            };

            let failed = step_report.error.clone();
            report.steps.push(step_report);
            if let Some(e) = failed {
                log::warn!("{}: {e}", step.kind);
                report.error.get_or_insert(e);
                if !step.exec.skip_error {
                    break;
                }
            }
        }

        report.post_steps = self.run_post_steps(builder, ctx, progress);
        report
    }

    /// Run only the post steps; used when the main chain is abandoned before
    /// it starts
    pub fn run_post_steps(
        &self,
        builder: &dyn TaskBuilder,
        ctx: &SharedContext,
        progress: &dyn ProgressReporter,
    ) -> Vec<StepReport> {
        let mut reports = Vec::with_capacity(self.post_steps.len());
        for step in &self.post_steps {
            match run_step(step, builder, ctx, progress) {
                Ok(r) => {
                    if let Some(e) = &r.error {
                        log::warn!("post step {}: {e}", step.kind);
                    }
                    reports.push(r);
                }
                Err(e) => log::warn!("post step {}: {e}", step.kind),
            }
        }
        reports
    }
}

/// Publish options, build tasks, execute
fn run_step(
    step: &Step,
    builder: &dyn TaskBuilder,
    ctx: &SharedContext,
    progress: &dyn ProgressReporter,
) -> Result<StepReport> {
    if !step.options.is_empty() {
        let mut txn = ctx.begin();
        for (key, value) in &step.options {
            txn.set(key.clone(), value.clone());
        }
        txn.commit();
    }

    let tasks = build_tasks(step, builder, ctx)?;
    log::info!("{}: {} task(s)", step.kind, tasks.len());

    let outcome = execute(step.name(), &tasks, &step.exec, ctx, progress);
    Ok(StepReport::new(step.kind, outcome.results, outcome.error))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigRef;
    use crate::error::{Error, ErrorCode, TaskError};
    use crate::progress::NoProgress;
    use crate::step::StepKind;
    use crate::task::{Task, TaskContext, TaskState};
    use std::sync::{Arc, Mutex};
    use topology::{ConfigRecord, GenericConfig};

    /// Records every task run and fails the listed hosts
    #[derive(Default)]
    struct Scripted {
        fail_hosts: Vec<&'static str>,
        broken: Option<StepKind>,
        runs: Arc<Mutex<Vec<(StepKind, String)>>>,
    }

    impl Scripted {
        fn runs_of(&self, kind: StepKind) -> usize {
            self.runs.lock().unwrap().iter().filter(|(k, _)| *k == kind).count()
        }
    }

    impl TaskBuilder for Scripted {
        fn build(&self, kind: StepKind, entry: ConfigRef<'_>, ctx: &SharedContext) -> Result<Option<Task>> {
            if self.broken == Some(kind) {
                return Err(Error::construction(kind.name(), "bad option"));
            }
            if kind == StepKind::SyncConfig && ctx.get_str("image").is_none() {
                return Err(Error::construction(kind.name(), "image not published"));
            }
            let fail = self.fail_hosts.iter().any(|h| *h == entry.host());
            let runs = Arc::clone(&self.runs);
            let host = entry.host().to_string();
            Ok(Some(Task::new(kind.description(), entry.host(), move |_: &TaskContext<'_>| {
                runs.lock().unwrap().push((kind, host.clone()));
                if fail {
                    Err(TaskError::new(ErrorCode::RemoteCommandFailed, "exit 1"))
                } else {
                    Ok("ok".to_string())
                }
            })))
        }
    }

    fn services() -> Vec<GenericConfig> {
        vec![
            GenericConfig::new("hostA", "roleX"),
            GenericConfig::new("hostA", "roleY"),
            GenericConfig::new("hostB", "roleX"),
        ]
    }

    #[test]
    fn test_start_service_failure_on_one_host() {
        let builder = Scripted {
            fail_hosts: vec!["hostB"],
            ..Default::default()
        };
        let mut playbook = Playbook::new();
        playbook.add_step(Step::new(StepKind::StartService, services()).concurrency(2));
        playbook.add_step(Step::new(StepKind::GetServiceStatus, services()));
        playbook.add_post_step(Step::new(StepKind::CleanPrecheckEnvironment, services()));

        let report = playbook.run(&builder, &SharedContext::new(), &NoProgress);

        assert_eq!(report.steps.len(), 1);
        let start = &report.steps[0];
        assert_eq!(start.results.len(), 3);
        assert_eq!(start.results[2].state(), TaskState::Failed);
        match report.error() {
            Some(Error::Task(e)) => {
                assert_eq!(e.host, "hostB");
                assert_eq!(e.code, ErrorCode::RemoteCommandFailed);
            }
            other => panic!("expected task error, got {other:?}"),
        }
        assert_eq!(builder.runs_of(StepKind::GetServiceStatus), 0);
        // deduped per host
        assert_eq!(builder.runs_of(StepKind::CleanPrecheckEnvironment), 2);
        assert_eq!(report.post_steps.len(), 1);
    }

    #[test]
    fn test_skip_error_continues_chain() {
        let builder = Scripted {
            fail_hosts: vec!["hostB"],
            ..Default::default()
        };
        let mut playbook = Playbook::new();
        playbook
            .add_step(Step::new(StepKind::StopService, services()).skip_error(true))
            .add_step(Step::new(StepKind::CleanService, vec![GenericConfig::new("hostA", "roleX")]));

        let report = playbook.run(&builder, &SharedContext::new(), &NoProgress);

        assert_eq!(report.steps.len(), 2);
        assert_eq!(builder.runs_of(StepKind::StopService), 3);
        assert_eq!(builder.runs_of(StepKind::CleanService), 1);
        assert!(matches!(report.error(), Some(Error::Aggregate(_))));
        assert!(report.steps[1].is_success());
    }

    #[test]
    fn test_construction_error_breaks_chain_and_runs_post_steps() {
        let builder = Scripted {
            broken: Some(StepKind::PullImage),
            ..Default::default()
        };
        let mut playbook = Playbook::new();
        playbook
            .add_step(Step::new(StepKind::PullImage, services()).skip_error(true))
            .add_step(Step::new(StepKind::CreateContainer, services()))
            .add_post_step(Step::new(StepKind::CleanPrecheckEnvironment, services()));

        let report = playbook.run(&builder, &SharedContext::new(), &NoProgress);

        assert!(report.error().is_some_and(Error::is_construction));
        assert!(report.steps.is_empty());
        assert_eq!(builder.runs_of(StepKind::CreateContainer), 0);
        assert_eq!(builder.runs_of(StepKind::CleanPrecheckEnvironment), 2);
    }

    #[test]
    fn test_options_are_published_before_build() {
        let builder = Scripted::default();
        let ctx = SharedContext::new();
        let mut playbook = Playbook::new();
        playbook.add_step(Step::new(StepKind::SyncConfig, services()).option("image", "curvefs:v2"));

        let report = playbook.run(&builder, &ctx, &NoProgress);

        assert!(report.is_success());
        assert_eq!(ctx.get_str("image").as_deref(), Some("curvefs:v2"));
    }

    #[test]
    fn test_post_step_errors_are_not_reported() {
        let builder = Scripted {
            fail_hosts: vec!["hostA"],
            ..Default::default()
        };
        let mut playbook = Playbook::new();
        playbook.add_post_step(Step::new(StepKind::CleanPrecheckEnvironment, services()));

        let report = playbook.run(&builder, &SharedContext::new(), &NoProgress);

        assert!(report.is_success());
        assert!(report.post_steps[0].error.is_some());
    }

    #[test]
    fn test_run_post_steps_alone() {
        let builder = Scripted::default();
        let mut playbook = Playbook::new();
        playbook
            .add_step(Step::new(StepKind::StartService, services()))
            .add_post_step(Step::new(StepKind::CleanPrecheckEnvironment, services()));

        let reports = playbook.run_post_steps(&builder, &SharedContext::new(), &NoProgress);

        assert_eq!(reports.len(), 1);
        assert_eq!(builder.runs_of(StepKind::StartService), 0);
    }

    #[test]
    fn test_reporter_sees_step_description() {
        #[derive(Default)]
        struct Labels(Mutex<Vec<String>>);
        impl ProgressReporter for Labels {
            fn on_step_start(&self, step: &str, _total: usize) {
                self.0.lock().unwrap().push(step.to_string());
            }
        }

        let labels = Labels::default();
        let mut playbook = Playbook::new();
        playbook.add_step(Step::new(StepKind::StartService, services()));
        let report = playbook.run(&Scripted::default(), &SharedContext::new(), &labels);

        assert!(report.is_success());
        assert_eq!(*labels.0.lock().unwrap(), vec!["Start Service"]);
    }
}
