//! What a playbook run produced

use crate::error::{Error, Result};
use crate::step::StepKind;
use crate::task::{TaskResult, TaskState};

/// Results of one executed step
#[derive(Debug)]
pub struct StepReport {
    pub kind: StepKind,
    pub results: Vec<TaskResult>,
    pub error: Option<Error>,
}

impl StepReport {
    pub fn new(kind: StepKind, results: Vec<TaskResult>, error: Option<Error>) -> Self {
        Self {
            kind,
            results,
            error,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// One service's trail through the steps of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceRecord {
    pub tid: String,
    pub ptid: String,
    pub host: String,
    pub steps: Vec<(StepKind, TaskState)>,
}

impl ServiceRecord {
    /// Worst state seen across the steps
    pub fn state(&self) -> TaskState {
        let states = self.steps.iter().map(|(_, s)| *s);
        if states.clone().any(|s| s == TaskState::Failed) {
            TaskState::Failed
        } else if states.clone().any(|s| s == TaskState::NotRun) {
            TaskState::NotRun
        } else {
            TaskState::Succeeded
        }
    }
}

/// Results of a whole playbook run
#[derive(Debug, Default)]
pub struct PlaybookReport {
    pub steps: Vec<StepReport>,
    pub post_steps: Vec<StepReport>,
    /// First error of the main chain; post-step errors never land here
    pub error: Option<Error>,
}

impl PlaybookReport {
    pub fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    pub fn into_result(self) -> Result<Self> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self),
        }
    }

    /// Results of the main chain grouped by task id, in first-seen order.
    ///
    /// Tasks without ids (built from non-deploy records) are left out.
    pub fn by_service(&self) -> Vec<ServiceRecord> {
        let mut records: Vec<ServiceRecord> = Vec::new();
        for step in &self.steps {
            for result in &step.results {
                let Some(tid) = result.tid.as_deref() else {
                    continue;
                };
                let entry = (step.kind, result.state());
                match records.iter_mut().find(|r| r.tid == tid) {
                    Some(record) => record.steps.push(entry),
                    None => records.push(ServiceRecord {
                        tid: tid.to_string(),
                        ptid: result.ptid.clone().unwrap_or_else(|| tid.to_string()),
                        host: result.host.clone(),
                        steps: vec![entry],
                    }),
                }
            }
        }
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorCode, TaskError};
    use crate::task::{Outcome, Task, TaskContext};

    fn result(index: usize, tid: Option<&str>, outcome: Outcome) -> TaskResult {
        let mut task = Task::new("Op", "h", |_: &TaskContext<'_>| Ok(String::new()));
        if let Some(tid) = tid {
            task = task.with_ids(tid, "p");
        }
        TaskResult::new(index, &task, outcome)
    }

    #[test]
    fn test_by_service_merges_steps() {
        let failure = TaskError::new(ErrorCode::RemoteCommandFailed, "x");
        let report = PlaybookReport {
            steps: vec![
                StepReport::new(
                    StepKind::PullImage,
                    vec![
                        result(0, Some("a"), Outcome::Succeeded(String::new())),
                        result(1, Some("b"), Outcome::Succeeded(String::new())),
                        result(2, None, Outcome::Succeeded(String::new())),
                    ],
                    None,
                ),
                StepReport::new(
                    StepKind::StartService,
                    vec![
                        result(0, Some("a"), Outcome::Succeeded(String::new())),
                        result(1, Some("b"), Outcome::Failed(failure)),
                    ],
                    None,
                ),
            ],
            ..Default::default()
        };

        let services = report.by_service();
        assert_eq!(services.len(), 2);
        assert_eq!(services[0].tid, "a");
        assert_eq!(services[0].steps.len(), 2);
        assert_eq!(services[0].state(), TaskState::Succeeded);
        assert_eq!(services[1].state(), TaskState::Failed);
        assert_eq!(services[1].ptid, "p");
    }

    #[test]
    fn test_into_result() {
        assert!(PlaybookReport::default().into_result().is_ok());
        let failed = PlaybookReport {
            error: Some(Error::construction("SYNC_CONFIG", "no image")),
            ..Default::default()
        };
        assert!(!failed.is_success());
        assert!(failed.into_result().unwrap_err().is_construction());
    }
}
