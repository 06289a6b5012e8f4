//! Turning a step's configs into tasks.
//!
//! For each entry: applicability rule, `limit` truncation, step-scoped dedup,
//! then the caller's [`TaskBuilder`]. Tasks built from deploy configs are
//! stamped with tid/ptid so results of several steps can be merged per
//! service.

use crate::config::ConfigRef;
use crate::context::SharedContext;
use crate::error::{Error, Result};
use crate::step::{DedupScope, Step, StepKind};
use crate::task::Task;
use std::collections::HashSet;
use topology::{ConfigKind, ConfigRecord};

/// Builds the task for one entry of a step.
///
/// Returning `Ok(None)` means the entry needs no task. Any error aborts the
/// whole step build before a task runs.
pub trait TaskBuilder: Send + Sync {
    fn build(
        &self,
        kind: StepKind,
        entry: ConfigRef<'_>,
        ctx: &SharedContext,
    ) -> Result<Option<Task>>;
}

/// Dedup key for an entry, `None` when the step does not dedup
fn dedup_key(scope: DedupScope, entry: &ConfigRef<'_>) -> Option<String> {
    match scope {
        DedupScope::None => None,
        DedupScope::Host => Some(entry.host().to_string()),
        DedupScope::HostResource(attr) => Some(format!(
            "{}\u{0}{}",
            entry.host(),
            entry.attribute(attr).unwrap_or_default()
        )),
    }
}

/// Build every task of a step, in config order
pub fn build_tasks(step: &Step, builder: &dyn TaskBuilder, ctx: &SharedContext) -> Result<Vec<Task>> {
    let rule = step.kind.applicability();
    let mut applicable: Vec<ConfigRef<'_>> = step
        .configs
        .iter()
        .filter(|entry| {
            let admitted = rule.admits(entry.role());
            if !admitted {
                log::debug!(
                    "{}: skipping {} on {} (role {})",
                    step.kind,
                    entry.id(),
                    entry.host(),
                    entry.role()
                );
            }
            admitted
        })
        .collect();

    if step.exec.limit > 0 && applicable.len() > step.exec.limit {
        applicable.truncate(step.exec.limit);
    }

    let scope = step.kind.dedup_scope();
    let stamp = step.configs.kind() == ConfigKind::Deploy;
    let mut seen: HashSet<String> = HashSet::new();
    let mut tasks = Vec::with_capacity(applicable.len());

    for entry in applicable {
        if let Some(key) = dedup_key(scope, &entry)
            && !seen.insert(key)
        {
            log::debug!("{}: {} already covered on {}", step.kind, entry.id(), entry.host());
            continue;
        }

        let task = builder.build(step.kind, entry, ctx).map_err(|e| match e {
            Error::Construction { .. } => e,
            other => Error::construction(step.kind.name(), other),
        })?;

        match task {
            Some(task) if stamp => tasks.push(task.with_ids(entry.id(), entry.parent_id())),
            Some(task) => tasks.push(task),
            None => log::debug!("{}: no task for {}", step.kind, entry.id()),
        }
    }

    Ok(tasks)
}
