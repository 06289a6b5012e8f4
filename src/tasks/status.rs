//! Service status rows, accumulated in the shared context.
//!
//! INIT_SERVICE_STATUS seeds one row per service under [`STATUS_KEY`];
//! GET_SERVICE_STATUS fills in what `docker ps` reports. A host that cannot
//! be reached leaves its rows at `Unknown`.

use super::{Op, exec, op};
use crate::ssh::Remote;
use playbook::{ConfigRef, ErrorCode, SharedContext, StepKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use topology::DeployConfig;

/// Context key holding `{service id: StatusRow}`
pub const STATUS_KEY: &str = "service_status";

pub const STATUS_UNKNOWN: &str = "Unknown";
pub const STATUS_CLEANED: &str = "Cleaned";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRow {
    pub id: String,
    pub parent_id: String,
    pub role: String,
    pub host: String,
    pub instances: usize,
    /// Instances whose container is running
    pub up: usize,
    pub container_id: String,
    pub status: String,
    pub ports: String,
    pub data_dir: String,
    pub log_dir: String,
}

impl StatusRow {
    pub fn new(cfg: &DeployConfig) -> Self {
        Self {
            id: cfg.id.clone(),
            parent_id: cfg.parent_id.clone(),
            role: cfg.role.to_string(),
            host: cfg.host.clone(),
            instances: 1,
            up: 0,
            container_id: "-".to_string(),
            status: STATUS_UNKNOWN.to_string(),
            ports: cfg.listen_port().to_string(),
            data_dir: cfg.data_dir().unwrap_or("-").to_string(),
            log_dir: cfg.log_dir().unwrap_or("-").to_string(),
        }
    }

    pub fn is_up(&self) -> bool {
        self.status.starts_with("Up")
    }

    /// Leading word of the status, e.g. `Up` for `Up 2 minutes`
    pub fn state(&self) -> &str {
        self.status.split_whitespace().next().unwrap_or_default()
    }

    fn set_status(&mut self, status: String) {
        self.status = status;
        self.up = usize::from(self.is_up());
    }
}

/// Every row collected so far, ordered by service id
pub fn status_rows(ctx: &SharedContext) -> BTreeMap<String, StatusRow> {
    ctx.get_as(STATUS_KEY).unwrap_or_default()
}

/// Split `docker ps --format '{{.ID}} {{.Status}}'` output
pub fn parse_ps_line(output: &str) -> Option<(String, String)> {
    let line = output.lines().map(str::trim).find(|l| !l.is_empty())?;
    let (id, status) = line.split_once(' ')?;
    Some((id.to_string(), status.trim().to_string()))
}

pub(super) fn init_service_status(entry: ConfigRef<'_>) -> playbook::Result<Option<Op>> {
    let row = StatusRow::new(entry.as_deploy()?);
    let value = serde_json::to_value(&row)
        .map_err(|e| playbook::Error::construction(StepKind::InitServiceStatus.name(), e))?;

    Ok(op(move |tctx| {
        tctx.shared().merge_into(STATUS_KEY, &row.id, value.clone());
        Ok(row.status.clone())
    }))
}

pub(super) fn get_service_status(
    entry: ConfigRef<'_>,
    remote: Remote,
) -> playbook::Result<Option<Op>> {
    let cfg = entry.as_deploy()?;
    let id = cfg.id.clone();
    let seed = StatusRow::new(cfg);
    let command = format!(
        "docker ps -a --filter name=^{}$ --format '{{{{.ID}}}} {{{{.Status}}}}'",
        cfg.container_name()
    );

    Ok(op(move |tctx| {
        let output = exec(&remote, &command, ErrorCode::ServiceUnhealthy)?;
        let (container_id, status) = parse_ps_line(&output)
            .unwrap_or_else(|| ("-".to_string(), STATUS_CLEANED.to_string()));

        let mut txn = tctx.shared().begin();
        let mut row = txn
            .get(STATUS_KEY)
            .and_then(|rows| rows.get(&id))
            .and_then(|v| serde_json::from_value::<StatusRow>(v.clone()).ok())
            .unwrap_or_else(|| seed.clone());
        row.container_id = container_id;
        row.set_status(status.clone());
        if let Ok(value) = serde_json::to_value(&row) {
            txn.merge_into(STATUS_KEY, &id, value);
        }
        txn.commit();

        Ok(status)
    }))
}

/// Collapse rows sharing a parent into one, counting instances.
///
/// The merged row takes the parent's fields and sums `instances` and `up`.
/// Its status is the parent's when every instance is in the same state
/// (`Up`, `Exited`, ...), `Unknown` otherwise.
pub fn merge_by_parent(rows: &BTreeMap<String, StatusRow>) -> Vec<StatusRow> {
    let mut merged: Vec<StatusRow> = Vec::new();
    for row in rows.values() {
        match merged.iter_mut().find(|m| m.parent_id == row.parent_id) {
            Some(existing) => {
                let instances = existing.instances + row.instances;
                let up = existing.up + row.up;
                let mixed = existing.status == STATUS_UNKNOWN || existing.state() != row.state();
                if row.id == row.parent_id {
                    *existing = row.clone();
                }
                existing.instances = instances;
                existing.up = up;
                if mixed {
                    existing.status = STATUS_UNKNOWN.to_string();
                }
            }
            None => merged.push(row.clone()),
        }
    }
    merged
}
