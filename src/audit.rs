//! Invocation audit trail in SQLite
//!
//! Every command run is recorded as a pending row before it starts and
//! updated with its final status once it ends.

use anyhow::{Context, Result};
use chrono::Local;
use rusqlite::{Connection, params};
use std::fmt;
use std::path::Path;

/// How an invocation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditStatus {
    Pending,
    Success,
    /// Declined at the confirmation prompt
    Cancel,
    /// A task failed
    Fail,
    /// Stopped before any remote side effect (bad config, construction error)
    Abort,
}

impl AuditStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Cancel => "cancel",
            Self::Fail => "fail",
            Self::Abort => "abort",
        }
    }

    fn parse(s: &str) -> Self {
        match s {
            "success" => Self::Success,
            "cancel" => Self::Cancel,
            "fail" => Self::Fail,
            "abort" => Self::Abort,
            _ => Self::Pending,
        }
    }
}

impl fmt::Display for AuditStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditRecord {
    pub id: i64,
    pub executed_at: String,
    pub cwd: String,
    pub command: String,
    pub status: AuditStatus,
    pub error_code: Option<u32>,
}

pub struct AuditLog {
    conn: Connection,
}

impl AuditLog {
    /// Open or create the audit database
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open audit database: {}", db_path.display()))?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS audit (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                executed_at TEXT NOT NULL,
                cwd TEXT NOT NULL,
                command TEXT NOT NULL,
                status TEXT NOT NULL,
                error_code INTEGER
            );
            ",
        )?;

        Ok(Self { conn })
    }

    /// Record the start of an invocation; returns its id
    pub fn begin(&self, args: &[String]) -> Result<i64> {
        let cwd = std::env::current_dir()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        let now = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();

        self.conn.execute(
            "INSERT INTO audit (executed_at, cwd, command, status) VALUES (?1, ?2, ?3, ?4)",
            params![now, cwd, args.join(" "), AuditStatus::Pending.as_str()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Record how an invocation ended
    pub fn finish(&self, id: i64, status: AuditStatus, error_code: Option<u32>) -> Result<()> {
        self.conn.execute(
            "UPDATE audit SET status = ?1, error_code = ?2 WHERE id = ?3",
            params![status.as_str(), error_code, id],
        )?;
        Ok(())
    }

    /// Most recent records first
    pub fn recent(&self, limit: usize) -> Result<Vec<AuditRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, executed_at, cwd, command, status, error_code
             FROM audit
             ORDER BY id DESC
             LIMIT ?1",
        )?;

        let records = stmt
            .query_map([limit as i64], |row| {
                Ok(AuditRecord {
                    id: row.get(0)?,
                    executed_at: row.get(1)?,
                    cwd: row.get(2)?,
                    command: row.get(3)?,
                    status: AuditStatus::parse(&row.get::<_, String>(4)?),
                    error_code: row.get(5)?,
                })
            })?
            .filter_map(|r| r.ok())
            .collect();

        Ok(records)
    }
}
