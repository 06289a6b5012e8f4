//! Mapping command failures to exit statuses and audit records

use crate::audit::AuditStatus;
use std::process::ExitCode;
use thiserror::Error;

/// The user declined the confirmation prompt
#[derive(Debug, Error)]
#[error("cancelled by user")]
pub struct CancelledByUser;

pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_ABORT: u8 = 2;
pub const EXIT_CANCELLED: u8 = 130;

/// How a failed invocation is reported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub status: AuditStatus,
    pub exit: u8,
    pub code: Option<u32>,
}

impl Classification {
    pub fn exit_code(&self) -> ExitCode {
        ExitCode::from(self.exit)
    }
}

/// Classify an error by the first recognised cause in its chain.
///
/// Anything unrecognised happened before tasks ran (bad flags, unreadable
/// config) and counts as an abort.
pub fn classify(err: &anyhow::Error) -> Classification {
    for cause in err.chain() {
        if cause.downcast_ref::<CancelledByUser>().is_some() {
            return Classification {
                status: AuditStatus::Cancel,
                exit: EXIT_CANCELLED,
                code: None,
            };
        }
        if let Some(e) = cause.downcast_ref::<playbook::Error>() {
            let code = e.code().map(|c| c.value());
            return if e.is_construction() {
                Classification {
                    status: AuditStatus::Abort,
                    exit: EXIT_ABORT,
                    code,
                }
            } else {
                Classification {
                    status: AuditStatus::Fail,
                    exit: EXIT_FAILURE,
                    code,
                }
            };
        }
        if let Some(e) = cause.downcast_ref::<failover::RpcError>() {
            return Classification {
                status: AuditStatus::Fail,
                exit: EXIT_FAILURE,
                code: Some(e.code().value()),
            };
        }
    }
    Classification {
        status: AuditStatus::Abort,
        exit: EXIT_ABORT,
        code: None,
    }
}
