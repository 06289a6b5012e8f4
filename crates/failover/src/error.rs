//! Error types for remote calls.
//!
//! A stub reports how one invocation failed ([`StubError`]); the retry loop
//! turns the final outcome into an [`RpcError`].

use playbook::ErrorCode;
use std::io;
use thiserror::Error;

/// How a single invocation failed
#[derive(Debug, Error)]
pub enum StubError {
    /// Connection-level failure; the connection is dropped and re-dialed
    #[error("transport error: {0}")]
    Transport(#[from] io::Error),

    /// The server answered with a status worth retrying on the same address
    #[error("retryable status: {0}")]
    Retryable(String),

    /// The server answered with a status that will not change on retry
    #[error("{0}")]
    Fatal(String),
}

impl StubError {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Fatal(_))
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::Transport(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock)
        )
    }
}

/// Why a remote call gave up
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("no candidate address given")]
    NoAddress,

    /// No candidate address accepted a connection
    #[error("failed to connect to any of [{}]: {last}", addresses.join(", "))]
    Connect {
        addresses: Vec<String>,
        last: io::Error,
    },

    /// Connected, but every attempt on that address failed
    #[error("rpc to {address} failed after {attempts} attempt(s): {last}")]
    RpcFailed {
        address: String,
        attempts: u32,
        last: StubError,
    },

    /// The server rejected the call outright
    #[error("rpc to {address} rejected: {message}")]
    Status { address: String, message: String },
}

impl RpcError {
    /// Code reported to the task layer
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::RpcFailed { last, .. } if last.is_timeout() => ErrorCode::Timeout,
            Self::Connect { last, .. } if last.kind() == io::ErrorKind::TimedOut => {
                ErrorCode::Timeout
            }
            _ => ErrorCode::RpcFailed,
        }
    }
}
