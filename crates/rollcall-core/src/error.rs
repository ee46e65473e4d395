//! Error types for Rollcall.

use std::time::Duration;

/// The error type shared by every Rollcall crate.
#[derive(Debug, thiserror::Error)]
pub enum RollcallError {
    /// Invalid or unreadable configuration.
    #[error("Config error: {0}")]
    Config(String),

    /// Invalid clock / simulated time settings. Fatal at startup.
    #[error("Clock error: {0}")]
    Clock(String),

    /// Recipient directory (storage) failure.
    #[error("Directory error: {0}")]
    Directory(String),

    /// Outbound message could not be delivered.
    #[error("Dispatch error: {0}")]
    Dispatch(String),

    /// Outbound channel refused the message because of rate limiting.
    #[error("Throttled: retry after {retry_after_secs}s")]
    Throttled { retry_after_secs: u64 },

    /// A send did not complete within the per-send timeout.
    #[error("Send timed out after {0:?}")]
    Timeout(Duration),

    /// The dispatch gateway is not connected yet.
    #[error("Dispatch gateway not ready")]
    NotReady,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl RollcallError {
    /// Transient failures are retried implicitly by the next tick or escalation step.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            RollcallError::Dispatch(_)
                | RollcallError::Throttled { .. }
                | RollcallError::Timeout(_)
                | RollcallError::NotReady
        )
    }
}

pub type Result<T> = std::result::Result<T, RollcallError>;
