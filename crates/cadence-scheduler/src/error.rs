//! Scheduler errors.

use cadence_protocols::{BufferError, DispatchError, LockError, StoreError};
use thiserror::Error;

/// Errors returned by scheduler operations.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("Task identity is empty")]
    InvalidIdentity,

    #[error("Invalid schedule expression '{expr}': {reason}")]
    InvalidExpression { expr: String, reason: String },

    #[error("Timed out acquiring lock: {0}")]
    LockTimeout(String),

    #[error("Lock error: {0}")]
    Lock(LockError),

    #[error("Cron task not found: {0}")]
    CronTaskNotFound(String),

    #[error("Failed to save schedule: {0}")]
    StoreWriteFailed(String),

    #[error("Dispatcher unavailable: {0}")]
    DispatcherUnavailable(String),

    #[error("HTTP callback returned status {status}")]
    CallbackFailed { status: u16 },

    #[error("HTTP callback request failed: {0}")]
    CallbackRequest(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Admission buffer error: {0}")]
    Buffer(#[from] BufferError),
}

impl SchedulerError {
    pub(crate) fn invalid_expression(expr: impl Into<String>, reason: impl ToString) -> Self {
        Self::InvalidExpression {
            expr: expr.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether the caller may simply try again later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SchedulerError::LockTimeout(_) | SchedulerError::DispatcherUnavailable(_)
        )
    }
}

impl From<LockError> for SchedulerError {
    fn from(e: LockError) -> Self {
        match e {
            LockError::Timeout { key } => SchedulerError::LockTimeout(key),
            other => SchedulerError::Lock(other),
        }
    }
}

impl From<DispatchError> for SchedulerError {
    fn from(e: DispatchError) -> Self {
        SchedulerError::DispatcherUnavailable(e.to_string())
    }
}
