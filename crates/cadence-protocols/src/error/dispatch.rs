//! Dispatcher and handler errors.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Task not found: {0}")]
    NotFound(String),

    /// A task with the same identity already exists in the queue.
    #[error("Task identity already exists: {0}")]
    Conflict(String),

    #[error("Dispatcher unavailable: {0}")]
    Unavailable(String),
}

/// Error returned by a task handler for one execution.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("Handler failed: {0}")]
    Failed(String),

    #[error("Execution cancelled")]
    Cancelled,

    #[error("Execution timed out after {0:?}")]
    Timeout(Duration),
}
