//! Dispatcher protocol.
//!
//! The dispatcher owns execution: queuing, retries, timeouts and archiving.
//! The scheduler only enqueues into it, inspects it and deletes from it.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::{DispatchError, HandlerError};
use crate::types::{EnqueueOptions, Page, TaskEnvelope, TaskInfo};

#[async_trait]
pub trait Dispatcher: Send + Sync {
    /// Enqueue a task. Fails with [`DispatchError::Conflict`] if the identity
    /// is already present in the queue in any state.
    async fn enqueue(&self, task: TaskEnvelope, options: EnqueueOptions) -> Result<(), DispatchError>;

    /// Look up a task by identity. `None` when it is not present.
    async fn info(&self, queue: &str, identity: &str) -> Result<Option<TaskInfo>, DispatchError>;

    /// Delete a task in any state. [`DispatchError::NotFound`] if absent.
    async fn delete(&self, queue: &str, identity: &str) -> Result<(), DispatchError>;

    /// Signal cancellation to an in-flight execution. Best-effort.
    async fn cancel(&self, identity: &str) -> Result<(), DispatchError>;

    /// List archived (retry-exhausted) tasks, one page at a time.
    async fn list_archived(&self, queue: &str, page: Page) -> Result<Vec<TaskInfo>, DispatchError>;
}

/// Per-execution context handed to a [`TaskHandler`].
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub queue: String,
    /// Zero for the first attempt.
    pub attempt: u32,
    /// Tripped when the task is cancelled or removed; handlers should
    /// select on it and return promptly.
    pub cancel: CancellationToken,
}

/// What the dispatcher runs for each task execution.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn handle(&self, task: &TaskEnvelope, ctx: ExecutionContext) -> Result<(), HandlerError>;
}
