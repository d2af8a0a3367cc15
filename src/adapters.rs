//! Adapter types and utility functions for Cadence.

use std::path::PathBuf;

use async_trait::async_trait;
use cadence_protocols::{HandlerError, TaskPayload};
use cadence_scheduler::{PayloadHandler, TaskContext};
use tracing::info;

/// Get the .cadence directory path.
pub(crate) fn cadence_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".cadence"))
        .unwrap_or_else(|| PathBuf::from(".cadence"))
}

/// Handler used by `cadence run` when no callback URL is configured:
/// records each execution in the log and succeeds.
pub(crate) struct LoggingHandler;

#[async_trait]
impl PayloadHandler for LoggingHandler {
    async fn handle(&self, payload: TaskPayload, ctx: TaskContext) -> Result<(), HandlerError> {
        if ctx.cancel.is_cancelled() {
            return Err(HandlerError::Cancelled);
        }
        info!(
            identity = %payload.identity,
            group = %payload.group,
            attempt = ctx.attempt,
            payload = %payload.payload,
            "Task executed"
        );
        Ok(())
    }
}
