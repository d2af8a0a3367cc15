//! Task execution: the handler the dispatcher invokes for every task.

use std::future::Future;

use async_trait::async_trait;
use cadence_protocols::{
    ExecutionContext, HandlerError, TaskEnvelope, TaskHandler, TaskPayload, TraceContext,
};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::scheduler::Scheduler;

/// What a handler receives besides the payload.
#[derive(Clone)]
pub struct TaskContext {
    /// Handle back to the scheduler, for handlers that enqueue follow-up work.
    pub scheduler: Scheduler,
    /// Tripped when the task is removed while running.
    pub cancel: CancellationToken,
    pub attempt: u32,
    pub trace: Option<TraceContext>,
}

/// User code run for each task.
#[async_trait]
pub trait PayloadHandler: Send + Sync {
    async fn handle(&self, payload: TaskPayload, ctx: TaskContext) -> Result<(), HandlerError>;
}

/// Adapts an async closure to [`PayloadHandler`].
pub struct FnHandler<F> {
    f: F,
}

impl<F> FnHandler<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> PayloadHandler for FnHandler<F>
where
    F: Fn(TaskPayload, TaskContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), HandlerError>> + Send,
{
    async fn handle(&self, payload: TaskPayload, ctx: TaskContext) -> Result<(), HandlerError> {
        (self.f)(payload, ctx).await
    }
}

/// Runs the configured handler (or HTTP callback) for each dispatched task
/// and keeps the cron definition's `processed` counter.
#[derive(Clone)]
pub struct TaskProcessor {
    scheduler: Scheduler,
}

impl TaskProcessor {
    pub(crate) fn new(scheduler: Scheduler) -> Self {
        Self { scheduler }
    }

    async fn run(&self, task: &TaskEnvelope, ctx: &ExecutionContext) -> Result<(), HandlerError> {
        let inner = &self.scheduler.inner;
        let payload = task.to_payload();

        if let Some(handler) = &inner.handler {
            let task_ctx = TaskContext {
                scheduler: self.scheduler.clone(),
                cancel: ctx.cancel.clone(),
                attempt: ctx.attempt,
                trace: task.trace().cloned(),
            };
            handler.handle(payload, task_ctx).await
        } else if let Some(callback) = &inner.callback {
            callback
                .notify(&payload, &ctx.cancel)
                .await
                .map_err(|e| HandlerError::Failed(e.to_string()))
        } else {
            info!(group = %payload.group, "No task handler");
            Ok(())
        }
    }

    /// Count one completed execution. Missing definitions are ignored.
    ///
    /// Holds the same per-identity lease as the definition writers so a
    /// concurrent retarget or remove is never overwritten.
    async fn processed(&self, identity: &str) {
        let guard = match self.scheduler.lease(identity).await {
            Ok(guard) => guard,
            Err(e) => {
                warn!(identity = %identity, error = %e, "Skipping processed count");
                return;
            }
        };

        match self.scheduler.load(identity).await {
            Ok(Some(mut definition)) => {
                definition.processed += 1;
                if let Err(e) = self.scheduler.save(&definition).await {
                    warn!(identity = %identity, error = %e, "Failed to save processed count");
                }
            }
            Ok(None) => {}
            Err(e) => warn!(identity = %identity, error = %e, "Failed to load definition"),
        }
        guard.release().await;
    }
}

#[async_trait]
impl TaskHandler for TaskProcessor {
    async fn handle(&self, task: &TaskEnvelope, ctx: ExecutionContext) -> Result<(), HandlerError> {
        let span = match task.trace() {
            Some(trace) => info_span!(
                "task",
                identity = %task.identity,
                group = %task.group(),
                attempt = ctx.attempt,
                trace_id = %trace.trace_id,
                parent_span_id = %trace.span_id,
            ),
            None => info_span!(
                "task",
                identity = %task.identity,
                group = %task.group(),
                attempt = ctx.attempt,
            ),
        };

        async {
            let result = self.run(task, &ctx).await;
            match &result {
                Ok(()) => {
                    debug!("Task succeeded");
                    if task.is_cron() {
                        self.processed(&task.identity).await;
                    }
                }
                Err(e) => warn!(error = %e, "Task failed"),
            }
            result
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
#[path = "processor_tests.rs"]
mod tests;
