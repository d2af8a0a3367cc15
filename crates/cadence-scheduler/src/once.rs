//! Direct one-shot admission.

use std::time::Duration;

use cadence_protocols::{DispatchError, EnqueueOptions, OnceRequest, TaskEnvelope, TraceContext};
use tracing::{Instrument, debug, info, info_span};

use crate::error::SchedulerError;
use crate::scheduler::Scheduler;

impl Scheduler {
    /// Enqueue a one-shot task, deduplicated by identity.
    ///
    /// An instance that is running is never duplicated. A queued instance is
    /// kept unless `request.replace` is set, in which case it is deleted and
    /// enqueued again with the new options. The task joins `request.trace`
    /// when one is set.
    pub async fn once(&self, mut request: OnceRequest) -> Result<(), SchedulerError> {
        let trace = request.trace.take().unwrap_or_default();
        self.admit(request, trace).await
    }

    pub(crate) async fn admit(&self, request: OnceRequest, trace: TraceContext) -> Result<(), SchedulerError> {
        let span = info_span!(
            "once",
            identity = %request.identity,
            trace_id = %trace.trace_id,
            span_id = %trace.span_id,
        );
        async {
            if request.identity.is_empty() {
                return Err(SchedulerError::InvalidIdentity);
            }
            let guard = self.lease(&request.identity).await?;
            let dispatcher = &self.inner.dispatcher;
            let queue = self.queue();

            match dispatcher.info(queue, &request.identity).await? {
                None => {}
                Some(info) if info.state.is_active() => {
                    debug!("Task is running, not duplicating it");
                    guard.release().await;
                    return Ok(());
                }
                Some(_) if !request.replace => {
                    debug!("Task already queued");
                    guard.release().await;
                    return Ok(());
                }
                Some(_) => match dispatcher.delete(queue, &request.identity).await {
                    Ok(()) | Err(DispatchError::NotFound(_)) => {
                        debug!("Replacing queued task");
                    }
                    Err(e) => return Err(e.into()),
                },
            }

            let options = self.once_options(&request);
            let task = TaskEnvelope::once(
                request.identity.clone(),
                request.group,
                request.payload,
                Some(trace.child()),
            )
            .with_max_archived(request.max_archived_secs);
            dispatcher.enqueue(task, options).await?;
            guard.release().await;

            info!("Task admitted");
            Ok(())
        }
        .instrument(span)
        .await
    }

    fn once_options(&self, request: &OnceRequest) -> EnqueueOptions {
        let defaults = &self.inner.config.scheduler;
        EnqueueOptions {
            queue: self.queue().to_string(),
            max_retry: request
                .max_retry
                .filter(|n| *n > 0)
                .unwrap_or(defaults.max_retry),
            timeout: request
                .timeout_secs
                .map_or_else(|| defaults.timeout(), Duration::from_secs),
            retention: Some(
                request
                    .retention_secs
                    .map_or_else(|| defaults.retention(), Duration::from_secs),
            ),
            timing: request.timing.clone(),
        }
    }
}

#[cfg(test)]
#[path = "once_tests.rs"]
mod tests;
