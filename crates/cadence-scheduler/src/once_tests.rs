use super::*;
use crate::test_support::{harness, start_time};
use async_trait::async_trait;
use cadence_protocols::{
    Dispatcher, ExecutionContext, HandlerError, LockService, RetryPolicy, TaskHandler, TaskState,
};
use std::sync::Arc;
use tokio::sync::{Notify, mpsc};

/// Blocks inside the handler until released.
struct Gate {
    started: mpsc::UnboundedSender<String>,
    release: Arc<Notify>,
}

#[async_trait]
impl TaskHandler for Gate {
    async fn handle(&self, task: &TaskEnvelope, _ctx: ExecutionContext) -> Result<(), HandlerError> {
        let _ = self.started.send(task.identity.clone());
        self.release.notified().await;
        Ok(())
    }
}

#[tokio::test]
async fn test_once_enqueues_with_defaults() {
    let h = harness();
    h.scheduler
        .once(OnceRequest::new("job-1").with_group("mail").with_payload("hi"))
        .await
        .unwrap();

    let info = h.dispatcher.info("task", "job-1").await.unwrap().unwrap();
    assert_eq!(info.state, TaskState::Pending);
    assert_eq!(info.max_retry, 3);
    assert_eq!(info.task.group(), "mail");
    assert_eq!(info.task.payload(), "hi");
    assert!(!info.task.is_cron());
    assert!(info.task.trace().is_some());
}

#[tokio::test]
async fn test_once_joins_caller_trace() {
    let h = harness();
    let caller = TraceContext::new();
    h.scheduler
        .once(OnceRequest::new("job").with_trace(caller.clone()))
        .await
        .unwrap();

    let info = h.dispatcher.info("task", "job").await.unwrap().unwrap();
    let trace = info.task.trace().unwrap();
    assert_eq!(trace.trace_id, caller.trace_id);
    assert_ne!(trace.span_id, caller.span_id);
}

#[tokio::test]
async fn test_once_request_overrides() {
    let h = harness();
    h.scheduler
        .once(OnceRequest::new("a").with_max_retry(7).with_max_archived(90))
        .await
        .unwrap();
    h.scheduler
        .once(OnceRequest::new("b").with_max_retry(0))
        .await
        .unwrap();

    let a = h.dispatcher.info("task", "a").await.unwrap().unwrap();
    assert_eq!(a.max_retry, 7);
    assert_eq!(a.task.max_archived_secs(), Some(90));

    let b = h.dispatcher.info("task", "b").await.unwrap().unwrap();
    assert_eq!(b.max_retry, 3);
    assert_eq!(b.task.max_archived_secs(), None);
}

#[tokio::test]
async fn test_once_scheduled_in_future() {
    let h = harness();
    h.scheduler
        .once(OnceRequest::new("later").schedule_in(std::time::Duration::from_secs(90)))
        .await
        .unwrap();

    let info = h.dispatcher.info("task", "later").await.unwrap().unwrap();
    assert_eq!(info.state, TaskState::Scheduled);
    assert_eq!(
        info.next_process_at,
        Some(start_time() + chrono::Duration::seconds(90))
    );
}

#[tokio::test]
async fn test_once_keeps_queued_instance() {
    let h = harness();
    h.scheduler
        .once(OnceRequest::new("job").with_payload("first"))
        .await
        .unwrap();
    h.scheduler
        .once(OnceRequest::new("job").with_payload("second"))
        .await
        .unwrap();

    let info = h.dispatcher.info("task", "job").await.unwrap().unwrap();
    assert_eq!(info.task.payload(), "first");
    assert_eq!(h.dispatcher.len("task"), 1);
}

#[tokio::test]
async fn test_once_replace_swaps_queued_instance() {
    let h = harness();
    h.scheduler
        .once(OnceRequest::new("job").with_payload("first"))
        .await
        .unwrap();
    h.scheduler
        .once(OnceRequest::new("job").with_payload("second").replace(true))
        .await
        .unwrap();

    let info = h.dispatcher.info("task", "job").await.unwrap().unwrap();
    assert_eq!(info.task.payload(), "second");
    assert_eq!(h.dispatcher.len("task"), 1);
}

#[tokio::test]
async fn test_once_never_duplicates_running_task() {
    let h = harness();
    h.scheduler
        .once(OnceRequest::new("job").with_payload("first"))
        .await
        .unwrap();

    let (tx, mut started) = mpsc::unbounded_channel();
    let release = Arc::new(Notify::new());
    let gate = Arc::new(Gate {
        started: tx,
        release: release.clone(),
    });
    let dispatcher = h.dispatcher.clone();
    let worker = tokio::spawn(async move { dispatcher.run_due(gate.as_ref()).await });

    assert_eq!(started.recv().await.as_deref(), Some("job"));
    h.scheduler
        .once(OnceRequest::new("job").with_payload("second").replace(true))
        .await
        .unwrap();
    let info = h.dispatcher.info("task", "job").await.unwrap().unwrap();
    assert_eq!(info.state, TaskState::Active);
    assert_eq!(info.task.payload(), "first");

    release.notify_one();
    assert_eq!(worker.await.unwrap(), 1);
    assert_eq!(
        h.dispatcher.info("task", "job").await.unwrap().unwrap().state,
        TaskState::Completed
    );
}

#[tokio::test]
async fn test_once_empty_identity() {
    let h = harness();
    let err = h.scheduler.once(OnceRequest::new("")).await.unwrap_err();
    assert!(matches!(err, SchedulerError::InvalidIdentity));
    assert!(h.dispatcher.is_empty("task"));
}

#[tokio::test]
async fn test_once_lock_timeout_is_retryable() {
    let h = harness();
    let key = format!("{}.job.lock", h.scheduler.namespace());
    let _held = h
        .locks
        .acquire(&key, std::time::Duration::from_secs(60), RetryPolicy::no_retry())
        .await
        .unwrap();

    let err = h.scheduler.once(OnceRequest::new("job")).await.unwrap_err();
    assert!(err.is_retryable());
    assert!(h.dispatcher.is_empty("task"));
}

#[test]
fn test_once_options_retention_always_set() {
    let h = harness();
    let options = h.scheduler.once_options(&OnceRequest::new("x"));
    assert_eq!(options.retention, Some(Duration::from_secs(60)));
    assert_eq!(options.timeout, Duration::from_secs(10));
    assert_eq!(options.queue, "task");

    let options = h
        .scheduler
        .once_options(&OnceRequest::new("x").with_retention(5).with_timeout(2));
    assert_eq!(options.retention, Some(Duration::from_secs(5)));
    assert_eq!(options.timeout, Duration::from_secs(2));
}
