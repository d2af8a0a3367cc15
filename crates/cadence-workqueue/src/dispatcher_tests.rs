use super::*;
use cadence_protocols::{ManualClock, Timing};
use chrono::TimeZone;
use std::sync::atomic::AtomicU32;

struct CountingHandler {
    calls: AtomicU32,
    fail: bool,
}

impl CountingHandler {
    fn ok() -> Self {
        Self {
            calls: AtomicU32::new(0),
            fail: false,
        }
    }

    fn failing() -> Self {
        Self {
            calls: AtomicU32::new(0),
            fail: true,
        }
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TaskHandler for CountingHandler {
    async fn handle(&self, _task: &TaskEnvelope, _ctx: ExecutionContext) -> Result<(), HandlerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            Err(HandlerError::Failed("boom".to_string()))
        } else {
            Ok(())
        }
    }
}

/// Waits until its execution is cancelled.
struct BlockingHandler;

#[async_trait]
impl TaskHandler for BlockingHandler {
    async fn handle(&self, _task: &TaskEnvelope, ctx: ExecutionContext) -> Result<(), HandlerError> {
        ctx.cancel.cancelled().await;
        Err(HandlerError::Cancelled)
    }
}

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 4, 1, 9, 0, 0).unwrap()
}

fn dispatcher(clock: &ManualClock) -> MemoryDispatcher {
    let config = DispatcherConfig {
        concurrency: 2,
        poll_interval_ms: 5,
        retry_delay_ms: 1000,
    };
    MemoryDispatcher::with_clock(config, Arc::new(clock.clone()))
}

fn options(max_retry: u32) -> EnqueueOptions {
    EnqueueOptions {
        max_retry,
        timeout: Duration::from_secs(5),
        ..EnqueueOptions::new("task")
    }
}

#[tokio::test]
async fn test_enqueue_conflicts_on_existing_identity() {
    let clock = ManualClock::new(start());
    let d = dispatcher(&clock);

    d.enqueue(TaskEnvelope::cron("a", "g", ""), options(0)).await.unwrap();
    let err = d
        .enqueue(TaskEnvelope::cron("a", "g", ""), options(0))
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::Conflict(id) if id == "a"));

    // Same identity in another queue is independent.
    d.enqueue(TaskEnvelope::cron("a", "g", ""), EnqueueOptions::new("other"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_scheduled_task_waits_for_its_time() {
    let clock = ManualClock::new(start());
    let d = dispatcher(&clock);
    let handler = CountingHandler::ok();

    let opts = EnqueueOptions {
        timing: Timing::At(start() + chrono::Duration::minutes(1)),
        ..options(0)
    };
    d.enqueue(TaskEnvelope::cron("a", "g", ""), opts).await.unwrap();

    let info = d.info("task", "a").await.unwrap().unwrap();
    assert_eq!(info.state, TaskState::Scheduled);
    assert_eq!(d.run_due(&handler).await, 0);

    clock.advance(chrono::Duration::minutes(1));
    assert_eq!(d.info("task", "a").await.unwrap().unwrap().state, TaskState::Pending);
    assert_eq!(d.run_due(&handler).await, 1);
    assert_eq!(handler.calls(), 1);
    assert!(d.info("task", "a").await.unwrap().is_none());
}

#[tokio::test]
async fn test_completed_task_kept_for_retention() {
    let clock = ManualClock::new(start());
    let d = dispatcher(&clock);

    let opts = EnqueueOptions {
        retention: Some(Duration::from_secs(60)),
        ..options(0)
    };
    d.enqueue(TaskEnvelope::once("o", "g", "", None), opts.clone())
        .await
        .unwrap();
    d.run_due(&CountingHandler::ok()).await;

    let info = d.info("task", "o").await.unwrap().unwrap();
    assert_eq!(info.state, TaskState::Completed);
    assert!(matches!(
        d.enqueue(TaskEnvelope::once("o", "g", "", None), opts.clone()).await,
        Err(DispatchError::Conflict(_))
    ));

    clock.advance(chrono::Duration::seconds(61));
    assert!(d.info("task", "o").await.unwrap().is_none());
    d.enqueue(TaskEnvelope::once("o", "g", "", None), opts).await.unwrap();
}

#[tokio::test]
async fn test_failures_retry_then_archive() {
    let clock = ManualClock::new(start());
    let d = dispatcher(&clock);
    let handler = CountingHandler::failing();

    d.enqueue(TaskEnvelope::cron("a", "g", ""), options(2)).await.unwrap();

    for expected_retried in 1..=2 {
        d.run_due(&handler).await;
        let info = d.info("task", "a").await.unwrap().unwrap();
        assert_eq!(info.state, TaskState::Retry);
        assert_eq!(info.retried, expected_retried);
        assert!(info.has_retry_budget() || expected_retried == 2);

        // Not due again until the retry delay passes.
        assert_eq!(d.run_due(&handler).await, 0);
        clock.advance(chrono::Duration::seconds(1));
    }

    d.run_due(&handler).await;
    let info = d.info("task", "a").await.unwrap().unwrap();
    assert_eq!(info.state, TaskState::Archived);
    assert_eq!(info.retried, 2);
    assert!(!info.has_retry_budget());
    assert_eq!(info.last_error.as_deref(), Some("Handler failed: boom"));
    assert_eq!(handler.calls(), 3);

    let archived = d.list_archived("task", Page::first(10)).await.unwrap();
    assert_eq!(archived.len(), 1);
}

#[tokio::test]
async fn test_list_archived_pages() {
    let clock = ManualClock::new(start());
    let d = dispatcher(&clock);
    let handler = CountingHandler::failing();

    for i in 0..5 {
        d.enqueue(TaskEnvelope::once(format!("t{}", i), "g", "", None), options(0))
            .await
            .unwrap();
    }
    d.run_due(&handler).await;

    let first = d.list_archived("task", Page::first(2)).await.unwrap();
    let second = d.list_archived("task", Page::first(2).next()).await.unwrap();
    let third = d.list_archived("task", Page::first(2).next().next()).await.unwrap();
    assert_eq!(first.len(), 2);
    assert_eq!(second.len(), 2);
    assert_eq!(third.len(), 1);
    assert_ne!(first[0].task.identity, second[0].task.identity);
}

#[tokio::test]
async fn test_delete() {
    let clock = ManualClock::new(start());
    let d = dispatcher(&clock);

    assert!(matches!(
        d.delete("task", "ghost").await,
        Err(DispatchError::NotFound(_))
    ));

    d.enqueue(TaskEnvelope::cron("a", "g", ""), options(0)).await.unwrap();
    d.delete("task", "a").await.unwrap();
    assert!(d.is_empty("task"));
}

#[tokio::test]
async fn test_timeout_counts_as_failure() {
    let clock = ManualClock::new(start());
    let d = dispatcher(&clock);

    let opts = EnqueueOptions {
        timeout: Duration::from_millis(20),
        ..options(0)
    };
    d.enqueue(TaskEnvelope::cron("slow", "g", ""), opts).await.unwrap();
    d.run_due(&BlockingHandler).await;

    let info = d.info("task", "slow").await.unwrap().unwrap();
    assert_eq!(info.state, TaskState::Archived);
    assert!(info.last_error.unwrap().contains("timed out"));
}

#[tokio::test]
async fn test_worker_pool_cancel_and_delete_active() {
    let clock = ManualClock::new(start());
    let d = Arc::new(dispatcher(&clock));
    let shutdown = CancellationToken::new();
    let pool = tokio::spawn(d.clone().run(Arc::new(BlockingHandler), shutdown.clone()));

    d.enqueue(TaskEnvelope::cron("a", "g", ""), options(3)).await.unwrap();

    let mut active = false;
    for _ in 0..100 {
        tokio::time::sleep(Duration::from_millis(5)).await;
        if d.info("task", "a").await.unwrap().is_some_and(|i| i.state.is_active()) {
            active = true;
            break;
        }
    }
    assert!(active);
    assert_eq!(d.available_workers(), 1);

    d.cancel("a").await.unwrap();
    d.delete("task", "a").await.unwrap();

    for _ in 0..100 {
        if d.total_processed() == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(d.total_processed(), 1);
    // The finished execution must not resurrect the deleted record.
    assert!(d.info("task", "a").await.unwrap().is_none());

    shutdown.cancel();
    pool.await.unwrap();
}

#[tokio::test]
async fn test_cancel_unknown_identity_is_ok() {
    let clock = ManualClock::new(start());
    let d = dispatcher(&clock);
    d.cancel("nobody").await.unwrap();
}
