//! In-memory dispatcher: task table, worker pool, retry and archive.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use cadence_protocols::{
    Clock, DispatchError, Dispatcher, EnqueueOptions, ExecutionContext, HandlerError, Page,
    SystemClock, TaskEnvelope, TaskHandler, TaskInfo, TaskState,
};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::DispatcherConfig;

struct TaskRecord {
    task: TaskEnvelope,
    state: TaskState,
    max_retry: u32,
    retried: u32,
    timeout: Duration,
    retention: Option<Duration>,
    process_at: DateTime<Utc>,
    last_failed_at: Option<DateTime<Utc>>,
    last_error: Option<String>,
    completed_at: Option<DateTime<Utc>>,
    /// Distinguishes executions across delete and re-enqueue of one identity.
    run_id: u64,
    cancel: Option<CancellationToken>,
}

impl TaskRecord {
    fn is_due(&self, now: DateTime<Utc>) -> bool {
        matches!(
            self.state,
            TaskState::Scheduled | TaskState::Pending | TaskState::Retry
        ) && self.process_at <= now
    }

    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match (self.state, self.completed_at, self.retention) {
            (TaskState::Completed, Some(done), Some(retention)) => {
                done + to_chrono(retention) <= now
            }
            (TaskState::Completed, _, None) => true,
            _ => false,
        }
    }

    fn info(&self, queue: &str, now: DateTime<Utc>) -> TaskInfo {
        let mut state = self.state;
        if state == TaskState::Scheduled && self.process_at <= now {
            state = TaskState::Pending;
        }
        let waiting = matches!(
            state,
            TaskState::Scheduled | TaskState::Pending | TaskState::Retry
        );
        TaskInfo {
            task: self.task.clone(),
            queue: queue.to_string(),
            state,
            max_retry: self.max_retry,
            retried: self.retried,
            last_failed_at: self.last_failed_at,
            last_error: self.last_error.clone(),
            next_process_at: waiting.then_some(self.process_at),
        }
    }
}

/// One execution taken out of the table by the worker pool.
struct Claim {
    queue: String,
    task: TaskEnvelope,
    attempt: u32,
    timeout: Duration,
    run_id: u64,
    cancel: CancellationToken,
}

fn to_chrono(d: Duration) -> chrono::Duration {
    chrono::Duration::from_std(d).unwrap_or_else(|_| chrono::Duration::days(365))
}

/// Dispatcher keeping every queue in process memory.
///
/// Tasks are keyed by identity within their queue; an identity stays taken
/// while the task is waiting, running, archived, or completed within its
/// retention window.
pub struct MemoryDispatcher {
    config: DispatcherConfig,
    clock: Arc<dyn Clock>,
    queues: RwLock<HashMap<String, HashMap<String, TaskRecord>>>,
    semaphore: Arc<Semaphore>,
    next_run_id: AtomicU64,
    total_processed: AtomicU64,
}

impl MemoryDispatcher {
    pub fn new(config: DispatcherConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: DispatcherConfig, clock: Arc<dyn Clock>) -> Self {
        let permits = config.concurrency.max(1);
        Self {
            config,
            clock,
            queues: RwLock::new(HashMap::new()),
            semaphore: Arc::new(Semaphore::new(permits)),
            next_run_id: AtomicU64::new(1),
            total_processed: AtomicU64::new(0),
        }
    }

    /// Snapshot of every task in `queue`.
    pub fn tasks(&self, queue: &str) -> Vec<TaskInfo> {
        let now = self.clock.now();
        let mut queues = self.queues.write();
        let Some(tasks) = queues.get_mut(queue) else {
            return Vec::new();
        };
        tasks.retain(|_, r| !r.is_expired(now));
        let mut infos: Vec<_> = tasks.values().map(|r| r.info(queue, now)).collect();
        infos.sort_by(|a, b| a.task.identity.cmp(&b.task.identity));
        infos
    }

    pub fn len(&self, queue: &str) -> usize {
        self.tasks(queue).len()
    }

    pub fn is_empty(&self, queue: &str) -> bool {
        self.len(queue) == 0
    }

    /// Executions that finished, successfully or not.
    pub fn total_processed(&self) -> u64 {
        self.total_processed.load(Ordering::SeqCst)
    }

    pub fn available_workers(&self) -> usize {
        self.semaphore.available_permits()
    }

    fn claim_due(&self, limit: usize) -> Vec<Claim> {
        if limit == 0 {
            return Vec::new();
        }
        let now = self.clock.now();
        let mut queues = self.queues.write();

        let mut due: Vec<(DateTime<Utc>, String, String)> = queues
            .iter()
            .flat_map(|(queue, tasks)| {
                tasks
                    .iter()
                    .filter(|(_, r)| r.is_due(now))
                    .map(move |(id, r)| (r.process_at, queue.clone(), id.clone()))
            })
            .collect();
        due.sort();
        due.truncate(limit);

        let mut claims = Vec::with_capacity(due.len());
        for (_, queue, identity) in due {
            let Some(record) = queues.get_mut(&queue).and_then(|t| t.get_mut(&identity)) else {
                continue;
            };
            let run_id = self.next_run_id.fetch_add(1, Ordering::SeqCst);
            let cancel = CancellationToken::new();
            record.state = TaskState::Active;
            record.run_id = run_id;
            record.cancel = Some(cancel.clone());
            claims.push(Claim {
                queue,
                task: record.task.clone(),
                attempt: record.retried,
                timeout: record.timeout,
                run_id,
                cancel,
            });
        }
        claims
    }

    async fn execute(&self, handler: &dyn TaskHandler, claim: Claim) {
        debug!(
            queue = %claim.queue,
            identity = %claim.task.identity,
            attempt = claim.attempt,
            "Executing task"
        );
        let ctx = ExecutionContext {
            queue: claim.queue.clone(),
            attempt: claim.attempt,
            cancel: claim.cancel.clone(),
        };

        let result = if claim.timeout.is_zero() {
            handler.handle(&claim.task, ctx).await
        } else {
            match tokio::time::timeout(claim.timeout, handler.handle(&claim.task, ctx)).await {
                Ok(result) => result,
                Err(_) => Err(HandlerError::Timeout(claim.timeout)),
            }
        };

        self.total_processed.fetch_add(1, Ordering::SeqCst);
        self.finish(&claim, result);
    }

    fn finish(&self, claim: &Claim, result: Result<(), HandlerError>) {
        let now = self.clock.now();
        let mut queues = self.queues.write();
        let Some(tasks) = queues.get_mut(&claim.queue) else {
            return;
        };
        let Some(record) = tasks
            .get_mut(&claim.task.identity)
            .filter(|r| r.run_id == claim.run_id)
        else {
            debug!(identity = %claim.task.identity, "Task removed while running");
            return;
        };
        record.cancel = None;

        let drop_record = match result {
            Ok(()) => {
                record.state = TaskState::Completed;
                record.completed_at = Some(now);
                record.retention.is_none_or(|r| r.is_zero())
            }
            Err(e) => {
                record.last_failed_at = Some(now);
                record.last_error = Some(e.to_string());
                if record.retried < record.max_retry {
                    record.retried += 1;
                    record.state = TaskState::Retry;
                    record.process_at = now + to_chrono(self.config.retry_delay());
                    warn!(
                        identity = %claim.task.identity,
                        retried = record.retried,
                        error = %e,
                        "Task failed, will retry"
                    );
                } else {
                    record.state = TaskState::Archived;
                    error!(identity = %claim.task.identity, error = %e, "Task archived");
                }
                false
            }
        };

        if drop_record {
            tasks.remove(&claim.task.identity);
        }
    }

    /// Run every task that is due right now and wait for all of them.
    pub async fn run_due(&self, handler: &dyn TaskHandler) -> usize {
        let claims = self.claim_due(usize::MAX);
        let count = claims.len();
        for claim in claims {
            self.execute(handler, claim).await;
        }
        count
    }

    /// Run the worker pool until `shutdown` is cancelled.
    pub async fn run(self: Arc<Self>, handler: Arc<dyn TaskHandler>, shutdown: CancellationToken) {
        info!("Worker pool started with {} workers", self.config.concurrency);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Worker pool shutting down");
                    break;
                }
                _ = self.dispatch_available(&handler) => {}
            }
        }

        info!("Worker pool stopped");
    }

    async fn dispatch_available(self: &Arc<Self>, handler: &Arc<dyn TaskHandler>) {
        let claims = self.claim_due(self.semaphore.available_permits());
        if claims.is_empty() {
            tokio::time::sleep(self.config.poll_interval()).await;
            return;
        }

        for claim in claims {
            let permit = match self.semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    error!("Failed to acquire worker slot: {}", e);
                    return;
                }
            };
            let dispatcher = self.clone();
            let handler = handler.clone();
            tokio::spawn(async move {
                dispatcher.execute(handler.as_ref(), claim).await;
                drop(permit);
            });
        }
    }
}

#[async_trait]
impl Dispatcher for MemoryDispatcher {
    async fn enqueue(&self, task: TaskEnvelope, options: EnqueueOptions) -> Result<(), DispatchError> {
        let now = self.clock.now();
        let process_at = options.timing.process_at(now).unwrap_or(now);
        let state = if process_at > now {
            TaskState::Scheduled
        } else {
            TaskState::Pending
        };

        let mut queues = self.queues.write();
        let tasks = queues.entry(options.queue.clone()).or_default();
        if tasks.get(&task.identity).is_some_and(|r| !r.is_expired(now)) {
            return Err(DispatchError::Conflict(task.identity));
        }

        debug!(
            queue = %options.queue,
            identity = %task.identity,
            process_at = %process_at,
            "Enqueueing task"
        );
        tasks.insert(
            task.identity.clone(),
            TaskRecord {
                task,
                state,
                max_retry: options.max_retry,
                retried: 0,
                timeout: options.timeout,
                retention: options.retention,
                process_at,
                last_failed_at: None,
                last_error: None,
                completed_at: None,
                run_id: 0,
                cancel: None,
            },
        );
        Ok(())
    }

    async fn info(&self, queue: &str, identity: &str) -> Result<Option<TaskInfo>, DispatchError> {
        let now = self.clock.now();
        let mut queues = self.queues.write();
        let Some(tasks) = queues.get_mut(queue) else {
            return Ok(None);
        };
        if tasks.get(identity).is_some_and(|r| r.is_expired(now)) {
            tasks.remove(identity);
        }
        Ok(tasks.get(identity).map(|r| r.info(queue, now)))
    }

    async fn delete(&self, queue: &str, identity: &str) -> Result<(), DispatchError> {
        let mut queues = self.queues.write();
        let removed = queues.get_mut(queue).and_then(|tasks| tasks.remove(identity));
        match removed {
            Some(record) => {
                if let Some(cancel) = record.cancel {
                    cancel.cancel();
                }
                debug!(queue = %queue, identity = %identity, "Task deleted");
                Ok(())
            }
            None => Err(DispatchError::NotFound(identity.to_string())),
        }
    }

    async fn cancel(&self, identity: &str) -> Result<(), DispatchError> {
        let queues = self.queues.read();
        for tasks in queues.values() {
            if let Some(cancel) = tasks.get(identity).and_then(|r| r.cancel.as_ref()) {
                debug!(identity = %identity, "Cancelling execution");
                cancel.cancel();
            }
        }
        Ok(())
    }

    async fn list_archived(&self, queue: &str, page: Page) -> Result<Vec<TaskInfo>, DispatchError> {
        let now = self.clock.now();
        let queues = self.queues.read();
        let Some(tasks) = queues.get(queue) else {
            return Ok(Vec::new());
        };

        let mut archived: Vec<_> = tasks
            .values()
            .filter(|r| r.state == TaskState::Archived)
            .collect();
        archived.sort_by(|a, b| {
            (a.last_failed_at, &a.task.identity).cmp(&(b.last_failed_at, &b.task.identity))
        });

        Ok(archived
            .into_iter()
            .skip(page.offset())
            .take(page.size)
            .map(|r| r.info(queue, now))
            .collect())
    }
}

#[cfg(test)]
#[path = "dispatcher_tests.rs"]
mod tests;
