//! The scheduler façade and its background loops.

use std::sync::Arc;

use cadence_config::Config;
use cadence_protocols::{
    AdmissionLog, Clock, CronDefinition, DispatchError, Dispatcher, LeaseGuard, LockService,
    RetryPolicy, ScheduleStore, SystemClock,
};
use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::callback::HttpCallback;
use crate::error::SchedulerError;
use crate::processor::{FnHandler, PayloadHandler, TaskContext, TaskProcessor};
use crate::rate::RateCounter;

/// Lock prefix serializing scan passes across processes.
pub(crate) const SCAN_LOCK: &str = "__scan__";

pub(crate) struct Inner {
    pub(crate) config: Config,
    pub(crate) namespace: String,
    pub(crate) buffer_key: String,
    pub(crate) store: Arc<dyn ScheduleStore>,
    pub(crate) locks: Arc<dyn LockService>,
    pub(crate) dispatcher: Arc<dyn Dispatcher>,
    pub(crate) admissions: Arc<dyn AdmissionLog>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) rate: RateCounter,
    pub(crate) handler: Option<Arc<dyn PayloadHandler>>,
    pub(crate) callback: Option<HttpCallback>,
}

/// Distributed cron and one-shot task scheduler.
///
/// Cheap to clone; clones share the same collaborators.
#[derive(Clone)]
pub struct Scheduler {
    pub(crate) inner: Arc<Inner>,
}

/// Builder for [`Scheduler`].
pub struct SchedulerBuilder {
    config: Config,
    store: Arc<dyn ScheduleStore>,
    locks: Arc<dyn LockService>,
    dispatcher: Arc<dyn Dispatcher>,
    admissions: Arc<dyn AdmissionLog>,
    clock: Arc<dyn Clock>,
    handler: Option<Arc<dyn PayloadHandler>>,
}

impl SchedulerBuilder {
    /// Use a different time source (tests).
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Run tasks in-process. Takes precedence over `callback_url`.
    pub fn handler(mut self, handler: impl PayloadHandler + 'static) -> Self {
        self.handler = Some(Arc::new(handler));
        self
    }

    /// Run tasks in-process with an async closure.
    pub fn handler_fn<F, Fut>(self, f: F) -> Self
    where
        F: Fn(cadence_protocols::TaskPayload, TaskContext) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<(), cadence_protocols::HandlerError>> + Send + 'static,
    {
        self.handler(FnHandler::new(f))
    }

    pub fn build(self) -> Scheduler {
        let namespace = self.config.scheduler.period_namespace();
        let buffer_key = format!("{}.waiting.stream", namespace);
        let rate = RateCounter::new(self.config.buffer.rate_window());
        let timeout = self.config.scheduler.timeout();
        let callback = self
            .config
            .scheduler
            .callback_url
            .as_ref()
            .filter(|url| !url.is_empty())
            .and_then(|url| match HttpCallback::with_timeout(url, timeout) {
                Ok(callback) => {
                    info!(url = %callback.url(), timeout_secs = timeout.as_secs(), "HTTP callback configured");
                    Some(callback)
                }
                Err(e) => {
                    warn!(url = %url, error = %e, "HTTP callback disabled");
                    None
                }
            });

        Scheduler {
            inner: Arc::new(Inner {
                config: self.config,
                namespace,
                buffer_key,
                store: self.store,
                locks: self.locks,
                dispatcher: self.dispatcher,
                admissions: self.admissions,
                clock: self.clock,
                rate,
                handler: self.handler,
                callback,
            }),
        }
    }
}

impl Scheduler {
    pub fn builder(
        config: Config,
        store: Arc<dyn ScheduleStore>,
        locks: Arc<dyn LockService>,
        dispatcher: Arc<dyn Dispatcher>,
        admissions: Arc<dyn AdmissionLog>,
    ) -> SchedulerBuilder {
        SchedulerBuilder {
            config,
            store,
            locks,
            dispatcher,
            admissions,
            clock: Arc::new(SystemClock),
            handler: None,
        }
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Store namespace holding the cron definitions.
    pub fn namespace(&self) -> &str {
        &self.inner.namespace
    }

    /// Admission log key used by `once_waiting`.
    pub fn buffer_key(&self) -> &str {
        &self.inner.buffer_key
    }

    /// Dispatcher queue every task goes into.
    pub fn queue(&self) -> &str {
        &self.inner.config.scheduler.queue
    }

    /// The handler to give the dispatcher's worker pool.
    pub fn processor(&self) -> TaskProcessor {
        TaskProcessor::new(self.clone())
    }

    /// Requests per second seen by `once_waiting` over the rate window.
    pub fn request_rate(&self) -> f64 {
        self.inner.rate.rate()
    }

    /// Read a stored cron definition.
    pub async fn get_cron(&self, identity: &str) -> Result<Option<CronDefinition>, SchedulerError> {
        self.load(identity).await
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.inner.clock.now()
    }

    /// Acquire `{namespace}.{prefix}.lock` with the configured retry budget.
    pub(crate) async fn lease(&self, prefix: &str) -> Result<LeaseGuard, SchedulerError> {
        let lock = &self.inner.config.lock;
        self.lease_with(prefix, RetryPolicy::new(lock.retry_count, lock.retry_interval()))
            .await
    }

    pub(crate) async fn lease_with(&self, prefix: &str, retry: RetryPolicy) -> Result<LeaseGuard, SchedulerError> {
        let key = format!("{}.{}.lock", self.inner.namespace, prefix);
        let ttl = self.inner.config.lock.ttl();
        Ok(LeaseGuard::acquire(self.inner.locks.clone(), &key, ttl, retry).await?)
    }

    pub(crate) async fn load(&self, identity: &str) -> Result<Option<CronDefinition>, SchedulerError> {
        let raw = self.inner.store.hash_get(&self.inner.namespace, identity).await?;
        raw.map(|raw| CronDefinition::from_json(&raw))
            .transpose()
            .map_err(SchedulerError::from)
    }

    pub(crate) async fn save(&self, definition: &CronDefinition) -> Result<(), SchedulerError> {
        let raw = definition.to_json()?;
        self.inner
            .store
            .hash_set(&self.inner.namespace, &definition.identity, raw)
            .await
            .map_err(|e| SchedulerError::StoreWriteFailed(e.to_string()))
    }

    /// Drop a queued instance so a recomputed `next` takes effect on the
    /// following scan. Running instances are left alone. Best-effort.
    pub(crate) async fn discard_queued(&self, identity: &str) {
        let dispatcher = &self.inner.dispatcher;
        let queue = self.queue();
        match dispatcher.info(queue, identity).await {
            Ok(Some(info)) if !info.state.is_active() => {
                match dispatcher.delete(queue, identity).await {
                    Ok(()) | Err(DispatchError::NotFound(_)) => {
                        debug!(identity = %identity, "Discarded queued instance");
                    }
                    Err(e) => warn!(identity = %identity, error = %e, "Failed to discard queued instance"),
                }
            }
            Ok(_) => {}
            Err(e) => warn!(identity = %identity, error = %e, "Failed to look up queued instance"),
        }
    }

    /// Spawn the scan, sweep and drain loops.
    pub fn start(&self) -> SchedulerHandle {
        let shutdown = CancellationToken::new();
        let mut tasks = Vec::with_capacity(3);

        tasks.push(tokio::spawn(self.clone().scan_loop(shutdown.clone())));
        if self.inner.config.scheduler.clear_archived_interval().is_some() {
            tasks.push(tokio::spawn(self.clone().sweep_loop(shutdown.clone())));
        }
        tasks.push(tokio::spawn(self.clone().drain_loop(shutdown.clone())));

        info!(
            queue = %self.queue(),
            namespace = %self.namespace(),
            "Scheduler started"
        );
        SchedulerHandle { shutdown, tasks }
    }

    async fn scan_loop(self, shutdown: CancellationToken) {
        let interval = self.inner.config.scheduler.scan_interval();
        info!(interval_ms = interval.as_millis() as u64, "Scan loop started");

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.scan_once().await {
                        warn!(error = %e, "Scan pass failed");
                    }
                }
            }
        }
        info!("Scan loop stopped");
    }

    async fn sweep_loop(self, shutdown: CancellationToken) {
        let Some(interval) = self.inner.config.scheduler.clear_archived_interval() else {
            return;
        };
        info!(interval_secs = interval.as_secs(), "Archive sweeper started");

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; nothing is archived yet at startup.
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.sweep_archived_once().await {
                        warn!(error = %e, "Archive sweep failed");
                    }
                }
            }
        }
        info!("Archive sweeper stopped");
    }

    async fn drain_loop(self, shutdown: CancellationToken) {
        let buffer = &self.inner.config.buffer;
        info!(max_count = buffer.max_count, max_rps = buffer.max_rps, "Buffer drainer started");

        loop {
            if let Err(e) = self.drain_once().await {
                warn!(error = %e, "Buffer drain failed");
            }

            let rate = self.inner.rate.rate();
            let pause = if rate > buffer.max_rps as f64 {
                debug!(rate, "Admission rate above ceiling, backing off");
                buffer.backoff_interval()
            } else {
                buffer.idle_interval()
            };

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(pause) => {}
            }
        }
        info!("Buffer drainer stopped");
    }
}

/// Running background loops of a [`Scheduler`].
pub struct SchedulerHandle {
    shutdown: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl SchedulerHandle {
    /// Token cancelled on shutdown; share it with the worker pool.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Stop every loop and wait for them to exit.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        for result in futures::future::join_all(self.tasks).await {
            if let Err(e) = result {
                warn!(error = %e, "Scheduler loop exited abnormally");
            }
        }
        info!("Scheduler stopped");
    }
}
