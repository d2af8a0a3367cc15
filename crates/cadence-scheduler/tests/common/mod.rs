//! Shared deployment fixture for scenario tests.

#![allow(dead_code)]

use std::sync::Arc;

use cadence_config::Config;
use cadence_protocols::{Dispatcher, ManualClock};
use cadence_scheduler::{Scheduler, SchedulerBuilder};
use cadence_workqueue::{
    DispatcherConfig, MemoryAdmissionLog, MemoryDispatcher, MemoryLockService, MemoryScheduleStore,
};
use chrono::{DateTime, TimeZone, Utc};

/// Collaborators shared by every scheduler "process" in a test.
pub struct Deployment {
    pub store: Arc<MemoryScheduleStore>,
    pub locks: Arc<MemoryLockService>,
    pub dispatcher: Arc<MemoryDispatcher>,
    pub log: Arc<MemoryAdmissionLog>,
    pub clock: ManualClock,
}

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 8, 15, 0).unwrap()
}

pub fn exprs(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

pub fn config() -> Config {
    let mut config = Config::default();
    config.lock.retry_count = 5;
    config.lock.retry_interval_ms = 1;
    config.workers.poll_interval_ms = 5;
    config
}

impl Deployment {
    pub fn new() -> Self {
        let clock = ManualClock::new(t0());
        let dispatcher = MemoryDispatcher::with_clock(
            DispatcherConfig {
                concurrency: 4,
                poll_interval_ms: 5,
                retry_delay_ms: 1000,
            },
            Arc::new(clock.clone()),
        );
        Self {
            store: Arc::new(MemoryScheduleStore::new()),
            locks: Arc::new(MemoryLockService::new()),
            dispatcher: Arc::new(dispatcher),
            log: Arc::new(MemoryAdmissionLog::new()),
            clock,
        }
    }

    /// A scheduler wired to these collaborators.
    pub fn builder(&self, config: Config) -> SchedulerBuilder {
        self.builder_with(config, self.dispatcher.clone())
    }

    pub fn builder_with(&self, config: Config, dispatcher: Arc<dyn Dispatcher>) -> SchedulerBuilder {
        Scheduler::builder(
            config,
            self.store.clone(),
            self.locks.clone(),
            dispatcher,
            self.log.clone(),
        )
        .clock(Arc::new(self.clock.clone()))
    }

    pub fn scheduler(&self) -> Scheduler {
        self.builder(config()).build()
    }
}
