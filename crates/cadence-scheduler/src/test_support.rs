//! Shared fixtures for unit tests.

use std::sync::Arc;

use cadence_config::Config;
use cadence_protocols::ManualClock;
use cadence_workqueue::{
    DispatcherConfig, MemoryAdmissionLog, MemoryDispatcher, MemoryLockService, MemoryScheduleStore,
};
use chrono::{DateTime, TimeZone, Utc};

use crate::scheduler::{Scheduler, SchedulerBuilder};

pub(crate) struct Harness {
    pub scheduler: Scheduler,
    pub store: Arc<MemoryScheduleStore>,
    pub locks: Arc<MemoryLockService>,
    pub dispatcher: Arc<MemoryDispatcher>,
    pub log: Arc<MemoryAdmissionLog>,
    pub clock: ManualClock,
}

pub(crate) fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, 15, 10, 30, 0).unwrap()
}

pub(crate) fn exprs(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

pub(crate) fn test_config() -> Config {
    let mut config = Config::default();
    config.lock.retry_count = 2;
    config.lock.retry_interval_ms = 1;
    config
}

pub(crate) fn harness() -> Harness {
    harness_with(test_config(), |b| b)
}

pub(crate) fn harness_with(
    config: Config,
    customize: impl FnOnce(SchedulerBuilder) -> SchedulerBuilder,
) -> Harness {
    let clock = ManualClock::new(start_time());
    let store = Arc::new(MemoryScheduleStore::new());
    let locks = Arc::new(MemoryLockService::new());
    let dispatcher = Arc::new(MemoryDispatcher::with_clock(
        DispatcherConfig {
            retry_delay_ms: 1000,
            ..Default::default()
        },
        Arc::new(clock.clone()),
    ));
    let log = Arc::new(MemoryAdmissionLog::new());

    let builder = Scheduler::builder(
        config,
        store.clone(),
        locks.clone(),
        dispatcher.clone(),
        log.clone(),
    )
    .clock(Arc::new(clock.clone()));
    let scheduler = customize(builder).build();

    Harness {
        scheduler,
        store,
        locks,
        dispatcher,
        log,
        clock,
    }
}
