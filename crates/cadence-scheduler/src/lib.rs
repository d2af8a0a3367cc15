//! # Cadence Scheduler
//!
//! Decides when recurring and one-shot tasks run, keeps at most one live
//! instance per task identity across processes, and smooths bursts of
//! one-shot work through a buffered admission path.
//!
//! ## Operations
//!
//! - [`Scheduler::cron`], [`Scheduler::update_cron_expr`],
//!   [`Scheduler::restore_cron_expr`], [`Scheduler::remove`]: recurring
//!   task lifecycle
//! - [`Scheduler::once`]: direct one-shot admission
//! - [`Scheduler::once_waiting`]: buffered one-shot admission
//!
//! ## Background loops
//!
//! [`Scheduler::start`] spawns the scan, archive sweep and buffer drain
//! loops. Each loop's single pass is also public
//! ([`Scheduler::scan_once`], [`Scheduler::sweep_archived_once`],
//! [`Scheduler::drain_once`]).
//!
//! Execution itself belongs to the dispatcher; hand it
//! [`Scheduler::processor`] as its task handler.

mod admission;
mod callback;
mod error;
mod manager;
mod once;
mod processor;
mod rate;
mod resolver;
mod scan;
mod scheduler;
mod sweeper;

#[cfg(test)]
mod test_support;

pub use admission::DrainReport;
pub use callback::HttpCallback;
pub use error::SchedulerError;
pub use processor::{FnHandler, PayloadHandler, TaskContext, TaskProcessor};
pub use rate::RateCounter;
pub use resolver::{CronResolver, NextFire, VALIDATION_SAMPLES};
pub use scan::ScanReport;
pub use scheduler::{Scheduler, SchedulerBuilder, SchedulerHandle};
pub use sweeper::DEFAULT_ONCE_ARCHIVE_SECS;
