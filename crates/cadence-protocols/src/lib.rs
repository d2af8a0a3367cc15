//! # Cadence Protocols
//!
//! Contracts the scheduler consumes from the outside world, plus the task
//! records that flow across them. Contains only interface definitions and
//! plain data - no backends.
//!
//! ## Collaborators
//!
//! - [`ScheduleStore`] - hash-field key/value store holding cron definitions
//! - [`LockService`] - distributed mutual exclusion handing out [`Lease`]s
//! - [`Dispatcher`] - task queue / worker pool the scheduler enqueues into
//! - [`AdmissionLog`] - append/trim log backing the admission buffer
//! - [`TaskHandler`] - what the dispatcher invokes for each execution
//! - [`Clock`] - wall-clock source, swappable in tests

pub mod buffer;
pub mod clock;
pub mod dispatcher;
pub mod error;
pub mod lock;
pub mod store;
pub mod types;

pub use buffer::{AdmissionLog, BufferEntry, EntryId};
pub use clock::{Clock, ManualClock, SystemClock};
pub use dispatcher::{Dispatcher, ExecutionContext, TaskHandler};
pub use error::{BufferError, DispatchError, HandlerError, LockError, StoreError};
pub use lock::{Lease, LeaseGuard, LockService, RetryPolicy};
pub use store::ScheduleStore;
pub use types::*;
