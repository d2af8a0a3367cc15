//! # Cadence Workqueue
//!
//! In-process implementations of every collaborator the scheduler needs.
//!
//! ## Features
//!
//! - Namespaced hash store with batched writes
//! - Lease service with TTL expiry and bounded retry
//! - Dispatcher with scheduled/retry/archive states and a worker pool
//! - Append/trim admission log
//!
//! These back the tests and the single-process deployment of the binary.
//! A multi-process deployment swaps them for shared backends behind the
//! same traits.

pub mod config;
pub mod dispatcher;
pub mod lock;
pub mod log;
pub mod store;

pub use config::DispatcherConfig;
pub use dispatcher::MemoryDispatcher;
pub use lock::MemoryLockService;
pub use log::MemoryAdmissionLog;
pub use store::MemoryScheduleStore;
