//! Lock service errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LockError {
    /// The lease could not be obtained within the retry budget.
    #[error("Timed out acquiring lock: {key}")]
    Timeout { key: String },

    /// Release was attempted with a lease that no longer owns the key.
    #[error("Lock not held: {0}")]
    NotHeld(String),

    #[error("Lock backend error: {0}")]
    Backend(String),
}
