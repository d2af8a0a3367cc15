//! Lock service protocol.
//!
//! Every mutation of shared scheduler state happens while holding a
//! [`Lease`]. [`LeaseGuard`] ties the lease to a scope so it is released on
//! every exit path.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::error::LockError;

/// How long `acquire` keeps trying before giving up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub count: u32,
    pub interval: Duration,
}

impl RetryPolicy {
    pub fn new(count: u32, interval: Duration) -> Self {
        Self { count, interval }
    }

    /// Try exactly once.
    pub fn no_retry() -> Self {
        Self {
            count: 0,
            interval: Duration::ZERO,
        }
    }
}

/// Ownership token for one lock key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lease {
    pub key: String,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[async_trait]
pub trait LockService: Send + Sync {
    /// Acquire `key` for `ttl`, retrying per `retry`.
    ///
    /// Returns [`LockError::Timeout`] once the retry budget is spent.
    async fn acquire(&self, key: &str, ttl: Duration, retry: RetryPolicy) -> Result<Lease, LockError>;

    /// Release a lease. Releasing an expired or foreign lease is
    /// [`LockError::NotHeld`].
    async fn release(&self, lease: &Lease) -> Result<(), LockError>;
}

/// A held lease that is released when the guard goes away.
pub struct LeaseGuard {
    service: Arc<dyn LockService>,
    lease: Option<Lease>,
}

impl LeaseGuard {
    pub async fn acquire(
        service: Arc<dyn LockService>,
        key: &str,
        ttl: Duration,
        retry: RetryPolicy,
    ) -> Result<Self, LockError> {
        let lease = service.acquire(key, ttl, retry).await?;
        debug!(key = %lease.key, "Lease acquired");
        Ok(Self {
            service,
            lease: Some(lease),
        })
    }

    pub fn key(&self) -> &str {
        self.lease.as_ref().map(|l| l.key.as_str()).unwrap_or_default()
    }

    /// Release now. Failures are logged; the lease expires on its own anyway.
    pub async fn release(mut self) {
        if let Some(lease) = self.lease.take() {
            match self.service.release(&lease).await {
                Ok(()) => debug!(key = %lease.key, "Lease released"),
                Err(e) => warn!(key = %lease.key, error = %e, "Failed to release lease"),
            }
        }
    }
}

impl Drop for LeaseGuard {
    fn drop(&mut self) {
        // Early return or panic inside the critical section.
        let Some(lease) = self.lease.take() else {
            return;
        };
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(key = %lease.key, "No runtime to release lease; it will expire");
            return;
        };
        let service = self.service.clone();
        handle.spawn(async move {
            if let Err(e) = service.release(&lease).await {
                warn!(key = %lease.key, error = %e, "Failed to release lease");
            }
        });
    }
}
