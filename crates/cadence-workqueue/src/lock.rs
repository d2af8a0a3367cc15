//! In-memory lease service.

use std::time::Duration;

use async_trait::async_trait;
use cadence_protocols::{Lease, LockError, LockService, RetryPolicy};
use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::time::Instant;
use tracing::trace;
use uuid::Uuid;

struct Holder {
    token: String,
    expires: Instant,
}

/// Lease table keyed by lock key. Expired leases can be taken over.
#[derive(Default)]
pub struct MemoryLockService {
    holders: DashMap<String, Holder>,
}

impl MemoryLockService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `key` is currently held by an unexpired lease.
    pub fn is_held(&self, key: &str) -> bool {
        self.holders
            .get(key)
            .is_some_and(|h| h.expires > Instant::now())
    }

    fn try_acquire(&self, key: &str, ttl: Duration) -> Option<String> {
        let now = Instant::now();
        let token = Uuid::new_v4().to_string();
        let holder = Holder {
            token: token.clone(),
            expires: now + ttl,
        };

        match self.holders.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().expires > now {
                    return None;
                }
                occupied.insert(holder);
            }
            Entry::Vacant(vacant) => {
                vacant.insert(holder);
            }
        }
        Some(token)
    }
}

#[async_trait]
impl LockService for MemoryLockService {
    async fn acquire(&self, key: &str, ttl: Duration, retry: RetryPolicy) -> Result<Lease, LockError> {
        let mut attempt = 0;
        loop {
            if let Some(token) = self.try_acquire(key, ttl) {
                let ttl = chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::days(365));
                let expires_at = Utc::now() + ttl;
                return Ok(Lease {
                    key: key.to_string(),
                    token,
                    expires_at,
                });
            }
            if attempt >= retry.count {
                return Err(LockError::Timeout { key: key.to_string() });
            }
            attempt += 1;
            trace!(key = %key, attempt, "Lock busy, retrying");
            tokio::time::sleep(retry.interval).await;
        }
    }

    async fn release(&self, lease: &Lease) -> Result<(), LockError> {
        let removed = self
            .holders
            .remove_if(&lease.key, |_, holder| holder.token == lease.token);
        match removed {
            Some(_) => Ok(()),
            None => Err(LockError::NotHeld(lease.key.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_acquire_release() {
        let locks = MemoryLockService::new();
        let lease = locks
            .acquire("k", Duration::from_secs(60), RetryPolicy::no_retry())
            .await
            .unwrap();
        assert!(locks.is_held("k"));

        locks.release(&lease).await.unwrap();
        assert!(!locks.is_held("k"));
    }

    #[tokio::test]
    async fn test_second_acquire_times_out() {
        let locks = MemoryLockService::new();
        let _lease = locks
            .acquire("k", Duration::from_secs(60), RetryPolicy::no_retry())
            .await
            .unwrap();

        let err = locks
            .acquire("k", Duration::from_secs(60), RetryPolicy::new(2, Duration::from_millis(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, LockError::Timeout { key } if key == "k"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_picks_up_released_lock() {
        let locks = std::sync::Arc::new(MemoryLockService::new());
        let lease = locks
            .acquire("k", Duration::from_secs(60), RetryPolicy::no_retry())
            .await
            .unwrap();

        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                locks
                    .acquire("k", Duration::from_secs(60), RetryPolicy::new(40, Duration::from_millis(25)))
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(60)).await;
        locks.release(&lease).await.unwrap();

        let second = contender.await.unwrap().unwrap();
        assert_ne!(second.token, lease.token);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_lease_is_reclaimable() {
        let locks = MemoryLockService::new();
        let stale = locks
            .acquire("k", Duration::from_secs(1), RetryPolicy::no_retry())
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(2)).await;
        let fresh = locks
            .acquire("k", Duration::from_secs(1), RetryPolicy::no_retry())
            .await
            .unwrap();

        // The stale holder can no longer release someone else's lease.
        assert!(matches!(locks.release(&stale).await, Err(LockError::NotHeld(_))));
        locks.release(&fresh).await.unwrap();
    }
}
