//! Scan pass: enqueue every due cron definition.

use std::time::Duration;

use cadence_protocols::{CronDefinition, EnqueueOptions, RetryPolicy, TaskEnvelope, Timing};
use tracing::{Instrument, debug, info_span, warn};

use crate::error::SchedulerError;
use crate::resolver::CronResolver;
use crate::scheduler::{SCAN_LOCK, Scheduler};

/// Gaps up to this long get no retention hint.
const RETENTION_THRESHOLD_SECS: i64 = 10;
/// Upper bound of the retention hint.
const MAX_RETENTION_SECS: i64 = 600;

/// Outcome of one scan pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanReport {
    /// Another process held the scan lease.
    pub skipped: bool,
    pub enqueued: usize,
    /// Definitions whose instance is still in the dispatcher.
    pub in_flight: usize,
    pub failed: usize,
}

/// Retention for an instance whose successor is `gap` later, so a late run
/// does not linger into the next one.
pub(crate) fn retention_hint(gap: chrono::Duration) -> Option<Duration> {
    let secs = gap.num_seconds();
    if secs <= RETENTION_THRESHOLD_SECS {
        return None;
    }
    let retention = (secs / 3).min(MAX_RETENTION_SECS);
    u64::try_from(retention).ok().map(Duration::from_secs)
}

impl Scheduler {
    /// Run one scan pass.
    ///
    /// Only one process scans at a time; the others see `skipped`. Each
    /// definition not already in the dispatcher is enqueued at its stored
    /// `next`, and on success its `next` advances. All advances are written
    /// in one batch at the end.
    pub async fn scan_once(&self) -> Result<ScanReport, SchedulerError> {
        async {
            let mut report = ScanReport::default();
            let scan_guard = match self.lease(SCAN_LOCK).await {
                Ok(guard) => guard,
                Err(SchedulerError::LockTimeout(_)) => {
                    debug!("Scan lease held elsewhere, skipping");
                    report.skipped = true;
                    return Ok(report);
                }
                Err(e) => return Err(e),
            };

            let inner = &self.inner;
            let all = inner.store.hash_get_all(&inner.namespace).await?;
            let mut updates = Vec::new();
            // Held until the batch is written so no retarget interleaves.
            let mut leases = Vec::new();

            for identity in all.keys() {
                match inner.dispatcher.info(self.queue(), identity).await {
                    Ok(Some(_)) => {
                        report.in_flight += 1;
                        continue;
                    }
                    Ok(None) => {}
                    Err(e) => {
                        warn!(identity = %identity, error = %e, "Dispatcher lookup failed");
                        report.failed += 1;
                        continue;
                    }
                }

                let Ok(lease) = self.lease_with(identity, RetryPolicy::no_retry()).await else {
                    debug!(identity = %identity, "Definition busy, retrying next pass");
                    continue;
                };
                // Re-read under the identity lease; the bulk read may be stale.
                let definition = match self.load(identity).await {
                    Ok(Some(definition)) => definition,
                    Ok(None) => continue,
                    Err(e) => {
                        warn!(identity = %identity, error = %e, "Unreadable definition");
                        report.failed += 1;
                        continue;
                    }
                };

                match self.enqueue_due(&definition).await {
                    Ok(advanced) => {
                        updates.push((identity.clone(), advanced.to_json()?));
                        leases.push(lease);
                        report.enqueued += 1;
                    }
                    Err(e) => {
                        warn!(identity = %identity, error = %e, "Enqueue failed, retrying next pass");
                        report.failed += 1;
                    }
                }
            }

            let written = inner
                .store
                .hash_set_many(&inner.namespace, updates)
                .await
                .map_err(|e| SchedulerError::StoreWriteFailed(e.to_string()));
            for lease in leases {
                lease.release().await;
            }
            scan_guard.release().await;
            written?;

            if report.enqueued > 0 || report.failed > 0 {
                debug!(
                    enqueued = report.enqueued,
                    in_flight = report.in_flight,
                    failed = report.failed,
                    "Scan pass finished"
                );
            }
            Ok(report)
        }
        .instrument(info_span!("scan"))
        .await
    }

    /// Enqueue `definition` at its stored `next`; returns it advanced to the
    /// following fire.
    async fn enqueue_due(&self, definition: &CronDefinition) -> Result<CronDefinition, SchedulerError> {
        let now = self.now();
        let fire = CronResolver::next(&definition.expressions, Some(definition.next), now)?;
        let defaults = &self.inner.config.scheduler;

        let options = EnqueueOptions {
            queue: self.queue().to_string(),
            max_retry: definition
                .options
                .max_retry
                .filter(|n| *n > 0)
                .unwrap_or(defaults.max_retry),
            timeout: definition
                .options
                .timeout_secs
                .map_or_else(|| defaults.timeout(), Duration::from_secs),
            retention: retention_hint(fire.next - definition.next),
            timing: Timing::At(definition.next),
        };
        let task = TaskEnvelope::cron(
            definition.identity.clone(),
            definition.group.clone(),
            definition.payload.clone(),
        );
        self.inner.dispatcher.enqueue(task, options).await?;
        debug!(
            identity = %definition.identity,
            process_at = %definition.next,
            next = %fire.next,
            "Cron task enqueued"
        );

        let mut advanced = definition.clone();
        advanced.next = fire.next;
        Ok(advanced)
    }
}
