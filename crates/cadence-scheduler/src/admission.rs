//! Buffered one-shot admission and the drainer that feeds it to `once`.

use std::collections::BTreeMap;

use cadence_protocols::{BufferEntry, BufferError, BufferedAdmission, OnceRequest};
use tracing::{Instrument, debug, info_span, warn};

use crate::error::SchedulerError;
use crate::scheduler::Scheduler;

const FIELD_UID: &str = "uid";
const FIELD_BODY: &str = "body";

/// Outcome of one drain cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Entries dropped because the buffer was over capacity.
    pub overflowed: usize,
    /// Entries handed to `once` successfully.
    pub admitted: usize,
    /// Entries dropped because they could never be admitted.
    pub rejected: usize,
    /// Entries left in the buffer for the next cycle.
    pub deferred: usize,
}

impl Scheduler {
    /// Buffer a one-shot request for the drainer instead of admitting it now.
    ///
    /// Never waits on the dispatcher.
    pub async fn once_waiting(&self, mut request: OnceRequest) -> Result<(), SchedulerError> {
        if request.identity.is_empty() {
            return Err(SchedulerError::InvalidIdentity);
        }
        let identity = request.identity.clone();
        let trace = request.trace.take().unwrap_or_default();
        let admission = BufferedAdmission {
            request,
            trace: Some(trace),
        };
        let fields = BTreeMap::from([
            (FIELD_UID.to_string(), identity.clone()),
            (FIELD_BODY.to_string(), serde_json::to_string(&admission)?),
        ]);

        let id = self.inner.admissions.append(&self.inner.buffer_key, fields).await?;
        self.inner.rate.incr();
        debug!(identity = %identity, entry = %id, "Admission buffered");
        Ok(())
    }

    /// Run one drain cycle: cap the buffer, admit a batch, trim what was read.
    ///
    /// A retryable failure stops the batch so the remaining entries are read
    /// again next cycle. Entries that can never be admitted are dropped.
    pub async fn drain_once(&self) -> Result<DrainReport, SchedulerError> {
        let key = &self.inner.buffer_key;
        let max_count = self.inner.config.buffer.max_count;
        let log = &self.inner.admissions;
        let mut report = DrainReport::default();

        report.overflowed = log.trim_max_len(key, max_count).await?;
        if report.overflowed > 0 {
            warn!(dropped = report.overflowed, "Admission buffer over capacity");
        }

        let batch = log.read_batch(key, max_count).await?;
        let total = batch.len();
        let mut last = None;

        for entry in batch {
            match self.admit_entry(&entry).await {
                Ok(()) => report.admitted += 1,
                Err(e) if e.is_retryable() => {
                    warn!(entry = %entry.id, error = %e, "Admission deferred");
                    break;
                }
                Err(e) => {
                    warn!(entry = %entry.id, error = %e, "Admission rejected");
                    report.rejected += 1;
                }
            }
            last = Some(entry.id);
        }
        report.deferred = total - report.admitted - report.rejected;

        if let Some(id) = last {
            log.trim_up_to(key, &id).await?;
        }
        if total > 0 {
            debug!(
                admitted = report.admitted,
                rejected = report.rejected,
                deferred = report.deferred,
                "Drain cycle finished"
            );
        }
        Ok(report)
    }

    async fn admit_entry(&self, entry: &BufferEntry) -> Result<(), SchedulerError> {
        let body = entry
            .fields
            .get(FIELD_BODY)
            .ok_or_else(|| BufferError::Backend(format!("entry {} has no body", entry.id)))?;
        let admission: BufferedAdmission = serde_json::from_str(body)?;
        let trace = admission.trace.unwrap_or_default();

        let span = info_span!("drain", entry = %entry.id);
        self.admit(admission.request, trace).instrument(span).await
    }
}

#[cfg(test)]
#[path = "admission_tests.rs"]
mod tests;
