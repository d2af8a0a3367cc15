//! Cron definition lifecycle: register, retarget, restore, remove.

use cadence_protocols::{CronDefinition, CronOptions, DispatchError};
use chrono::{DateTime, Utc};
use tracing::{Instrument, debug, info, info_span, warn};

use crate::error::SchedulerError;
use crate::resolver::{CronResolver, NextFire};
use crate::scheduler::Scheduler;

/// Next fire after switching from `old` to `new` cadence.
///
/// When the new cadence is slower and its next tick would not land after the
/// one already promised under the old cadence, one extra tick is skipped so
/// the observable next fire never moves backward.
pub(crate) fn retarget_next(old: &NextFire, new: &NextFire) -> DateTime<Utc> {
    if new.interval > old.interval && new.next <= old.next {
        new.next + new.interval
    } else {
        new.next
    }
}

impl Scheduler {
    /// Register (or re-register) a recurring task.
    ///
    /// If the stored definition is currently retargeted away from exactly
    /// `expressions`, the call is a no-op so a static registration does not
    /// clobber a live override.
    pub async fn cron(
        &self,
        identity: &str,
        group: &str,
        payload: &str,
        expressions: Vec<String>,
        options: CronOptions,
    ) -> Result<(), SchedulerError> {
        async {
            if identity.is_empty() {
                return Err(SchedulerError::InvalidIdentity);
            }
            let now = self.now();
            CronResolver::validate(&expressions, now)?;
            let fire = CronResolver::next(&expressions, None, now)?;

            let guard = self.lease(identity).await?;
            let existing = self.load(identity).await?;
            if let Some(current) = &existing {
                if current.is_overridden() && current.original_expressions == expressions {
                    info!(
                        current = ?current.expressions,
                        "Definition is retargeted, keeping the override"
                    );
                    guard.release().await;
                    return Ok(());
                }
            }

            let definition = CronDefinition {
                identity: identity.to_string(),
                group: group.to_string(),
                payload: payload.to_string(),
                expressions,
                original_expressions: Vec::new(),
                next: fire.next,
                processed: existing.as_ref().map_or(0, |d| d.processed),
                options,
            };
            self.save(&definition).await?;
            if existing.is_some() {
                self.discard_queued(identity).await;
            }
            guard.release().await;

            info!(next = %definition.next, "Cron task registered");
            Ok(())
        }
        .instrument(info_span!("cron", identity = %identity))
        .await
    }

    /// Switch a definition to `expressions` at runtime.
    ///
    /// The first retarget remembers the previous expressions so
    /// [`restore_cron_expr`](Self::restore_cron_expr) can undo it.
    pub async fn update_cron_expr(&self, identity: &str, expressions: Vec<String>) -> Result<(), SchedulerError> {
        async {
            if identity.is_empty() {
                return Err(SchedulerError::InvalidIdentity);
            }
            let now = self.now();
            CronResolver::validate(&expressions, now)?;

            let guard = self.lease(identity).await?;
            let mut definition = self
                .load(identity)
                .await?
                .ok_or_else(|| SchedulerError::CronTaskNotFound(identity.to_string()))?;

            if definition.expressions == expressions {
                debug!("Expressions unchanged");
                guard.release().await;
                return Ok(());
            }

            let old = CronResolver::next(&definition.expressions, None, now)?;
            let new = CronResolver::next(&expressions, None, now)?;
            let next = retarget_next(&old, &new);

            if definition.original_expressions.is_empty() {
                definition.original_expressions = definition.expressions.clone();
            }
            definition.expressions = expressions;
            if definition.original_expressions == definition.expressions {
                definition.original_expressions.clear();
            }
            definition.next = next;

            self.save(&definition).await?;
            self.discard_queued(identity).await;
            guard.release().await;

            info!(
                expressions = ?definition.expressions,
                next = %next,
                "Cron task retargeted"
            );
            Ok(())
        }
        .instrument(info_span!("update_cron_expr", identity = %identity))
        .await
    }

    /// Undo a retarget, going back to the originally registered expressions.
    pub async fn restore_cron_expr(&self, identity: &str) -> Result<(), SchedulerError> {
        async {
            if identity.is_empty() {
                return Err(SchedulerError::InvalidIdentity);
            }
            let guard = self.lease(identity).await?;
            let mut definition = self
                .load(identity)
                .await?
                .ok_or_else(|| SchedulerError::CronTaskNotFound(identity.to_string()))?;

            if definition.original_expressions.is_empty() {
                debug!("Nothing to restore");
                guard.release().await;
                return Ok(());
            }

            let now = self.now();
            let original = std::mem::take(&mut definition.original_expressions);
            CronResolver::validate(&original, now)?;
            let fire = CronResolver::next(&original, None, now)?;
            definition.expressions = original;
            definition.next = fire.next;

            self.save(&definition).await?;
            self.discard_queued(identity).await;
            guard.release().await;

            info!(next = %definition.next, "Cron task restored");
            Ok(())
        }
        .instrument(info_span!("restore_cron_expr", identity = %identity))
        .await
    }

    /// Delete a definition and any instance of it in the dispatcher.
    ///
    /// Succeeds when nothing exists under `identity`. A running instance is
    /// cancelled before it is deleted.
    pub async fn remove(&self, identity: &str) -> Result<(), SchedulerError> {
        async {
            if identity.is_empty() {
                return Err(SchedulerError::InvalidIdentity);
            }
            let guard = self.lease(identity).await?;
            let inner = &self.inner;

            if let Err(e) = inner.store.hash_delete(&inner.namespace, identity).await {
                warn!(error = %e, "Failed to delete definition");
            }
            if let Err(e) = inner.dispatcher.cancel(identity).await {
                warn!(error = %e, "Failed to cancel execution");
            }
            match inner.dispatcher.delete(self.queue(), identity).await {
                Ok(()) | Err(DispatchError::NotFound(_)) => {}
                Err(e) => warn!(error = %e, "Failed to delete queued instance"),
            }
            guard.release().await;

            info!("Task removed");
            Ok(())
        }
        .instrument(info_span!("remove", identity = %identity))
        .await
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
