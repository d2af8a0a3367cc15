//! Archive sweeper: clear retry-exhausted instances after their grace window.

use cadence_protocols::{DispatchError, Page, TaskInfo, TaskKind, TaskState};
use chrono::Duration;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::error::SchedulerError;
use crate::resolver::CronResolver;
use crate::scheduler::Scheduler;

/// Grace window of archived one-shot tasks without an override.
pub const DEFAULT_ONCE_ARCHIVE_SECS: i64 = 300;

const ARCHIVE_PAGE_SIZE: usize = 100;

impl Scheduler {
    /// Run one sweep. Returns how many archived instances were cleared.
    ///
    /// Clearing an instance only deletes it from the dispatcher; a cron
    /// definition stays registered and is enqueued again by the next scan.
    /// Definitions are never deleted here, only through `remove`.
    pub async fn sweep_archived_once(&self) -> Result<usize, SchedulerError> {
        async {
            let now = self.now();
            let dispatcher = &self.inner.dispatcher;
            let mut expired = Vec::new();
            let mut page = Page::first(ARCHIVE_PAGE_SIZE);

            loop {
                let list = dispatcher.list_archived(self.queue(), page).await?;
                for info in &list {
                    if info.has_retry_budget() {
                        continue;
                    }
                    let grace = self.archive_grace(info).await;
                    let due = info.last_failed_at.is_none_or(|last| now > last + grace);
                    if due {
                        expired.push(info.task.identity.clone());
                    }
                }
                if list.len() < page.size {
                    break;
                }
                page = page.next();
            }

            let mut cleared = 0;
            for identity in expired {
                match self.clear_archived(&identity).await {
                    Ok(true) => cleared += 1,
                    Ok(false) => {}
                    Err(e) => warn!(identity = %identity, error = %e, "Failed to clear archived task"),
                }
            }
            if cleared > 0 {
                info!(cleared, "Archived tasks cleared");
            }
            Ok(cleared)
        }
        .instrument(info_span!("sweep_archived"))
        .await
    }

    async fn archive_grace(&self, info: &TaskInfo) -> Duration {
        let once_default = || {
            let configured = self.inner.config.scheduler.max_archived_secs;
            if configured > 0 {
                Duration::seconds(configured as i64)
            } else {
                Duration::seconds(DEFAULT_ONCE_ARCHIVE_SECS)
            }
        };

        match &info.task.kind {
            TaskKind::Once { max_archived_secs, .. } => max_archived_secs
                .filter(|secs| *secs > 0)
                .map(|secs| Duration::seconds(secs as i64))
                .unwrap_or_else(once_default),
            TaskKind::Cron { .. } => match self.load(&info.task.identity).await {
                Ok(Some(definition)) => {
                    if let Some(secs) = definition.options.max_archived_secs.filter(|s| *s > 0) {
                        return Duration::seconds(secs as i64);
                    }
                    match CronResolver::next(&definition.expressions, Some(definition.next), self.now()) {
                        Ok(fire) => fire.interval / 2,
                        Err(_) => once_default(),
                    }
                }
                _ => once_default(),
            },
        }
    }

    /// Delete one archived instance under its identity lease.
    async fn clear_archived(&self, identity: &str) -> Result<bool, SchedulerError> {
        let guard = self.lease(identity).await?;
        let dispatcher = &self.inner.dispatcher;

        // It may have been replaced since the listing.
        let still_archived = matches!(
            dispatcher.info(self.queue(), identity).await?,
            Some(info) if info.state == TaskState::Archived
        );
        let cleared = if still_archived {
            match dispatcher.delete(self.queue(), identity).await {
                Ok(()) | Err(DispatchError::NotFound(_)) => {
                    debug!(identity = %identity, "Archived task cleared");
                    true
                }
                Err(e) => {
                    guard.release().await;
                    return Err(e.into());
                }
            }
        } else {
            false
        };
        guard.release().await;
        Ok(cleared)
    }
}

#[cfg(test)]
#[path = "sweeper_tests.rs"]
mod tests;
