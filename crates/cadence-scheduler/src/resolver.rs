//! Cron expression resolution.
//!
//! Expressions are accepted in three shapes:
//!
//! - 5 fields, standard cron (`min hour dom month dow`), seconds implied `0`
//! - 6 fields with a leading seconds field
//! - 7 fields with a trailing year field
//!
//! plus the `@hourly`-style shorthands understood by the `cron` crate.

use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use cron::Schedule;

use crate::error::SchedulerError;

/// How many upcoming fire times [`CronResolver::validate`] compares.
pub const VALIDATION_SAMPLES: usize = 100;

/// The result of resolving an expression set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NextFire {
    pub next: DateTime<Utc>,
    /// Gap between `next` and the following fire of the same expression.
    pub interval: Duration,
    pub matched: String,
}

pub struct CronResolver;

impl CronResolver {
    /// Parse a single expression.
    pub fn parse(expr: &str) -> Result<Schedule, SchedulerError> {
        let trimmed = expr.trim();
        let normalized = if trimmed.starts_with('@') {
            trimmed.to_string()
        } else {
            match trimmed.split_whitespace().count() {
                5 => format!("0 {}", trimmed),
                6 | 7 => trimmed.to_string(),
                n => {
                    return Err(SchedulerError::invalid_expression(
                        expr,
                        format!("expected 5, 6 or 7 fields, got {}", n),
                    ));
                }
            }
        };
        Schedule::from_str(&normalized).map_err(|e| SchedulerError::invalid_expression(expr, e))
    }

    /// Earliest next fire of `expressions` after `since` (or `now`).
    ///
    /// A fire time that already lies before `now` is recomputed from `now`,
    /// so a definition that sat idle through downtime does not replay every
    /// missed tick.
    pub fn next(
        expressions: &[String],
        since: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<NextFire, SchedulerError> {
        if expressions.is_empty() {
            return Err(SchedulerError::invalid_expression("", "empty expression list"));
        }

        let mut best: Option<NextFire> = None;
        for expr in expressions {
            let fire = Self::next_single(expr, since, now)?;
            if best.as_ref().is_none_or(|b| fire.next < b.next) {
                best = Some(fire);
            }
        }
        best.ok_or_else(|| SchedulerError::invalid_expression("", "empty expression list"))
    }

    fn next_single(
        expr: &str,
        since: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<NextFire, SchedulerError> {
        let schedule = Self::parse(expr)?;
        let start = since.unwrap_or(now);

        let mut next = Self::first_after(&schedule, expr, start)?;
        if next < now {
            next = Self::first_after(&schedule, expr, now)?;
        }
        let interval = schedule
            .after(&next)
            .next()
            .map(|following| following - next)
            .unwrap_or_else(Duration::zero);

        Ok(NextFire {
            next,
            interval,
            matched: expr.to_string(),
        })
    }

    fn first_after(
        schedule: &Schedule,
        expr: &str,
        after: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, SchedulerError> {
        schedule
            .after(&after)
            .next()
            .ok_or_else(|| SchedulerError::invalid_expression(expr, "no upcoming fire time"))
    }

    /// The next `count` fire times of a single expression after `from`.
    pub fn upcoming(
        expr: &str,
        from: DateTime<Utc>,
        count: usize,
    ) -> Result<Vec<DateTime<Utc>>, SchedulerError> {
        let schedule = Self::parse(expr)?;
        Ok(schedule.after(&from).take(count).collect())
    }

    /// Reject empty, unparsable, or coinciding expression sets.
    ///
    /// Two expressions coincide when any of their next
    /// [`VALIDATION_SAMPLES`] fire times are identical; registering such a
    /// set would fire the same identity twice at one instant.
    pub fn validate(expressions: &[String], from: DateTime<Utc>) -> Result<(), SchedulerError> {
        if expressions.is_empty() {
            return Err(SchedulerError::invalid_expression("", "empty expression list"));
        }

        let mut seen: HashMap<DateTime<Utc>, &str> = HashMap::new();
        for expr in expressions {
            for at in Self::upcoming(expr, from, VALIDATION_SAMPLES)? {
                if let Some(other) = seen.insert(at, expr.as_str()) {
                    return Err(SchedulerError::invalid_expression(
                        expr.as_str(),
                        format!("fires at {} together with '{}'", at.to_rfc3339(), other),
                    ));
                }
            }
        }
        Ok(())
    }
}
