//! Persisted recurring task definition.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-definition overrides of the process-wide defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CronOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retry: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_archived_secs: Option<u64>,
}

impl CronOptions {
    pub fn with_max_retry(mut self, count: u32) -> Self {
        self.max_retry = Some(count);
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    pub fn with_max_archived(mut self, secs: u64) -> Self {
        self.max_archived_secs = Some(secs);
        self
    }
}

/// A recurring task definition, one per identity in the schedule store.
///
/// `expressions` is the trigger set currently in effect. When it has been
/// retargeted at runtime, `original_expressions` holds the set it replaced
/// so it can be restored later; an empty list means no override is active.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CronDefinition {
    pub identity: String,
    pub group: String,
    #[serde(default)]
    pub payload: String,
    pub expressions: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub original_expressions: Vec<String>,
    /// Next time this definition is due.
    #[serde(with = "chrono::serde::ts_seconds")]
    pub next: DateTime<Utc>,
    /// Completed executions, best-effort.
    #[serde(default)]
    pub processed: u64,
    #[serde(flatten)]
    pub options: CronOptions,
}

impl CronDefinition {
    /// True while a runtime retarget is in effect.
    pub fn is_overridden(&self) -> bool {
        !self.original_expressions.is_empty() && self.original_expressions != self.expressions
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}
