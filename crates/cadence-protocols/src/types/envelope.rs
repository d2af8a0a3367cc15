//! The record enqueued into the dispatcher for every execution.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Trace identifiers carried across the admission buffer and the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceContext {
    pub trace_id: String,
    pub span_id: String,
}

impl TraceContext {
    /// Start a fresh trace.
    pub fn new() -> Self {
        let trace_id = Uuid::new_v4().simple().to_string();
        let span_id = Uuid::new_v4().simple().to_string()[..16].to_string();
        Self { trace_id, span_id }
    }

    /// Same trace, new span.
    pub fn child(&self) -> Self {
        Self {
            trace_id: self.trace_id.clone(),
            span_id: Uuid::new_v4().simple().to_string()[..16].to_string(),
        }
    }
}

impl Default for TraceContext {
    fn default() -> Self {
        Self::new()
    }
}

/// What produced a dispatcher task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskKind {
    /// An instance of a recurring definition.
    Cron { group: String, payload: String },
    /// A one-shot request.
    Once {
        group: String,
        payload: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        trace: Option<TraceContext>,
        /// How long the archived task is kept before the sweeper clears it.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_archived_secs: Option<u64>,
    },
}

/// A task as seen by the dispatcher, addressed by its identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskEnvelope {
    pub identity: String,
    #[serde(flatten)]
    pub kind: TaskKind,
}

impl TaskEnvelope {
    pub fn cron(identity: impl Into<String>, group: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            kind: TaskKind::Cron {
                group: group.into(),
                payload: payload.into(),
            },
        }
    }

    pub fn once(
        identity: impl Into<String>,
        group: impl Into<String>,
        payload: impl Into<String>,
        trace: Option<TraceContext>,
    ) -> Self {
        Self {
            identity: identity.into(),
            kind: TaskKind::Once {
                group: group.into(),
                payload: payload.into(),
                trace,
                max_archived_secs: None,
            },
        }
    }

    /// Set the archive grace override of a one-shot task. No effect on cron tasks.
    pub fn with_max_archived(mut self, secs: Option<u64>) -> Self {
        if let TaskKind::Once { max_archived_secs, .. } = &mut self.kind {
            *max_archived_secs = secs;
        }
        self
    }

    pub fn max_archived_secs(&self) -> Option<u64> {
        match &self.kind {
            TaskKind::Once { max_archived_secs, .. } => *max_archived_secs,
            TaskKind::Cron { .. } => None,
        }
    }

    pub fn group(&self) -> &str {
        match &self.kind {
            TaskKind::Cron { group, .. } | TaskKind::Once { group, .. } => group,
        }
    }

    pub fn payload(&self) -> &str {
        match &self.kind {
            TaskKind::Cron { payload, .. } | TaskKind::Once { payload, .. } => payload,
        }
    }

    pub fn trace(&self) -> Option<&TraceContext> {
        match &self.kind {
            TaskKind::Once { trace, .. } => trace.as_ref(),
            TaskKind::Cron { .. } => None,
        }
    }

    pub fn is_cron(&self) -> bool {
        matches!(self.kind, TaskKind::Cron { .. })
    }

    /// The handler-facing view of this task.
    pub fn to_payload(&self) -> TaskPayload {
        TaskPayload {
            group: self.group().to_string(),
            identity: self.identity.clone(),
            payload: self.payload().to_string(),
        }
    }
}

/// What a handler (or HTTP callback) receives for one execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskPayload {
    pub group: String,
    #[serde(rename = "uid")]
    pub identity: String,
    pub payload: String,
}
