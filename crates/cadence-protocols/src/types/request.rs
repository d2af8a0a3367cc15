//! One-shot admission requests.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::TraceContext;

/// When a one-shot task should run.
///
/// Exactly one timing mode can be in effect, which the enum enforces.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "value", rename_all = "snake_case")]
pub enum Timing {
    /// Let the dispatcher decide (processed as soon as a worker is free).
    #[default]
    Default,
    At(DateTime<Utc>),
    In(Duration),
    Immediate,
}

impl Timing {
    /// Resolve to an absolute processing time, if the mode implies one.
    pub fn process_at(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Timing::Default => None,
            Timing::At(at) => Some(*at),
            Timing::In(delay) => {
                Some(now + chrono::Duration::from_std(*delay).unwrap_or(chrono::Duration::zero()))
            }
            Timing::Immediate => Some(now),
        }
    }
}

/// A request to run a task once under a caller-chosen identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnceRequest {
    pub identity: String,
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub payload: String,
    #[serde(default)]
    pub timing: Timing,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retention_secs: Option<u64>,
    /// Replace a queued (not yet running) instance with the same identity.
    #[serde(default)]
    pub replace: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retry: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_archived_secs: Option<u64>,
    /// Caller's trace. Admission starts a fresh one when unset.
    #[serde(skip)]
    pub trace: Option<TraceContext>,
}

impl OnceRequest {
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            group: "group".to_string(),
            payload: String::new(),
            timing: Timing::Default,
            retention_secs: None,
            replace: false,
            max_retry: None,
            timeout_secs: None,
            max_archived_secs: None,
            trace: None,
        }
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = group.into();
        self
    }

    pub fn with_payload(mut self, payload: impl Into<String>) -> Self {
        self.payload = payload.into();
        self
    }

    pub fn schedule_at(mut self, at: DateTime<Utc>) -> Self {
        self.timing = Timing::At(at);
        self
    }

    pub fn schedule_in(mut self, delay: Duration) -> Self {
        self.timing = Timing::In(delay);
        self
    }

    pub fn immediate(mut self) -> Self {
        self.timing = Timing::Immediate;
        self
    }

    pub fn with_retention(mut self, secs: u64) -> Self {
        if secs > 0 {
            self.retention_secs = Some(secs);
        }
        self
    }

    pub fn replace(mut self, replace: bool) -> Self {
        self.replace = replace;
        self
    }

    pub fn with_max_retry(mut self, count: u32) -> Self {
        self.max_retry = Some(count);
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        if secs > 0 {
            self.timeout_secs = Some(secs);
        }
        self
    }

    pub fn with_max_archived(mut self, secs: u64) -> Self {
        if secs > 0 {
            self.max_archived_secs = Some(secs);
        }
        self
    }

    /// Continue the caller's trace instead of starting a new one.
    pub fn with_trace(mut self, trace: TraceContext) -> Self {
        self.trace = Some(trace);
        self
    }
}

/// An admission buffer entry: the request plus the caller's trace context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferedAdmission {
    pub request: OnceRequest,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace: Option<TraceContext>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_builder_timing_is_exclusive() {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        let req = OnceRequest::new("job")
            .schedule_in(Duration::from_secs(30))
            .schedule_at(at);
        assert_eq!(req.timing, Timing::At(at));

        let req = req.immediate();
        assert_eq!(req.timing, Timing::Immediate);
    }

    #[test]
    fn test_zero_overrides_are_ignored() {
        let req = OnceRequest::new("job")
            .with_retention(0)
            .with_timeout(0)
            .with_max_archived(0);
        assert!(req.retention_secs.is_none());
        assert!(req.timeout_secs.is_none());
        assert!(req.max_archived_secs.is_none());
    }

    #[test]
    fn test_process_at() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        assert_eq!(Timing::Default.process_at(now), None);
        assert_eq!(Timing::Immediate.process_at(now), Some(now));
        assert_eq!(
            Timing::In(Duration::from_secs(90)).process_at(now),
            Some(Utc.with_ymd_and_hms(2026, 3, 1, 12, 1, 30).unwrap())
        );
    }

    #[test]
    fn test_buffered_admission_json() {
        let admission = BufferedAdmission {
            request: OnceRequest::new("job").with_payload("x").replace(true),
            trace: Some(TraceContext {
                trace_id: "t".to_string(),
                span_id: "s".to_string(),
            }),
        };
        let json = serde_json::to_string(&admission).unwrap();
        let back: BufferedAdmission = serde_json::from_str(&json).unwrap();
        assert_eq!(back, admission);
    }

    #[test]
    fn test_request_trace_is_not_serialized() {
        let trace = TraceContext::new();
        let req = OnceRequest::new("job").with_trace(trace.clone());
        assert_eq!(req.trace, Some(trace));

        let json = serde_json::to_value(&req).unwrap();
        assert!(json.get("trace").is_none());
        let back: OnceRequest = serde_json::from_value(json).unwrap();
        assert!(back.trace.is_none());
    }
}
