//! Dispatcher-side task state.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{TaskEnvelope, Timing};

/// Lifecycle state of a task inside the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Waiting for its processing time.
    Scheduled,
    /// Due, waiting for a worker.
    Pending,
    /// Currently executing.
    Active,
    /// Failed, waiting for the next attempt.
    Retry,
    /// Retry budget exhausted.
    Archived,
    /// Finished, kept until its retention expires.
    Completed,
}

impl TaskState {
    pub fn is_active(&self) -> bool {
        matches!(self, TaskState::Active)
    }
}

/// Snapshot of one task returned by `Dispatcher::info` and archive listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskInfo {
    pub task: TaskEnvelope,
    pub queue: String,
    pub state: TaskState,
    pub max_retry: u32,
    pub retried: u32,
    pub last_failed_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub next_process_at: Option<DateTime<Utc>>,
}

impl TaskInfo {
    /// Archived entries that still have retry budget are not really exhausted.
    pub fn has_retry_budget(&self) -> bool {
        self.last_failed_at.is_some() && self.retried < self.max_retry
    }
}

/// Options accompanying an enqueue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnqueueOptions {
    pub queue: String,
    pub max_retry: u32,
    pub timeout: Duration,
    /// How long a completed task is kept (and so blocks its identity).
    pub retention: Option<Duration>,
    pub timing: Timing,
}

impl EnqueueOptions {
    pub fn new(queue: impl Into<String>) -> Self {
        Self {
            queue: queue.into(),
            max_retry: 0,
            timeout: Duration::from_secs(60),
            retention: None,
            timing: Timing::Default,
        }
    }
}

/// One page of a listing, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub number: usize,
    pub size: usize,
}

impl Page {
    pub fn first(size: usize) -> Self {
        Self { number: 1, size }
    }

    pub fn next(self) -> Self {
        Self {
            number: self.number + 1,
            size: self.size,
        }
    }

    pub fn offset(&self) -> usize {
        self.number.saturating_sub(1) * self.size
    }
}
