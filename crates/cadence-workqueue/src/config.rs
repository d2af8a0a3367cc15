//! Dispatcher configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Worker pool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatcherConfig {
    /// Maximum number of concurrent executions.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// How often the pool looks for due tasks when idle.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Delay before a failed task is attempted again.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl DispatcherConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

fn default_concurrency() -> usize {
    10
}

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_retry_delay_ms() -> u64 {
    5000
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            poll_interval_ms: default_poll_interval_ms(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}
