//! Configuration schema definitions.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub lock: LockConfig,

    #[serde(default)]
    pub buffer: BufferConfig,

    #[serde(default)]
    pub workers: WorkersConfig,

    /// Recurring tasks registered at startup.
    #[serde(default)]
    pub cron: Vec<CronEntry>,
}

/// Scheduler configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Dispatcher queue every task is enqueued into.
    #[serde(default = "default_queue")]
    pub queue: String,

    /// Suffix of the store namespace holding cron definitions.
    #[serde(default = "default_period_key")]
    pub period_key: String,

    /// How long a completed one-shot task is kept before it may be re-admitted.
    #[serde(default = "default_retention_secs")]
    pub retention_secs: u64,

    #[serde(default = "default_max_retry")]
    pub max_retry: u32,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_scan_interval_ms")]
    pub scan_interval_ms: u64,

    /// Archive sweep period. `0` disables the sweeper.
    #[serde(default = "default_clear_archived_secs")]
    pub clear_archived_secs: u64,

    /// Grace window for archived one-shot tasks. `0` keeps the built-in default.
    #[serde(default)]
    pub max_archived_secs: u64,

    /// Endpoint notified with the task payload when no handler is installed.
    #[serde(default)]
    pub callback_url: Option<String>,
}

impl SchedulerConfig {
    /// Store namespace of the cron definitions, `"{queue}.{period_key}"`.
    pub fn period_namespace(&self) -> String {
        format!("{}.{}", self.queue, self.period_key)
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_millis(self.scan_interval_ms)
    }

    pub fn clear_archived_interval(&self) -> Option<Duration> {
        (self.clear_archived_secs > 0).then(|| Duration::from_secs(self.clear_archived_secs))
    }

    pub fn max_archived(&self) -> Option<Duration> {
        (self.max_archived_secs > 0).then(|| Duration::from_secs(self.max_archived_secs))
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            queue: default_queue(),
            period_key: default_period_key(),
            retention_secs: default_retention_secs(),
            max_retry: default_max_retry(),
            timeout_secs: default_timeout_secs(),
            scan_interval_ms: default_scan_interval_ms(),
            clear_archived_secs: default_clear_archived_secs(),
            max_archived_secs: 0,
            callback_url: None,
        }
    }
}

fn default_queue() -> String {
    "task".to_string()
}

fn default_period_key() -> String {
    "period".to_string()
}

fn default_retention_secs() -> u64 {
    60
}

fn default_max_retry() -> u32 {
    3
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_scan_interval_ms() -> u64 {
    1000
}

fn default_clear_archived_secs() -> u64 {
    300
}

/// Lease acquisition configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockConfig {
    #[serde(default = "default_lock_ttl_secs")]
    pub ttl_secs: u64,

    #[serde(default = "default_lock_retry_count")]
    pub retry_count: u32,

    #[serde(default = "default_lock_retry_interval_ms")]
    pub retry_interval_ms: u64,
}

impl LockConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_lock_ttl_secs(),
            retry_count: default_lock_retry_count(),
            retry_interval_ms: default_lock_retry_interval_ms(),
        }
    }
}

fn default_lock_ttl_secs() -> u64 {
    60
}

fn default_lock_retry_count() -> u32 {
    40
}

fn default_lock_retry_interval_ms() -> u64 {
    25
}

/// Admission buffer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BufferConfig {
    /// Entries retained in the buffer and read per drain cycle.
    #[serde(default = "default_buffer_max_count")]
    pub max_count: usize,

    /// Request rate above which the drainer backs off.
    #[serde(default = "default_buffer_max_rps")]
    pub max_rps: u64,

    #[serde(default = "default_rate_window_secs")]
    pub rate_window_secs: u64,

    #[serde(default = "default_idle_interval_ms")]
    pub idle_interval_ms: u64,

    #[serde(default = "default_backoff_interval_ms")]
    pub backoff_interval_ms: u64,
}

impl BufferConfig {
    pub fn rate_window(&self) -> Duration {
        Duration::from_secs(self.rate_window_secs)
    }

    pub fn idle_interval(&self) -> Duration {
        Duration::from_millis(self.idle_interval_ms)
    }

    pub fn backoff_interval(&self) -> Duration {
        Duration::from_millis(self.backoff_interval_ms)
    }
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            max_count: default_buffer_max_count(),
            max_rps: default_buffer_max_rps(),
            rate_window_secs: default_rate_window_secs(),
            idle_interval_ms: default_idle_interval_ms(),
            backoff_interval_ms: default_backoff_interval_ms(),
        }
    }
}

fn default_buffer_max_count() -> usize {
    5000
}

fn default_buffer_max_rps() -> u64 {
    100
}

fn default_rate_window_secs() -> u64 {
    30
}

fn default_idle_interval_ms() -> u64 {
    3000
}

fn default_backoff_interval_ms() -> u64 {
    10_000
}

/// Worker pool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkersConfig {
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl WorkersConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for WorkersConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

fn default_concurrency() -> usize {
    10
}

fn default_poll_interval_ms() -> u64 {
    100
}

/// A recurring task declared in the configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CronEntry {
    pub identity: String,

    #[serde(default = "default_cron_group")]
    pub group: String,

    #[serde(default)]
    pub payload: String,

    pub expressions: Vec<String>,

    #[serde(default)]
    pub max_retry: Option<u32>,

    #[serde(default)]
    pub timeout_secs: Option<u64>,

    #[serde(default)]
    pub max_archived_secs: Option<u64>,
}

fn default_cron_group() -> String {
    "group".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.scheduler.queue, "task");
        assert_eq!(config.scheduler.period_key, "period");
        assert_eq!(config.scheduler.retention_secs, 60);
        assert_eq!(config.scheduler.max_retry, 3);
        assert_eq!(config.scheduler.timeout_secs, 10);
        assert_eq!(config.lock.ttl_secs, 60);
        assert_eq!(config.lock.retry_count, 40);
        assert_eq!(config.lock.retry_interval_ms, 25);
        assert_eq!(config.buffer.max_count, 5000);
        assert_eq!(config.buffer.max_rps, 100);
        assert_eq!(config.workers.concurrency, 10);
        assert!(config.cron.is_empty());
    }

    #[test]
    fn test_duration_helpers() {
        let config = Config::default();
        assert_eq!(config.scheduler.scan_interval(), Duration::from_secs(1));
        assert_eq!(config.lock.retry_interval(), Duration::from_millis(25));
        assert_eq!(config.buffer.backoff_interval(), Duration::from_secs(10));
        assert_eq!(
            config.scheduler.clear_archived_interval(),
            Some(Duration::from_secs(300))
        );
        assert_eq!(config.scheduler.max_archived(), None);
    }

    #[test]
    fn test_sweeper_disabled_by_zero() {
        let scheduler = SchedulerConfig {
            clear_archived_secs: 0,
            ..Default::default()
        };
        assert!(scheduler.clear_archived_interval().is_none());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        assert!(toml_str.contains("queue = \"task\""));
        assert!(toml_str.contains("[lock]"));
    }
}
