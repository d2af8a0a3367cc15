//! Configuration validation.

use std::collections::HashSet;

use crate::error::ConfigError;
use crate::schema::Config;

/// Validation result.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }
}

/// A validation error.
#[derive(Debug)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// A validation warning.
#[derive(Debug)]
pub struct ValidationWarning {
    pub path: String,
    pub message: String,
}

impl ValidationWarning {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Configuration validator.
///
/// Checks structural limits only. Cron expressions are parsed by the
/// scheduler when the entries are registered.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration.
    pub fn validate(config: &Config) -> Result<ValidationResult, ConfigError> {
        let mut result = ValidationResult::default();

        Self::validate_scheduler(config, &mut result);
        Self::validate_lock(config, &mut result);
        Self::validate_buffer(config, &mut result);
        Self::validate_workers(config, &mut result);
        Self::validate_cron(config, &mut result);

        Ok(result)
    }

    fn validate_scheduler(config: &Config, result: &mut ValidationResult) {
        let scheduler = &config.scheduler;

        if scheduler.queue.is_empty() {
            result.add_error(ValidationError::new(
                "scheduler.queue",
                "Queue name cannot be empty",
            ));
        }

        if scheduler.period_key.is_empty() {
            result.add_error(ValidationError::new(
                "scheduler.period_key",
                "Period key cannot be empty",
            ));
        }

        if scheduler.scan_interval_ms == 0 {
            result.add_error(ValidationError::new(
                "scheduler.scan_interval_ms",
                "scan_interval_ms must be greater than 0",
            ));
        }

        if scheduler.timeout_secs == 0 {
            result.add_error(ValidationError::new(
                "scheduler.timeout_secs",
                "timeout_secs must be greater than 0",
            ));
        }

        if scheduler.clear_archived_secs == 0 {
            result.add_warning(ValidationWarning::new(
                "scheduler.clear_archived_secs",
                "Archive sweeper is disabled, exhausted tasks will never be cleared",
            ));
        }

        if let Some(url) = &scheduler.callback_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                result.add_error(ValidationError::new(
                    "scheduler.callback_url",
                    format!("Callback URL must be http(s): {}", url),
                ));
            }
        }
    }

    fn validate_lock(config: &Config, result: &mut ValidationResult) {
        if config.lock.ttl_secs == 0 {
            result.add_error(ValidationError::new(
                "lock.ttl_secs",
                "ttl_secs must be greater than 0",
            ));
        }

        if config.lock.retry_interval_ms == 0 && config.lock.retry_count > 0 {
            result.add_error(ValidationError::new(
                "lock.retry_interval_ms",
                "retry_interval_ms must be greater than 0 when retries are enabled",
            ));
        }
    }

    fn validate_buffer(config: &Config, result: &mut ValidationResult) {
        let buffer = &config.buffer;

        if buffer.max_count == 0 {
            result.add_error(ValidationError::new(
                "buffer.max_count",
                "max_count must be greater than 0",
            ));
        }

        if buffer.rate_window_secs == 0 {
            result.add_error(ValidationError::new(
                "buffer.rate_window_secs",
                "rate_window_secs must be greater than 0",
            ));
        }

        if buffer.idle_interval_ms == 0 || buffer.backoff_interval_ms == 0 {
            result.add_error(ValidationError::new(
                "buffer",
                "Drain intervals must be greater than 0",
            ));
        }

        if buffer.backoff_interval_ms < buffer.idle_interval_ms {
            result.add_warning(ValidationWarning::new(
                "buffer.backoff_interval_ms",
                "Back-off interval is shorter than the idle interval",
            ));
        }
    }

    fn validate_workers(config: &Config, result: &mut ValidationResult) {
        if config.workers.concurrency == 0 {
            result.add_error(ValidationError::new(
                "workers.concurrency",
                "concurrency must be greater than 0",
            ));
        }

        if config.workers.poll_interval_ms == 0 {
            result.add_error(ValidationError::new(
                "workers.poll_interval_ms",
                "poll_interval_ms must be greater than 0",
            ));
        }
    }

    fn validate_cron(config: &Config, result: &mut ValidationResult) {
        let mut seen = HashSet::new();

        for (i, entry) in config.cron.iter().enumerate() {
            let path = format!("cron[{}]", i);

            if entry.identity.is_empty() {
                result.add_error(ValidationError::new(
                    format!("{}.identity", path),
                    "Identity cannot be empty",
                ));
            } else if !seen.insert(entry.identity.as_str()) {
                result.add_error(ValidationError::new(
                    format!("{}.identity", path),
                    format!("Duplicate identity: {}", entry.identity),
                ));
            }

            if entry.expressions.is_empty() {
                result.add_error(ValidationError::new(
                    format!("{}.expressions", path),
                    "At least one expression is required",
                ));
            }
        }
    }
}
