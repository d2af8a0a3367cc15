//! Scheduler startup for `cadence run`.

use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use cadence_config::{Config, ConfigValidator, CronEntry};
use cadence_protocols::CronOptions;
use cadence_scheduler::Scheduler;
use cadence_workqueue::{
    DispatcherConfig, MemoryAdmissionLog, MemoryDispatcher, MemoryLockService, MemoryScheduleStore,
};

use crate::adapters::{LoggingHandler, cadence_dir};

/// Initialize tracing with console and file output.
///
/// Log files are written to ~/.cadence/logs/ with daily rotation.
pub(crate) fn init_tracing() -> Result<(), Box<dyn std::error::Error>> {
    let log_dir = cadence_dir().join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("cadence")
        .filename_suffix("log")
        .max_log_files(30)
        .build(&log_dir)?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // Dropping the guard stops the file writer.
    static GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
        std::sync::OnceLock::new();
    let _ = GUARD.set(guard);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true).with_ansi(true))
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    Ok(())
}

fn dispatcher_config(config: &Config) -> DispatcherConfig {
    DispatcherConfig {
        concurrency: config.workers.concurrency,
        poll_interval_ms: config.workers.poll_interval_ms,
        ..Default::default()
    }
}

fn cron_options(entry: &CronEntry) -> CronOptions {
    CronOptions {
        max_retry: entry.max_retry,
        timeout_secs: entry.timeout_secs,
        max_archived_secs: entry.max_archived_secs,
    }
}

/// Run an in-process deployment until Ctrl-C.
pub(crate) async fn run_server(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let validation = ConfigValidator::validate(&config)?;
    for warning in &validation.warnings {
        warn!(path = %warning.path, "{}", warning.message);
    }
    if !validation.is_valid() {
        for e in &validation.errors {
            error!(path = %e.path, "{}", e.message);
        }
        return Err("invalid configuration".into());
    }

    let dispatcher = Arc::new(MemoryDispatcher::new(dispatcher_config(&config)));
    let mut builder = Scheduler::builder(
        config.clone(),
        Arc::new(MemoryScheduleStore::new()),
        Arc::new(MemoryLockService::new()),
        dispatcher.clone(),
        Arc::new(MemoryAdmissionLog::new()),
    );
    match config.scheduler.callback_url.as_deref() {
        Some(url) if !url.is_empty() => info!(url = %url, "Delivering tasks to HTTP callback"),
        _ => builder = builder.handler(LoggingHandler),
    }
    let scheduler = builder.build();

    for entry in &config.cron {
        if let Err(e) = scheduler
            .cron(
                &entry.identity,
                &entry.group,
                &entry.payload,
                entry.expressions.clone(),
                cron_options(entry),
            )
            .await
        {
            error!(identity = %entry.identity, error = %e, "Failed to register cron task");
        }
    }

    let handle = scheduler.start();
    let pool = tokio::spawn(
        dispatcher
            .clone()
            .run(Arc::new(scheduler.processor()), handle.shutdown_token()),
    );

    info!(
        queue = %scheduler.queue(),
        definitions = config.cron.len(),
        workers = config.workers.concurrency,
        "Cadence running, press Ctrl-C to stop"
    );
    tokio::signal::ctrl_c().await?;

    info!("Shutting down");
    handle.shutdown().await;
    if let Err(e) = pool.await {
        warn!(error = %e, "Worker pool exited abnormally");
    }
    info!(processed = dispatcher.total_processed(), "Cadence stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatcher_config_follows_workers() {
        let mut config = Config::default();
        config.workers.concurrency = 3;
        config.workers.poll_interval_ms = 20;

        let dispatcher = dispatcher_config(&config);
        assert_eq!(dispatcher.concurrency, 3);
        assert_eq!(dispatcher.poll_interval_ms, 20);
        assert_eq!(dispatcher.retry_delay_ms, DispatcherConfig::default().retry_delay_ms);
    }

    #[test]
    fn test_cron_options_from_entry() {
        let config = cadence_config::ConfigLoader::load_str(
            r#"
[[cron]]
identity = "nightly"
expressions = ["0 3 * * *"]
timeout_secs = 120
"#,
        )
        .unwrap();

        let options = cron_options(&config.cron[0]);
        assert_eq!(options.timeout_secs, Some(120));
        assert_eq!(options.max_retry, None);
    }
}
