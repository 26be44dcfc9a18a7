//! # Structured Logging Module
//!
//! Environment-aware structured logging: a human-readable console layer,
//! plus an optional JSON file layer for post-mortem analysis of operation
//! and recovery runs.

use std::fs;
use std::path::PathBuf;
use std::process;
use std::sync::OnceLock;

use chrono::Utc;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Holds the file writer's guard for the life of the process
static LOGGER_INITIALIZED: OnceLock<Option<WorkerGuard>> = OnceLock::new();

/// Logging setup chosen by the binary
#[derive(Debug, Clone, Default)]
pub struct LoggingOptions {
    /// Directory for JSON log files; console output only when `None`
    pub log_dir: Option<PathBuf>,
    /// 0 keeps the environment default, 1 = debug, 2+ = trace
    pub verbosity: u8,
}

/// Initialize console logging with the environment's default level
pub fn init_structured_logging() {
    init_with(&LoggingOptions::default());
}

/// Initialize logging once per process; later calls are no-ops
///
/// Never panics when another global subscriber is already installed.
pub fn init_with(options: &LoggingOptions) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let log_level = get_log_level(&environment, options.verbosity);
        let filter = || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_level));

        let console_layer = fmt::layer()
            .with_target(true)
            .with_thread_names(true)
            .with_level(true)
            .with_writer(std::io::stderr)
            .with_filter(filter());

        let (file_layer, guard, log_path) = match open_log_file(options, &environment) {
            Some((writer, guard, path)) => {
                let layer = fmt::layer()
                    .with_writer(writer)
                    .with_target(true)
                    .with_thread_names(true)
                    .with_ansi(false)
                    .json()
                    .with_filter(filter());
                (Some(layer), Some(guard), Some(path))
            }
            None => (None, None, None),
        };

        let initialized = tracing_subscriber::registry()
            .with(console_layer)
            .with(file_layer)
            .try_init()
            .is_ok();

        if !initialized {
            tracing::debug!("Global tracing subscriber already initialized - continuing with existing subscriber");
        }

        tracing::info!(
            pid = process::id(),
            environment = %environment,
            level = %log_level,
            log_file = %log_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "none".to_string()),
            "Structured logging initialized"
        );

        guard
    });
}

fn open_log_file(
    options: &LoggingOptions,
    environment: &str,
) -> Option<(tracing_appender::non_blocking::NonBlocking, WorkerGuard, PathBuf)> {
    let log_dir = options.log_dir.as_ref()?;
    if let Err(error) = fs::create_dir_all(log_dir) {
        eprintln!(
            "Cannot create log directory {}: {error}; logging to console only",
            log_dir.display()
        );
        return None;
    }

    let file_name = format!(
        "{}.{}.{}.log",
        environment,
        process::id(),
        Utc::now().format("%Y%m%d_%H%M%S")
    );
    let appender = tracing_appender::rolling::never(log_dir, &file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    Some((writer, guard, log_dir.join(file_name)))
}

/// Get current environment from environment variables
fn get_environment() -> String {
    std::env::var("ADMIN_CONSOLE_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// Get log level based on environment and requested verbosity
fn get_log_level(environment: &str, verbosity: u8) -> String {
    let level = match (verbosity, environment) {
        (0, "production") => "info",
        (0, _) | (1, _) => "debug",
        _ => "trace",
    };
    level.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_mapping() {
        assert_eq!(get_log_level("test", 0), "debug");
        assert_eq!(get_log_level("development", 0), "debug");
        assert_eq!(get_log_level("production", 0), "info");
        assert_eq!(get_log_level("production", 1), "debug");
        assert_eq!(get_log_level("production", 3), "trace");
    }

    #[test]
    fn test_init_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let options = LoggingOptions {
            log_dir: Some(dir.path().join("log")),
            verbosity: 0,
        };
        init_with(&options);
        init_with(&options);
        init_structured_logging();
    }
}
