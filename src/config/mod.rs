//! # Console Configuration
//!
//! Typed configuration for the operation engine, the health probes and the
//! recovery procedure.
//!
//! ## Sources
//!
//! Values are layered, lowest precedence first:
//!
//! 1. Built-in defaults ([`ConsoleConfig::default`])
//! 2. An optional TOML file (`config/admin_console.toml`, or an explicit path)
//! 3. Environment variables prefixed `ADMIN_CONSOLE_`, with `__` between
//!    nested keys (`ADMIN_CONSOLE_RECOVERY__MAX_RETRIES=5`)
//!
//! ## Usage
//!
//! ```rust,no_run
//! use admin_console::config::ConsoleConfig;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ConsoleConfig::load()?;
//! println!("Recovery retries: {}", config.recovery.max_retries);
//! println!("Poll interval: {:?}", config.dispatch.poll_interval());
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{dispatch, health, millis, recovery, worker_pool};
use crate::recovery::ServiceDescriptor;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::{DEFAULT_CONFIG_FILE, ENV_PREFIX};

/// Root configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    pub worker_pool: WorkerPoolConfig,
    pub dispatch: DispatchConfig,
    pub health: HealthConfig,
    pub recovery: RecoveryConfig,
    /// Managed services, probed for health and restarted during recovery
    pub services: Vec<ServiceDescriptor>,
}

/// Background worker pool sizing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerPoolConfig {
    /// Units of work allowed to run at once; further submissions queue
    pub max_concurrency: usize,
    /// Blocking threads available to the pool's runtime
    ///
    /// Cancelling a unit of work frees its concurrency slot at once, but a
    /// blocking call that ignores cancellation keeps its thread until it
    /// returns. This must leave headroom above `max_concurrency` for such
    /// detached calls.
    pub max_blocking_threads: usize,
    pub thread_name: String,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            max_concurrency: worker_pool::DEFAULT_MAX_CONCURRENCY,
            max_blocking_threads: worker_pool::DEFAULT_MAX_BLOCKING_THREADS,
            thread_name: worker_pool::DEFAULT_THREAD_NAME.to_string(),
        }
    }
}

/// Presentation thread and completion polling
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub poll_interval_ms: u64,
    pub thread_name: String,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: dispatch::DEFAULT_POLL_INTERVAL_MS,
            thread_name: dispatch::DEFAULT_THREAD_NAME.to_string(),
        }
    }
}

impl DispatchConfig {
    pub fn poll_interval(&self) -> Duration {
        millis(self.poll_interval_ms)
    }
}

/// Free-space thresholds, as a percentage of the volume
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiskThresholds {
    pub warning_percent: f64,
    pub critical_percent: f64,
}

impl Default for DiskThresholds {
    fn default() -> Self {
        Self {
            warning_percent: health::DEFAULT_DISK_WARNING_PERCENT,
            critical_percent: health::DEFAULT_DISK_CRITICAL_PERCENT,
        }
    }
}

/// What the health probes inspect
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    pub database_instance: Option<String>,
    pub database_name: Option<String>,
    pub firewall_rules: Vec<String>,
    pub permission_paths: Vec<PathBuf>,
    pub disk_path: Option<PathBuf>,
    pub disk: DiskThresholds,
    pub certificates: Vec<String>,
    pub certificate_warning_days: i64,
    pub scheduled_tasks: Vec<String>,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            database_instance: None,
            database_name: None,
            firewall_rules: Vec::new(),
            permission_paths: Vec::new(),
            disk_path: None,
            disk: DiskThresholds::default(),
            certificates: Vec::new(),
            certificate_warning_days: health::DEFAULT_CERT_WARNING_DAYS,
            scheduled_tasks: Vec::new(),
        }
    }
}

/// Auto-recovery retry behavior
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    /// Start attempts per service before it is recorded as failed
    pub max_retries: u32,
    /// Pause between start attempts of the same service
    pub retry_delay_ms: u64,
    /// Passed to each start attempt
    pub start_timeout_ms: u64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            max_retries: recovery::DEFAULT_MAX_RETRIES,
            retry_delay_ms: recovery::DEFAULT_RETRY_DELAY_MS,
            start_timeout_ms: recovery::DEFAULT_START_TIMEOUT_MS,
        }
    }
}

impl RecoveryConfig {
    pub fn retry_delay(&self) -> Duration {
        millis(self.retry_delay_ms)
    }

    pub fn start_timeout(&self) -> Duration {
        millis(self.start_timeout_ms)
    }
}

impl ConsoleConfig {
    /// Check invariants the loaders cannot express through types
    pub fn validate(&self) -> ConfigResult<()> {
        if self.worker_pool.max_concurrency == 0 {
            return Err(ConfigurationError::invalid_value(
                "worker_pool.max_concurrency",
                self.worker_pool.max_concurrency,
                "must be greater than 0",
            ));
        }

        if self.worker_pool.max_blocking_threads < self.worker_pool.max_concurrency {
            return Err(ConfigurationError::invalid_value(
                "worker_pool.max_blocking_threads",
                self.worker_pool.max_blocking_threads,
                format!(
                    "must be at least max_concurrency ({})",
                    self.worker_pool.max_concurrency
                ),
            ));
        }

        if self.dispatch.poll_interval_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "dispatch.poll_interval_ms",
                self.dispatch.poll_interval_ms,
                "must be greater than 0",
            ));
        }

        if self.recovery.max_retries == 0 {
            return Err(ConfigurationError::invalid_value(
                "recovery.max_retries",
                self.recovery.max_retries,
                "must be at least 1",
            ));
        }

        let disk = &self.health.disk;
        for (field, value) in [
            ("health.disk.warning_percent", disk.warning_percent),
            ("health.disk.critical_percent", disk.critical_percent),
        ] {
            if !(0.0..=100.0).contains(&value) {
                return Err(ConfigurationError::invalid_value(
                    field,
                    value,
                    "must be between 0 and 100",
                ));
            }
        }
        if disk.critical_percent > disk.warning_percent {
            return Err(ConfigurationError::invalid_value(
                "health.disk.critical_percent",
                disk.critical_percent,
                format!(
                    "must not exceed warning_percent ({})",
                    disk.warning_percent
                ),
            ));
        }

        if self.health.certificate_warning_days < 0 {
            return Err(ConfigurationError::invalid_value(
                "health.certificate_warning_days",
                self.health.certificate_warning_days,
                "must not be negative",
            ));
        }

        let mut seen = HashSet::new();
        for service in &self.services {
            if service.name.trim().is_empty() {
                return Err(ConfigurationError::invalid_value(
                    "services.name",
                    &service.name,
                    "must not be empty",
                ));
            }
            if !seen.insert(service.name.to_ascii_lowercase()) {
                return Err(ConfigurationError::DuplicateService {
                    name: service.name.clone(),
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(name: &str, rank: u32) -> ServiceDescriptor {
        ServiceDescriptor::new(name, true, rank)
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = ConsoleConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.worker_pool.max_concurrency, 4);
        assert_eq!(config.dispatch.poll_interval(), Duration::from_millis(100));
        assert_eq!(config.recovery.max_retries, 3);
        assert_eq!(config.recovery.retry_delay(), Duration::from_secs(5));
        assert_eq!(config.health.disk.warning_percent, 15.0);
        assert_eq!(config.health.disk.critical_percent, 5.0);
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let mut config = ConsoleConfig::default();
        config.worker_pool.max_concurrency = 0;

        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            ConfigurationError::InvalidValue { ref field, .. } if field == "worker_pool.max_concurrency"
        ));
    }

    #[test]
    fn test_blocking_threads_below_concurrency_rejected() {
        let mut config = ConsoleConfig::default();
        config.worker_pool.max_concurrency = 8;
        config.worker_pool.max_blocking_threads = 4;

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("worker_pool.max_blocking_threads"));
    }

    #[test]
    fn test_zero_retries_rejected() {
        let mut config = ConsoleConfig::default();
        config.recovery.max_retries = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_inverted_disk_thresholds_rejected() {
        let mut config = ConsoleConfig::default();
        config.health.disk.warning_percent = 5.0;
        config.health.disk.critical_percent = 10.0;

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("health.disk.critical_percent"));
    }

    #[test]
    fn test_duplicate_service_names_rejected() {
        let config = ConsoleConfig {
            services: vec![service("MSSQLSERVER", 1), service("mssqlserver", 2)],
            ..Default::default()
        };

        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigurationError::DuplicateService { ref name } if name == "mssqlserver"));
    }

}
