//! # Probe Collaborators
//!
//! Narrow interfaces the health probe set and the recovery orchestrator call
//! into. Concrete implementations live with the platform integration (see
//! [`crate::platform`]) or in tests.
//!
//! Everything except [`ServiceControl`] may fail with an `anyhow::Error`; the
//! probe set reports such failures as warnings instead of propagating them.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Service control
// =============================================================================

/// Start and inspect named services
///
/// Infallible by contract: an unknown service, or a control channel that is
/// unavailable, reads as "not running" and a start attempt on it returns false.
pub trait ServiceControl: Send + Sync {
    fn is_running(&self, name: &str) -> bool;

    /// Attempt to start `name`, waiting up to `timeout` for it to come up
    fn start(&self, name: &str, timeout: Duration) -> bool;
}

// =============================================================================
// Database, firewall, permissions
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConnectionStatus {
    pub connected: bool,
    pub database_exists: bool,
    pub message: String,
}

pub trait DatabaseProbe: Send + Sync {
    fn test_connection(&self, instance: &str) -> anyhow::Result<DatabaseConnectionStatus>;
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FirewallRuleCheck {
    pub all_present: bool,
    pub missing: Vec<String>,
}

pub trait FirewallProbe: Send + Sync {
    fn all_rules_present(&self, rules: &[String]) -> anyhow::Result<FirewallRuleCheck>;
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PermissionCheck {
    pub all_correct: bool,
    pub missing: Vec<String>,
}

pub trait PermissionProbe: Send + Sync {
    fn all_permissions_present(&self, path: &std::path::Path) -> anyhow::Result<PermissionCheck>;
}

// =============================================================================
// Disk, certificates, scheduled tasks
// =============================================================================

/// Severity reported by the threshold-style probes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeSeverity {
    Ok,
    Warning,
    Critical,
}

/// Uniform reading returned by the disk, certificate and scheduled-task probes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeReading {
    pub severity: ProbeSeverity,
    pub message: Option<String>,
}

impl ProbeReading {
    pub fn ok() -> Self {
        Self {
            severity: ProbeSeverity::Ok,
            message: None,
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: ProbeSeverity::Warning,
            message: Some(message.into()),
        }
    }

    pub fn critical(message: impl Into<String>) -> Self {
        Self {
            severity: ProbeSeverity::Critical,
            message: Some(message.into()),
        }
    }
}

/// Reports raw usage; the probe set applies the configured thresholds
pub trait DiskSpaceProbe: Send + Sync {
    fn usage(&self, path: &std::path::Path) -> anyhow::Result<DiskUsage>;
}

/// Reports the expiry of every requested subject it can find
///
/// Subjects missing from the returned list are reported as not found.
pub trait CertificateProbe: Send + Sync {
    fn expiries(&self, subjects: &[String]) -> anyhow::Result<Vec<CertificateExpiry>>;
}

/// Reports the state of every requested task it knows about
///
/// Tasks missing from the returned list are treated as not configured.
pub trait ScheduledTaskProbe: Send + Sync {
    fn task_states(&self, tasks: &[String]) -> anyhow::Result<Vec<ScheduledTaskState>>;
}

// =============================================================================
// Threshold classification
// =============================================================================

/// Free space on a volume
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiskUsage {
    pub total_bytes: u64,
    pub free_bytes: u64,
}

impl DiskUsage {
    pub fn free_percent(&self) -> f64 {
        if self.total_bytes == 0 {
            return 0.0;
        }
        self.free_bytes as f64 * 100.0 / self.total_bytes as f64
    }

    /// Critical below `critical_percent` free, Warning below `warning_percent`
    pub fn classify(&self, path: &str, warning_percent: f64, critical_percent: f64) -> ProbeReading {
        let free = self.free_percent();
        if free < critical_percent {
            ProbeReading::critical(format!(
                "Disk space critically low on {path}: {free:.1}% free"
            ))
        } else if free < warning_percent {
            ProbeReading::warning(format!("Disk space low on {path}: {free:.1}% free"))
        } else {
            ProbeReading::ok()
        }
    }
}

/// Expiry date of one certificate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateExpiry {
    pub subject: String,
    pub not_after: DateTime<Utc>,
}

impl CertificateExpiry {
    /// Critical once expired, Warning within `warning_days` of expiry
    pub fn classify(&self, now: DateTime<Utc>, warning_days: i64) -> ProbeReading {
        let remaining = self.not_after - now;
        if remaining <= chrono::Duration::zero() {
            ProbeReading::critical(format!("Certificate '{}' has expired", self.subject))
        } else if remaining <= chrono::Duration::days(warning_days) {
            ProbeReading::warning(format!(
                "Certificate '{}' expires in {} days",
                self.subject,
                remaining.num_days()
            ))
        } else {
            ProbeReading::ok()
        }
    }
}

/// Observed state of one scheduled task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledTaskState {
    pub name: String,
    pub configured: bool,
    pub missed_runs: u32,
}

impl ScheduledTaskState {
    /// Missing or missed runs are both non-blocking conditions
    pub fn classify(&self) -> ProbeReading {
        if !self.configured {
            ProbeReading::warning(format!("Scheduled task '{}' is not configured", self.name))
        } else if self.missed_runs > 0 {
            ProbeReading::warning(format!(
                "Scheduled task '{}' missed {} run(s)",
                self.name, self.missed_runs
            ))
        } else {
            ProbeReading::ok()
        }
    }
}

/// Combine per-item readings into one: worst severity wins, messages joined
pub fn combine_readings(readings: impl IntoIterator<Item = ProbeReading>) -> ProbeReading {
    let mut severity = ProbeSeverity::Ok;
    let mut messages = Vec::new();
    for reading in readings {
        severity = severity.max(reading.severity);
        messages.extend(reading.message);
    }

    ProbeReading {
        severity,
        message: (!messages.is_empty()).then(|| messages.join("; ")),
    }
}
