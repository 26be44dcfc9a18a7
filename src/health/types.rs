//! # Health Types
//!
//! Severity scale, per-probe results and the aggregated health report.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Ordered severity scale: `Healthy < Degraded < Unhealthy`
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    #[default]
    Healthy,
    /// Non-blocking conditions present
    Degraded,
    /// At least one blocking condition present
    Unhealthy,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Unhealthy => "unhealthy",
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which check produced a [`ProbeResult`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeKind {
    Service,
    Database,
    Firewall,
    Permissions,
    DiskSpace,
    Certificates,
    ScheduledTasks,
}

impl ProbeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeKind::Service => "service",
            ProbeKind::Database => "database",
            ProbeKind::Firewall => "firewall",
            ProbeKind::Permissions => "permissions",
            ProbeKind::DiskSpace => "disk_space",
            ProbeKind::Certificates => "certificates",
            ProbeKind::ScheduledTasks => "scheduled_tasks",
        }
    }
}

impl fmt::Display for ProbeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one probe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeResult {
    pub name: String,
    pub kind: ProbeKind,
    pub status: HealthStatus,
    /// Blocking conditions
    pub issues: Vec<String>,
    /// Non-blocking conditions
    pub warnings: Vec<String>,
}

impl ProbeResult {
    pub fn healthy(name: impl Into<String>, kind: ProbeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            status: HealthStatus::Healthy,
            issues: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn issue(name: impl Into<String>, kind: ProbeKind, message: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Unhealthy,
            issues: vec![message.into()],
            ..Self::healthy(name, kind)
        }
    }

    pub fn warning(name: impl Into<String>, kind: ProbeKind, message: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Degraded,
            warnings: vec![message.into()],
            ..Self::healthy(name, kind)
        }
    }

    /// A probe that errored or panicked; never blocking on its own
    pub fn failed(name: impl Into<String>, kind: ProbeKind, reason: impl fmt::Display) -> Self {
        let name = name.into();
        let message = format!("{name} check failed: {reason}");
        Self::warning(name, kind, message)
    }

    /// Key of this result in [`HealthCheckResult::probes`], e.g. `service:W3SVC`
    pub fn key(&self) -> String {
        probe_key(self.kind, &self.name)
    }

    #[must_use]
    pub fn is_blocking(&self) -> bool {
        self.status == HealthStatus::Unhealthy || !self.issues.is_empty()
    }

    #[must_use]
    pub fn is_warning(&self) -> bool {
        self.status == HealthStatus::Degraded || !self.warnings.is_empty()
    }
}

pub(crate) fn probe_key(kind: ProbeKind, name: &str) -> String {
    format!("{kind}:{name}")
}

/// Aggregated health report; produced by
/// [`HealthAggregator`](super::HealthAggregator) and never mutated afterwards
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheckResult {
    overall: HealthStatus,
    probes: BTreeMap<String, ProbeResult>,
    issues: Vec<String>,
    warnings: Vec<String>,
    checked_at: DateTime<Utc>,
}

impl HealthCheckResult {
    pub(crate) fn new(
        overall: HealthStatus,
        probes: BTreeMap<String, ProbeResult>,
        issues: Vec<String>,
        warnings: Vec<String>,
    ) -> Self {
        Self {
            overall,
            probes,
            issues,
            warnings,
            checked_at: Utc::now(),
        }
    }

    pub fn overall(&self) -> HealthStatus {
        self.overall
    }

    /// Per-probe results keyed by `<kind>:<name>`
    pub fn probes(&self) -> &BTreeMap<String, ProbeResult> {
        &self.probes
    }

    pub fn probe(&self, kind: ProbeKind, name: &str) -> Option<&ProbeResult> {
        self.probes.get(&probe_key(kind, name))
    }

    pub fn issues(&self) -> &[String] {
        &self.issues
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn checked_at(&self) -> DateTime<Utc> {
        self.checked_at
    }

    pub fn is_healthy(&self) -> bool {
        self.overall == HealthStatus::Healthy
    }

    /// Only blocking conditions warrant a recovery run
    pub fn needs_recovery(&self) -> bool {
        self.overall == HealthStatus::Unhealthy
    }

    /// One-line description for status bars and CLI output
    pub fn summary(&self) -> String {
        match self.overall {
            HealthStatus::Healthy => "System is healthy".to_string(),
            HealthStatus::Degraded => {
                format!("System is degraded: {} warning(s)", self.warnings.len())
            }
            HealthStatus::Unhealthy => format!(
                "System is unhealthy: {} issue(s), {} warning(s)",
                self.issues.len(),
                self.warnings.len()
            ),
        }
    }
}
