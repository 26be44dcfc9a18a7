//! # Health Module
//!
//! Independent probes, their collaborator interfaces, and the aggregation
//! rule that turns probe results into one overall status.
//!
//! ## Components
//!
//! - [`probes`]: collaborator traits (`ServiceControl`, `DatabaseProbe`, ...)
//!   and threshold classifiers for probe implementations
//! - [`probe_set`]: runs the wired probes, isolating their failures
//! - [`aggregator`]: applies the Unhealthy > Degraded > Healthy precedence
//! - [`types`]: `HealthStatus`, `ProbeResult`, `HealthCheckResult`

pub mod aggregator;
pub mod probe_set;
pub mod probes;
pub mod types;

pub use aggregator::HealthAggregator;
pub use probe_set::HealthProbeSet;
pub use probes::{
    CertificateExpiry, CertificateProbe, DatabaseConnectionStatus, DatabaseProbe, DiskSpaceProbe,
    DiskUsage, FirewallProbe, FirewallRuleCheck, PermissionCheck, PermissionProbe, ProbeReading,
    ProbeSeverity, ScheduledTaskProbe, ScheduledTaskState, ServiceControl,
};
pub use types::{HealthCheckResult, HealthStatus, ProbeKind, ProbeResult};
