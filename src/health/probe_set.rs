//! # Health Probe Set
//!
//! Runs every wired probe and turns its collaborator's answer into a
//! [`ProbeResult`]. Probes run sequentially on the calling thread, which is
//! always a worker-pool unit of work when invoked through the console.
//!
//! A probe whose collaborator errors or panics is reported as a Warning
//! (`"<probe> check failed: <reason>"`) so that one flaky check cannot force
//! the system Unhealthy. Probes that are not wired, or that have nothing
//! configured to inspect, are skipped and do not appear in the report.

use std::convert::Infallible;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};

use super::aggregator::HealthAggregator;
use super::probes::{
    combine_readings, CertificateExpiry, CertificateProbe, DatabaseProbe, DiskSpaceProbe,
    FirewallProbe, PermissionProbe, ProbeReading, ProbeSeverity, ScheduledTaskProbe,
    ScheduledTaskState, ServiceControl,
};
use super::types::{HealthCheckResult, ProbeKind, ProbeResult};
use crate::config::HealthConfig;
use crate::execution::{panic_message, WorkContext, WorkError};
use crate::recovery::ServiceDescriptor;

const DATABASE: &str = "Database";
const FIREWALL: &str = "Firewall";
const DISK_SPACE: &str = "Disk space";
const CERTIFICATES: &str = "Certificates";
const SCHEDULED_TASKS: &str = "Scheduled tasks";

/// The collection of probes for one deployment
#[derive(Clone)]
pub struct HealthProbeSet {
    services: Arc<dyn ServiceControl>,
    descriptors: Vec<ServiceDescriptor>,
    config: HealthConfig,
    database: Option<Arc<dyn DatabaseProbe>>,
    firewall: Option<Arc<dyn FirewallProbe>>,
    permissions: Option<Arc<dyn PermissionProbe>>,
    disk: Option<Arc<dyn DiskSpaceProbe>>,
    certificates: Option<Arc<dyn CertificateProbe>>,
    scheduled_tasks: Option<Arc<dyn ScheduledTaskProbe>>,
}

impl fmt::Debug for HealthProbeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HealthProbeSet")
            .field("services", &self.descriptors.len())
            .field("database", &self.database.is_some())
            .field("firewall", &self.firewall.is_some())
            .field("permissions", &self.permissions.is_some())
            .field("disk", &self.disk.is_some())
            .field("certificates", &self.certificates.is_some())
            .field("scheduled_tasks", &self.scheduled_tasks.is_some())
            .finish()
    }
}

impl HealthProbeSet {
    /// Service probes are always present; everything else is opt-in
    pub fn new(
        services: Arc<dyn ServiceControl>,
        descriptors: Vec<ServiceDescriptor>,
        config: HealthConfig,
    ) -> Self {
        Self {
            services,
            descriptors,
            config,
            database: None,
            firewall: None,
            permissions: None,
            disk: None,
            certificates: None,
            scheduled_tasks: None,
        }
    }

    pub fn with_database(mut self, probe: Arc<dyn DatabaseProbe>) -> Self {
        self.database = Some(probe);
        self
    }

    pub fn with_firewall(mut self, probe: Arc<dyn FirewallProbe>) -> Self {
        self.firewall = Some(probe);
        self
    }

    pub fn with_permissions(mut self, probe: Arc<dyn PermissionProbe>) -> Self {
        self.permissions = Some(probe);
        self
    }

    pub fn with_disk_space(mut self, probe: Arc<dyn DiskSpaceProbe>) -> Self {
        self.disk = Some(probe);
        self
    }

    pub fn with_certificates(mut self, probe: Arc<dyn CertificateProbe>) -> Self {
        self.certificates = Some(probe);
        self
    }

    pub fn with_scheduled_tasks(mut self, probe: Arc<dyn ScheduledTaskProbe>) -> Self {
        self.scheduled_tasks = Some(probe);
        self
    }

    pub fn service_control(&self) -> Arc<dyn ServiceControl> {
        Arc::clone(&self.services)
    }

    pub fn descriptors(&self) -> &[ServiceDescriptor] {
        &self.descriptors
    }

    /// Descriptors flagged critical, in configuration order
    pub fn critical_services(&self) -> Vec<ServiceDescriptor> {
        self.descriptors
            .iter()
            .filter(|service| service.critical)
            .cloned()
            .collect()
    }

    pub fn run_all(&self) -> Vec<ProbeResult> {
        match self.collect(|| Ok::<(), Infallible>(())) {
            Ok(results) => results,
            Err(never) => match never {},
        }
    }

    /// Run every probe, stopping between probes once `ctx` is cancelled
    pub fn run_all_cancellable(&self, ctx: &WorkContext) -> Result<Vec<ProbeResult>, WorkError> {
        self.collect(|| ctx.check_cancelled())
    }

    pub fn check_health(&self) -> HealthCheckResult {
        HealthAggregator::aggregate(self.run_all())
    }

    pub fn check_health_cancellable(&self, ctx: &WorkContext) -> Result<HealthCheckResult, WorkError> {
        Ok(HealthAggregator::aggregate(self.run_all_cancellable(ctx)?))
    }

    fn collect<E>(&self, mut checkpoint: impl FnMut() -> Result<(), E>) -> Result<Vec<ProbeResult>, E> {
        let mut results = Vec::new();

        for service in &self.descriptors {
            checkpoint()?;
            results.push(self.probe_service(service));
        }

        if let (Some(probe), Some(instance)) = (&self.database, &self.config.database_instance) {
            checkpoint()?;
            results.push(guarded(DATABASE, ProbeKind::Database, || {
                self.probe_database(probe.as_ref(), instance)
            }));
        }

        if let Some(probe) = &self.firewall {
            if !self.config.firewall_rules.is_empty() {
                checkpoint()?;
                results.push(guarded(FIREWALL, ProbeKind::Firewall, || {
                    let check = probe.all_rules_present(&self.config.firewall_rules)?;
                    Ok(if check.all_present {
                        ProbeResult::healthy(FIREWALL, ProbeKind::Firewall)
                    } else {
                        ProbeResult::warning(
                            FIREWALL,
                            ProbeKind::Firewall,
                            format!("Missing firewall rules: {}", describe_missing(&check.missing)),
                        )
                    })
                }));
            }
        }

        if let Some(probe) = &self.permissions {
            for path in &self.config.permission_paths {
                checkpoint()?;
                let name = format!("Permissions ({})", path.display());
                results.push(guarded(&name, ProbeKind::Permissions, || {
                    probe_permissions(probe.as_ref(), &name, path)
                }));
            }
        }

        if let (Some(probe), Some(path)) = (&self.disk, &self.config.disk_path) {
            checkpoint()?;
            results.push(guarded(DISK_SPACE, ProbeKind::DiskSpace, || {
                let thresholds = &self.config.disk;
                let reading = probe.usage(path)?.classify(
                    &path.display().to_string(),
                    thresholds.warning_percent,
                    thresholds.critical_percent,
                );
                Ok(from_reading(DISK_SPACE, ProbeKind::DiskSpace, reading))
            }));
        }

        if let Some(probe) = &self.certificates {
            if !self.config.certificates.is_empty() {
                checkpoint()?;
                results.push(guarded(CERTIFICATES, ProbeKind::Certificates, || {
                    let found = probe.expiries(&self.config.certificates)?;
                    Ok(from_reading(
                        CERTIFICATES,
                        ProbeKind::Certificates,
                        self.classify_certificates(&found),
                    ))
                }));
            }
        }

        if let Some(probe) = &self.scheduled_tasks {
            if !self.config.scheduled_tasks.is_empty() {
                checkpoint()?;
                results.push(guarded(SCHEDULED_TASKS, ProbeKind::ScheduledTasks, || {
                    let states = probe.task_states(&self.config.scheduled_tasks)?;
                    Ok(from_reading(
                        SCHEDULED_TASKS,
                        ProbeKind::ScheduledTasks,
                        self.classify_tasks(&states),
                    ))
                }));
            }
        }

        debug!(probes = results.len(), "Health probes completed");
        Ok(results)
    }

    /// Expired is critical, inside the warning window is a warning, absent is a warning
    fn classify_certificates(&self, found: &[CertificateExpiry]) -> ProbeReading {
        let now = Utc::now();
        let warning_days = self.config.certificate_warning_days;
        combine_readings(self.config.certificates.iter().map(|subject| {
            match found.iter().find(|cert| &cert.subject == subject) {
                Some(cert) => cert.classify(now, warning_days),
                None => ProbeReading::warning(format!("Certificate '{subject}' not found")),
            }
        }))
    }

    fn classify_tasks(&self, states: &[ScheduledTaskState]) -> ProbeReading {
        combine_readings(self.config.scheduled_tasks.iter().map(|name| {
            match states.iter().find(|state| &state.name == name) {
                Some(state) => state.classify(),
                None => ScheduledTaskState {
                    name: name.clone(),
                    configured: false,
                    missed_runs: 0,
                }
                .classify(),
            }
        }))
    }

    fn probe_service(&self, service: &ServiceDescriptor) -> ProbeResult {
        guarded(&service.name, ProbeKind::Service, || {
            if self.services.is_running(&service.name) {
                return Ok(ProbeResult::healthy(&service.name, ProbeKind::Service));
            }

            let message = format!("{} is not running", service.name);
            Ok(if service.critical {
                ProbeResult::issue(&service.name, ProbeKind::Service, message)
            } else {
                ProbeResult::warning(&service.name, ProbeKind::Service, message)
            })
        })
    }

    fn probe_database(&self, probe: &dyn DatabaseProbe, instance: &str) -> anyhow::Result<ProbeResult> {
        let status = probe.test_connection(instance)?;

        if !status.connected {
            return Ok(ProbeResult::issue(
                DATABASE,
                ProbeKind::Database,
                format!("Cannot connect to database instance '{instance}': {}", status.message),
            ));
        }

        if !status.database_exists {
            let database = self.config.database_name.as_deref().unwrap_or("application database");
            return Ok(ProbeResult::issue(
                DATABASE,
                ProbeKind::Database,
                format!("Database '{database}' not found on '{instance}'"),
            ));
        }

        Ok(ProbeResult::healthy(DATABASE, ProbeKind::Database))
    }
}

fn probe_permissions(probe: &dyn PermissionProbe, name: &str, path: &Path) -> anyhow::Result<ProbeResult> {
    let check = probe.all_permissions_present(path)?;
    Ok(if check.all_correct {
        ProbeResult::healthy(name, ProbeKind::Permissions)
    } else {
        ProbeResult::warning(
            name,
            ProbeKind::Permissions,
            format!(
                "Missing permissions on {}: {}",
                path.display(),
                describe_missing(&check.missing)
            ),
        )
    })
}

fn from_reading(name: &str, kind: ProbeKind, reading: ProbeReading) -> ProbeResult {
    match reading.severity {
        ProbeSeverity::Ok => ProbeResult::healthy(name, kind),
        ProbeSeverity::Warning => ProbeResult::warning(
            name,
            kind,
            reading.message.unwrap_or_else(|| format!("{name} needs attention")),
        ),
        ProbeSeverity::Critical => ProbeResult::issue(
            name,
            kind,
            reading.message.unwrap_or_else(|| format!("{name} is in a critical state")),
        ),
    }
}

fn describe_missing(missing: &[String]) -> String {
    if missing.is_empty() {
        "unknown".to_string()
    } else {
        missing.join(", ")
    }
}

/// Run one probe, converting an error or panic into a failed-probe warning
fn guarded<F>(name: &str, kind: ProbeKind, probe: F) -> ProbeResult
where
    F: FnOnce() -> anyhow::Result<ProbeResult>,
{
    match catch_unwind(AssertUnwindSafe(probe)) {
        Ok(Ok(result)) => result,
        Ok(Err(error)) => {
            warn!(probe = %name, error = %format!("{error:#}"), "Health probe failed");
            ProbeResult::failed(name, kind, format!("{error:#}"))
        }
        Err(payload) => {
            let reason = panic_message(payload.as_ref());
            warn!(probe = %name, panic = %reason, "Health probe panicked");
            ProbeResult::failed(name, kind, reason)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::probes::{DatabaseConnectionStatus, FirewallRuleCheck, PermissionCheck};
    use crate::health::HealthStatus;
    use std::collections::HashSet;
    use std::path::PathBuf;
    use std::time::Duration;

    struct Services(HashSet<&'static str>);

    impl ServiceControl for Services {
        fn is_running(&self, name: &str) -> bool {
            self.0.contains(name)
        }

        fn start(&self, _name: &str, _timeout: Duration) -> bool {
            false
        }
    }

    struct Firewall(Vec<String>);

    impl FirewallProbe for Firewall {
        fn all_rules_present(&self, _rules: &[String]) -> anyhow::Result<FirewallRuleCheck> {
            Ok(FirewallRuleCheck {
                all_present: self.0.is_empty(),
                missing: self.0.clone(),
            })
        }
    }

    struct FlakyDatabase;

    impl DatabaseProbe for FlakyDatabase {
        fn test_connection(&self, _instance: &str) -> anyhow::Result<DatabaseConnectionStatus> {
            anyhow::bail!("login timeout expired")
        }
    }

    struct PanickingPermissions;

    impl PermissionProbe for PanickingPermissions {
        fn all_permissions_present(&self, _path: &Path) -> anyhow::Result<PermissionCheck> {
            panic!("ACL query crashed")
        }
    }

    fn probe_set(running: &[&'static str]) -> HealthProbeSet {
        HealthProbeSet::new(
            Arc::new(Services(running.iter().copied().collect())),
            vec![
                ServiceDescriptor::new("MSSQLSERVER", true, 1),
                ServiceDescriptor::new("Reporting", false, 4),
            ],
            HealthConfig {
                database_instance: Some("localhost\\SQLEXPRESS".to_string()),
                firewall_rules: vec!["Console HTTP".to_string(), "Console SQL".to_string()],
                permission_paths: vec![PathBuf::from("/srv/console/data")],
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_critical_service_down_is_an_issue() {
        let report = probe_set(&["Reporting"]).check_health();
        assert_eq!(report.overall(), HealthStatus::Unhealthy);
        assert_eq!(report.issues(), ["MSSQLSERVER is not running"]);
        assert!(report.warnings().is_empty());
    }

    #[test]
    fn test_non_critical_service_down_is_a_warning() {
        let report = probe_set(&["MSSQLSERVER"]).check_health();
        assert_eq!(report.overall(), HealthStatus::Degraded);
        assert_eq!(report.warnings(), ["Reporting is not running"]);
    }

    #[test]
    fn test_unwired_probes_are_skipped() {
        let report = probe_set(&["MSSQLSERVER", "Reporting"]).check_health();
        assert!(report.is_healthy());
        assert_eq!(report.probes().len(), 2);
        assert!(report.probe(ProbeKind::Database, DATABASE).is_none());
    }

    #[test]
    fn test_missing_firewall_rules_degrade() {
        let report = probe_set(&["MSSQLSERVER", "Reporting"])
            .with_firewall(Arc::new(Firewall(vec!["Console SQL".to_string()])))
            .check_health();

        assert_eq!(report.overall(), HealthStatus::Degraded);
        assert_eq!(report.warnings(), ["Missing firewall rules: Console SQL"]);
    }

    #[test]
    fn test_probe_errors_and_panics_become_warnings() {
        let report = probe_set(&["MSSQLSERVER", "Reporting"])
            .with_database(Arc::new(FlakyDatabase))
            .with_permissions(Arc::new(PanickingPermissions))
            .check_health();

        assert_eq!(report.overall(), HealthStatus::Degraded);
        assert!(report.issues().is_empty());
        assert_eq!(
            report.warnings(),
            [
                "Database check failed: login timeout expired",
                "Permissions (/srv/console/data) check failed: ACL query crashed",
            ]
        );
    }

    #[test]
    fn test_cancelled_context_stops_probing() {
        let ctx = WorkContext::standalone("health");
        ctx.cancellation_token().cancel();

        let outcome = probe_set(&[]).check_health_cancellable(&ctx);
        assert!(matches!(outcome, Err(WorkError::Cancelled)));
    }

    #[test]
    fn test_readings_without_message_get_a_default() {
        let bare = |severity| ProbeReading {
            severity,
            message: None,
        };

        let warning = from_reading(DISK_SPACE, ProbeKind::DiskSpace, bare(ProbeSeverity::Warning));
        assert_eq!(warning.warnings, vec!["Disk space needs attention"]);

        let critical = from_reading(CERTIFICATES, ProbeKind::Certificates, bare(ProbeSeverity::Critical));
        assert_eq!(critical.status, HealthStatus::Unhealthy);
        assert_eq!(critical.issues, vec!["Certificates is in a critical state"]);

        let ok = from_reading(SCHEDULED_TASKS, ProbeKind::ScheduledTasks, bare(ProbeSeverity::Ok));
        assert_eq!(ok.status, HealthStatus::Healthy);
    }

    #[test]
    fn test_critical_services_filter() {
        let names: Vec<_> = probe_set(&[])
            .critical_services()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["MSSQLSERVER"]);
    }
}
