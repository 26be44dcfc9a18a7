//! Shared fixtures for integration tests: scripted collaborators and a
//! console builder with fast timings.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use admin_console::config::ConsoleConfig;
use admin_console::console::{AdminConsole, Collaborators};
use admin_console::health::{
    CertificateExpiry, CertificateProbe, DatabaseConnectionStatus, DatabaseProbe, DiskSpaceProbe,
    DiskUsage, FirewallProbe, FirewallRuleCheck, PermissionCheck, PermissionProbe,
    ScheduledTaskProbe, ScheduledTaskState, ServiceControl,
};
use admin_console::recovery::ServiceDescriptor;
use parking_lot::Mutex;

/// How a scripted service behaves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceScript {
    Running,
    /// Comes up after this many start calls
    StartsAfter(u32),
    NeverStarts,
}

/// `ServiceControl` whose services follow a fixed script
#[derive(Debug, Default)]
pub struct ScriptedServiceControl {
    scripts: HashMap<String, ServiceScript>,
    starts: Mutex<HashMap<String, u32>>,
    start_log: Mutex<Vec<String>>,
}

impl ScriptedServiceControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn service(mut self, name: &str, script: ServiceScript) -> Self {
        self.scripts.insert(name.to_string(), script);
        self
    }

    /// Every start call, in order
    pub fn start_log(&self) -> Vec<String> {
        self.start_log.lock().clone()
    }

    pub fn start_count(&self, name: &str) -> u32 {
        self.starts.lock().get(name).copied().unwrap_or(0)
    }
}

impl ServiceControl for ScriptedServiceControl {
    fn is_running(&self, name: &str) -> bool {
        match self.scripts.get(name) {
            Some(ServiceScript::Running) => true,
            Some(ServiceScript::StartsAfter(needed)) => self.start_count(name) >= *needed,
            Some(ServiceScript::NeverStarts) | None => false,
        }
    }

    fn start(&self, name: &str, _timeout: Duration) -> bool {
        self.start_log.lock().push(name.to_string());
        *self.starts.lock().entry(name.to_string()).or_insert(0) += 1;
        self.scripts.contains_key(name)
    }
}

/// Firewall probe reporting a fixed set of missing rules
#[derive(Debug, Default)]
pub struct StaticFirewall {
    pub missing: Vec<String>,
}

impl FirewallProbe for StaticFirewall {
    fn all_rules_present(&self, _rules: &[String]) -> anyhow::Result<FirewallRuleCheck> {
        Ok(FirewallRuleCheck {
            all_present: self.missing.is_empty(),
            missing: self.missing.clone(),
        })
    }
}

/// Database probe returning a fixed status, or an error when `status` is `None`
#[derive(Debug)]
pub struct StaticDatabase {
    pub status: Option<DatabaseConnectionStatus>,
}

impl StaticDatabase {
    pub fn reachable() -> Self {
        Self {
            status: Some(DatabaseConnectionStatus {
                connected: true,
                database_exists: true,
                message: "OK".to_string(),
            }),
        }
    }

    pub fn unreachable(message: &str) -> Self {
        Self {
            status: Some(DatabaseConnectionStatus {
                connected: false,
                database_exists: false,
                message: message.to_string(),
            }),
        }
    }
}

impl DatabaseProbe for StaticDatabase {
    fn test_connection(&self, _instance: &str) -> anyhow::Result<DatabaseConnectionStatus> {
        self.status
            .clone()
            .ok_or_else(|| anyhow::anyhow!("network path not found"))
    }
}

/// Permission probe where every path is missing the same grants
#[derive(Debug, Default)]
pub struct StaticPermissions {
    pub missing: Vec<String>,
}

impl PermissionProbe for StaticPermissions {
    fn all_permissions_present(&self, _path: &Path) -> anyhow::Result<PermissionCheck> {
        Ok(PermissionCheck {
            all_correct: self.missing.is_empty(),
            missing: self.missing.clone(),
        })
    }
}

/// Disk probe reporting a fixed free-space percentage of a 1000-byte volume
#[derive(Debug)]
pub struct StaticDisk {
    pub usage: DiskUsage,
}

impl StaticDisk {
    pub fn percent_free(percent: u64) -> Self {
        Self {
            usage: DiskUsage {
                total_bytes: 1000,
                free_bytes: percent * 10,
            },
        }
    }
}

impl DiskSpaceProbe for StaticDisk {
    fn usage(&self, _path: &Path) -> anyhow::Result<DiskUsage> {
        Ok(self.usage)
    }
}

/// Certificate store holding a fixed set of certificates
#[derive(Debug, Default)]
pub struct StaticCertificates {
    pub expiries: Vec<CertificateExpiry>,
}

impl StaticCertificates {
    /// One certificate expiring `hours` from now; negative means already expired
    pub fn expiring_in_hours(subject: &str, hours: i64) -> Self {
        Self {
            expiries: vec![CertificateExpiry {
                subject: subject.to_string(),
                not_after: chrono::Utc::now() + chrono::Duration::hours(hours),
            }],
        }
    }
}

impl CertificateProbe for StaticCertificates {
    fn expiries(&self, _subjects: &[String]) -> anyhow::Result<Vec<CertificateExpiry>> {
        Ok(self.expiries.clone())
    }
}

/// Task scheduler reporting fixed task states
#[derive(Debug, Default)]
pub struct StaticScheduledTasks {
    pub states: Vec<ScheduledTaskState>,
}

impl ScheduledTaskProbe for StaticScheduledTasks {
    fn task_states(&self, _tasks: &[String]) -> anyhow::Result<Vec<ScheduledTaskState>> {
        Ok(self.states.clone())
    }
}

/// SQL=1, Web=2, App=3
pub fn tiered_services() -> Vec<ServiceDescriptor> {
    vec![
        ServiceDescriptor::new("App", true, 3),
        ServiceDescriptor::new("SQL", true, 1),
        ServiceDescriptor::new("Web", true, 2),
    ]
}

/// Defaults with millisecond timings so tests stay fast
pub fn fast_config(services: Vec<ServiceDescriptor>) -> ConsoleConfig {
    let mut config = ConsoleConfig::default();
    config.dispatch.poll_interval_ms = 5;
    config.recovery.retry_delay_ms = 2;
    config.recovery.start_timeout_ms = 10;
    config.services = services;
    config
}

pub fn console_with(config: ConsoleConfig, collaborators: Collaborators) -> AdminConsole {
    AdminConsole::new(config, collaborators).expect("console should start")
}

pub fn scripted(control: ScriptedServiceControl) -> (Arc<ScriptedServiceControl>, Collaborators) {
    let control = Arc::new(control);
    let collaborators = Collaborators::new(control.clone());
    (control, collaborators)
}

/// Poll `condition` until it holds or `timeout` elapses
pub fn wait_until(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    condition()
}
