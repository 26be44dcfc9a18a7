//! Health aggregation scenarios through the probe set and the console.

mod common;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use admin_console::health::{HealthProbeSet, HealthStatus, ProbeKind, ScheduledTaskState};
use admin_console::recovery::ServiceDescriptor;
use admin_console::config::HealthConfig;
use common::*;
use crossbeam::channel;

fn health_config() -> HealthConfig {
    HealthConfig {
        database_instance: Some("localhost\\SQLEXPRESS".to_string()),
        database_name: Some("ConsoleDB".to_string()),
        firewall_rules: vec!["Console HTTPS".to_string(), "Console SQL".to_string()],
        permission_paths: vec![PathBuf::from("/srv/console/uploads")],
        ..Default::default()
    }
}

#[test]
fn test_critical_service_down_only() {
    let control = ScriptedServiceControl::new().service("W3SVC", ServiceScript::NeverStarts);
    let probes = HealthProbeSet::new(
        Arc::new(control),
        vec![ServiceDescriptor::new("W3SVC", true, 2)],
        HealthConfig::default(),
    );

    let report = probes.check_health();
    assert_eq!(report.overall(), HealthStatus::Unhealthy);
    assert_eq!(report.issues(), ["W3SVC is not running"]);
    assert!(report.warnings().is_empty());
    assert!(report.needs_recovery());
}

#[test]
fn test_missing_firewall_rule_only() {
    let control = ScriptedServiceControl::new().service("W3SVC", ServiceScript::Running);
    let probes = HealthProbeSet::new(
        Arc::new(control),
        vec![ServiceDescriptor::new("W3SVC", true, 2)],
        health_config(),
    )
    .with_firewall(Arc::new(StaticFirewall {
        missing: vec!["Console SQL".to_string()],
    }));

    let report = probes.check_health();
    assert_eq!(report.overall(), HealthStatus::Degraded);
    assert!(report.issues().is_empty());
    assert_eq!(report.warnings(), ["Missing firewall rules: Console SQL"]);
    assert!(!report.needs_recovery());
}

#[test]
fn test_issue_outranks_every_warning() {
    let control = ScriptedServiceControl::new().service("W3SVC", ServiceScript::Running);
    let probes = HealthProbeSet::new(
        Arc::new(control),
        vec![ServiceDescriptor::new("W3SVC", true, 2)],
        health_config(),
    )
    .with_database(Arc::new(StaticDatabase::unreachable("login failed")))
    .with_firewall(Arc::new(StaticFirewall {
        missing: vec!["Console HTTPS".to_string()],
    }))
    .with_permissions(Arc::new(StaticPermissions {
        missing: vec!["IIS_IUSRS:Modify".to_string()],
    }));

    let report = probes.check_health();
    assert_eq!(report.overall(), HealthStatus::Unhealthy);
    assert_eq!(
        report.issues(),
        ["Cannot connect to database instance 'localhost\\SQLEXPRESS': login failed"]
    );
    assert_eq!(
        report.warnings(),
        [
            "Missing firewall rules: Console HTTPS",
            "Missing permissions on /srv/console/uploads: IIS_IUSRS:Modify",
        ]
    );
}

#[test]
fn test_flaky_probe_cannot_force_unhealthy() {
    let control = ScriptedServiceControl::new().service("W3SVC", ServiceScript::Running);
    let probes = HealthProbeSet::new(
        Arc::new(control),
        vec![ServiceDescriptor::new("W3SVC", true, 2)],
        health_config(),
    )
    .with_database(Arc::new(StaticDatabase { status: None }));

    let report = probes.check_health();
    assert_eq!(report.overall(), HealthStatus::Degraded);
    assert_eq!(
        report.warnings(),
        ["Database check failed: network path not found"]
    );
}

#[test]
fn test_health_check_through_console() {
    let (_control, collaborators) = scripted(
        ScriptedServiceControl::new()
            .service("SQL", ServiceScript::Running)
            .service("Web", ServiceScript::Running)
            .service("App", ServiceScript::Running),
    );
    let mut config = fast_config(tiered_services());
    config.health = health_config();
    let console = console_with(
        config,
        collaborators.with_database(Arc::new(StaticDatabase::reachable())),
    );

    let (tx, rx) = channel::bounded(1);
    let dispatcher = console.dispatcher().clone();
    console
        .run_health_check(
            move |report| tx.send((report, dispatcher.is_ui_thread())).unwrap(),
            |error| panic!("{error}"),
        )
        .unwrap();

    let (report, on_ui_thread) = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert!(on_ui_thread);
    assert!(report.is_healthy());
    assert_eq!(report.summary(), "System is healthy");
    assert!(report.probe(ProbeKind::Database, "Database").is_some());
    assert!(report.probe(ProbeKind::Firewall, "Firewall").is_none());
    console.shutdown();
}

#[test]
fn test_report_serializes_for_cli_output() {
    let control = ScriptedServiceControl::new();
    let report = HealthProbeSet::new(
        Arc::new(control),
        vec![ServiceDescriptor::new("App", true, 3)],
        HealthConfig::default(),
    )
    .check_health();

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["overall"], "unhealthy");
    assert_eq!(json["issues"][0], "App is not running");
    assert_eq!(json["probes"]["service:App"]["kind"], "service");
}

fn threshold_probes(config: HealthConfig) -> HealthProbeSet {
    let control = ScriptedServiceControl::new().service("W3SVC", ServiceScript::Running);
    HealthProbeSet::new(
        Arc::new(control),
        vec![ServiceDescriptor::new("W3SVC", true, 2)],
        config,
    )
}

fn threshold_config() -> HealthConfig {
    HealthConfig {
        disk_path: Some(PathBuf::from("/srv")),
        certificates: vec!["CN=console.local".to_string()],
        scheduled_tasks: vec!["Nightly backup".to_string()],
        ..Default::default()
    }
}

fn nightly_backup(configured: bool, missed_runs: u32) -> StaticScheduledTasks {
    StaticScheduledTasks {
        states: vec![ScheduledTaskState {
            name: "Nightly backup".to_string(),
            configured,
            missed_runs,
        }],
    }
}

#[test]
fn test_disk_below_critical_threshold_is_an_issue() {
    let report = threshold_probes(threshold_config())
        .with_disk_space(Arc::new(StaticDisk::percent_free(2)))
        .check_health();

    assert_eq!(report.overall(), HealthStatus::Unhealthy);
    assert_eq!(report.issues(), ["Disk space critically low on /srv: 2.0% free"]);
}

#[test]
fn test_disk_below_warning_threshold_degrades() {
    let report = threshold_probes(threshold_config())
        .with_disk_space(Arc::new(StaticDisk::percent_free(10)))
        .check_health();

    assert_eq!(report.overall(), HealthStatus::Degraded);
    assert_eq!(report.warnings(), ["Disk space low on /srv: 10.0% free"]);
}

#[test]
fn test_disk_thresholds_come_from_configuration() {
    let disk = || Arc::new(StaticDisk::percent_free(20));

    let defaults = threshold_probes(threshold_config())
        .with_disk_space(disk())
        .check_health();
    assert!(defaults.is_healthy());

    let mut strict = threshold_config();
    strict.disk.warning_percent = 30.0;
    strict.disk.critical_percent = 25.0;
    let report = threshold_probes(strict).with_disk_space(disk()).check_health();
    assert_eq!(report.overall(), HealthStatus::Unhealthy);
    assert_eq!(report.issues(), ["Disk space critically low on /srv: 20.0% free"]);
}

#[test]
fn test_expired_certificate_is_an_issue() {
    let report = threshold_probes(threshold_config())
        .with_certificates(Arc::new(StaticCertificates::expiring_in_hours("CN=console.local", -1)))
        .check_health();

    assert_eq!(report.overall(), HealthStatus::Unhealthy);
    assert_eq!(report.issues(), ["Certificate 'CN=console.local' has expired"]);
}

#[test]
fn test_certificate_expiring_soon_degrades() {
    let report = threshold_probes(threshold_config())
        .with_certificates(Arc::new(StaticCertificates::expiring_in_hours(
            "CN=console.local",
            10 * 24 + 12,
        )))
        .check_health();

    assert_eq!(report.overall(), HealthStatus::Degraded);
    assert_eq!(report.warnings(), ["Certificate 'CN=console.local' expires in 10 days"]);
}

#[test]
fn test_certificate_warning_window_comes_from_configuration() {
    let mut config = threshold_config();
    config.certificate_warning_days = 5;

    let report = threshold_probes(config)
        .with_certificates(Arc::new(StaticCertificates::expiring_in_hours(
            "CN=console.local",
            10 * 24 + 12,
        )))
        .check_health();
    assert!(report.is_healthy());
}

#[test]
fn test_missing_certificate_degrades() {
    let report = threshold_probes(threshold_config())
        .with_certificates(Arc::new(StaticCertificates::default()))
        .check_health();

    assert_eq!(report.overall(), HealthStatus::Degraded);
    assert_eq!(report.warnings(), ["Certificate 'CN=console.local' not found"]);
}

#[test]
fn test_missed_scheduled_runs_degrade() {
    let report = threshold_probes(threshold_config())
        .with_scheduled_tasks(Arc::new(nightly_backup(true, 2)))
        .check_health();

    assert_eq!(report.overall(), HealthStatus::Degraded);
    assert_eq!(report.warnings(), ["Scheduled task 'Nightly backup' missed 2 run(s)"]);
    assert_eq!(
        report
            .probe(ProbeKind::ScheduledTasks, "Scheduled tasks")
            .map(|p| p.status),
        Some(HealthStatus::Degraded)
    );
}

#[test]
fn test_unknown_scheduled_task_reads_as_not_configured() {
    let report = threshold_probes(threshold_config())
        .with_scheduled_tasks(Arc::new(StaticScheduledTasks::default()))
        .check_health();

    assert_eq!(
        report.warnings(),
        ["Scheduled task 'Nightly backup' is not configured"]
    );
}

#[test]
fn test_all_threshold_probes_healthy() {
    let report = threshold_probes(threshold_config())
        .with_disk_space(Arc::new(StaticDisk::percent_free(60)))
        .with_certificates(Arc::new(StaticCertificates::expiring_in_hours(
            "CN=console.local",
            365 * 24,
        )))
        .with_scheduled_tasks(Arc::new(nightly_backup(true, 0)))
        .check_health();

    assert!(report.is_healthy());
    assert_eq!(report.probes().len(), 4);
}

#[test]
fn test_service_named_like_a_probe_is_reported_separately() {
    let control = ScriptedServiceControl::new().service("Database", ServiceScript::NeverStarts);
    let report = HealthProbeSet::new(
        Arc::new(control),
        vec![ServiceDescriptor::new("Database", true, 1)],
        health_config(),
    )
    .with_database(Arc::new(StaticDatabase::reachable()))
    .check_health();

    assert_eq!(report.overall(), HealthStatus::Unhealthy);
    assert_eq!(report.issues(), ["Database is not running"]);
    assert_eq!(report.probes().len(), 2);
    assert_eq!(
        report.probe(ProbeKind::Service, "Database").map(|p| p.status),
        Some(HealthStatus::Unhealthy)
    );
    assert_eq!(
        report.probe(ProbeKind::Database, "Database").map(|p| p.status),
        Some(HealthStatus::Healthy)
    );
}
