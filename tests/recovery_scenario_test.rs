//! Dependency-ordered auto-recovery, directly and through the console.

mod common;

use std::sync::Arc;
use std::time::Duration;

use admin_console::recovery::{RecoveryOrchestrator, RecoveryPolicy, RecoveryResult};
use common::*;
use crossbeam::channel;

fn policy(max_retries: u32) -> RecoveryPolicy {
    RecoveryPolicy {
        max_retries,
        retry_delay: Duration::from_millis(2),
        start_timeout: Duration::from_millis(10),
    }
}

fn tiered_control() -> ScriptedServiceControl {
    ScriptedServiceControl::new()
        .service("SQL", ServiceScript::Running)
        .service("Web", ServiceScript::StartsAfter(2))
        .service("App", ServiceScript::NeverStarts)
}

#[test]
fn test_tiered_recovery_scenario() {
    let control = Arc::new(tiered_control());
    let orchestrator = RecoveryOrchestrator::new(control.clone(), policy(3));

    let result = orchestrator.recover(&tiered_services());

    assert_eq!(
        result,
        RecoveryResult {
            already_running: vec!["SQL".to_string()],
            recovered: vec!["Web".to_string()],
            failed: vec!["App".to_string()],
            attempted: vec!["Web".to_string(), "App".to_string()],
            success: false,
        }
    );

    // Web came up on its second attempt; App used every retry
    assert_eq!(control.start_count("Web"), 2);
    assert_eq!(control.start_count("App"), 3);
    assert_eq!(control.start_count("SQL"), 0);
    assert_eq!(control.start_log(), vec!["Web", "Web", "App", "App", "App"]);
}

#[test]
fn test_early_failure_does_not_block_later_ranks() {
    let control = Arc::new(
        ScriptedServiceControl::new()
            .service("SQL", ServiceScript::NeverStarts)
            .service("Web", ServiceScript::StartsAfter(1))
            .service("App", ServiceScript::StartsAfter(1)),
    );
    let orchestrator = RecoveryOrchestrator::new(control.clone(), policy(2));

    let result = orchestrator.recover(&tiered_services());

    assert_eq!(result.failed, vec!["SQL"]);
    assert_eq!(result.recovered, vec!["Web", "App"]);
    assert!(!result.success);
    assert_eq!(control.start_log(), vec!["SQL", "SQL", "Web", "App"]);
}

#[test]
fn test_all_running_is_a_successful_no_op() {
    let control = Arc::new(
        ScriptedServiceControl::new()
            .service("SQL", ServiceScript::Running)
            .service("Web", ServiceScript::Running)
            .service("App", ServiceScript::Running),
    );
    let result = RecoveryOrchestrator::new(control.clone(), policy(3)).recover(&tiered_services());

    assert!(result.success);
    assert_eq!(result.already_running, vec!["SQL", "Web", "App"]);
    assert!(result.attempted.is_empty());
    assert!(control.start_log().is_empty());
}

#[test]
fn test_recovery_through_console_releases_guard() {
    let (control, collaborators) = scripted(tiered_control());
    let console = console_with(fast_config(tiered_services()), collaborators);
    let (tx, rx) = channel::bounded(1);

    console
        .run_recovery(move |result| tx.send(result).unwrap(), |error| panic!("{error}"))
        .unwrap();

    let result = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(result.recovered, vec!["Web"]);
    assert_eq!(result.failed, vec!["App"]);
    assert_eq!(control.start_count("App"), 3);

    assert!(wait_until(Duration::from_secs(1), || console.can_start()));
    console.shutdown();
}
