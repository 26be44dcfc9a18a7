//! # Admin Console Facade
//!
//! Wires configuration, the worker pool, the presentation thread, the health
//! probes and the recovery orchestrator into the surface GUI commands and the
//! CLI call.
//!
//! Every background operation goes through [`AdminConsole::run`], so the
//! single-flight guard covers health checks and recovery exactly like any
//! other administrative action.

use std::sync::Arc;
use std::time::Duration;

use crossbeam::channel::{self, RecvTimeoutError};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::ConsoleConfig;
use crate::constants::operations;
use crate::dispatch::{DispatchError, UiDispatcher};
use crate::error::{ConsoleError, Result};
use crate::execution::{WorkContext, WorkError, WorkerPool, WorkerPoolStats};
use crate::health::{
    CertificateProbe, DatabaseProbe, DiskSpaceProbe, FirewallProbe, HealthCheckResult,
    HealthProbeSet, PermissionProbe, ScheduledTaskProbe, ServiceControl,
};
use crate::orchestration::{GuardSnapshot, OperationPhase, OperationRunner, OperationTicket};
use crate::recovery::{RecoveryOrchestrator, RecoveryPolicy, RecoveryResult};

/// Platform integrations the console delegates to
///
/// Only service control is mandatory; unset probes are skipped by health checks.
#[derive(Clone)]
pub struct Collaborators {
    services: Arc<dyn ServiceControl>,
    database: Option<Arc<dyn DatabaseProbe>>,
    firewall: Option<Arc<dyn FirewallProbe>>,
    permissions: Option<Arc<dyn PermissionProbe>>,
    disk: Option<Arc<dyn DiskSpaceProbe>>,
    certificates: Option<Arc<dyn CertificateProbe>>,
    scheduled_tasks: Option<Arc<dyn ScheduledTaskProbe>>,
}

impl Collaborators {
    pub fn new(services: Arc<dyn ServiceControl>) -> Self {
        Self {
            services,
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

    fn into_probe_set(self, config: &ConsoleConfig) -> HealthProbeSet {
        let mut probes = HealthProbeSet::new(
            self.services,
            config.services.clone(),
            config.health.clone(),
        );
        if let Some(probe) = self.database {
            probes = probes.with_database(probe);
        }
        if let Some(probe) = self.firewall {
            probes = probes.with_firewall(probe);
        }
        if let Some(probe) = self.permissions {
            probes = probes.with_permissions(probe);
        }
        if let Some(probe) = self.disk {
            probes = probes.with_disk_space(probe);
        }
        if let Some(probe) = self.certificates {
            probes = probes.with_certificates(probe);
        }
        if let Some(probe) = self.scheduled_tasks {
            probes = probes.with_scheduled_tasks(probe);
        }
        probes
    }
}

type Deliver<T> = Box<dyn FnOnce(T) + Send>;

/// Outcome of a combined check, recover, re-check run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoHealReport {
    pub before: HealthCheckResult,
    /// Present only when the first check reported Unhealthy
    pub recovery: Option<RecoveryResult>,
    pub after: Option<HealthCheckResult>,
}

impl AutoHealReport {
    /// The most recent health report
    pub fn current(&self) -> &HealthCheckResult {
        self.after.as_ref().unwrap_or(&self.before)
    }
}

#[derive(Debug)]
pub struct AdminConsole {
    config: ConsoleConfig,
    runner: OperationRunner,
    dispatcher: UiDispatcher,
    probes: Arc<HealthProbeSet>,
    recovery: Arc<RecoveryOrchestrator>,
}

impl AdminConsole {
    /// Validate `config`, start the worker pool and the presentation thread
    pub fn new(config: ConsoleConfig, collaborators: Collaborators) -> Result<Self> {
        config.validate()?;

        let pool = WorkerPool::new(&config.worker_pool)
            .map_err(|e| ConsoleError::Submission(e.to_string()))?;
        let dispatcher = UiDispatcher::spawn(&config.dispatch.thread_name)?;
        let runner = OperationRunner::new(pool, dispatcher.clone(), config.dispatch.poll_interval());

        let recovery = RecoveryOrchestrator::new(
            Arc::clone(&collaborators.services),
            RecoveryPolicy::from(&config.recovery),
        );
        let probes = collaborators.into_probe_set(&config);

        info!(
            services = config.services.len(),
            max_concurrency = config.worker_pool.max_concurrency,
            "Admin console started"
        );

        Ok(Self {
            config,
            runner,
            dispatcher,
            probes: Arc::new(probes),
            recovery: Arc::new(recovery),
        })
    }

    pub fn config(&self) -> &ConsoleConfig {
        &self.config
    }

    /// The presentation thread; route every UI state change through it
    pub fn dispatcher(&self) -> &UiDispatcher {
        &self.dispatcher
    }

    /// True iff no operation is in flight
    pub fn can_start(&self) -> bool {
        self.runner.can_start()
    }

    pub fn phase(&self) -> OperationPhase {
        self.runner.phase()
    }

    pub fn current_operation(&self) -> Option<String> {
        self.runner.current_operation()
    }

    pub fn snapshot(&self) -> GuardSnapshot {
        self.runner.snapshot()
    }

    pub fn pool_stats(&self) -> WorkerPoolStats {
        self.runner.pool().stats()
    }

    /// Single entry point for background operations; see [`OperationRunner::run`]
    pub fn run<T, W, S, E>(&self, name: &str, work: W, on_success: S, on_error: E) -> Result<OperationTicket>
    where
        T: Send + 'static,
        W: FnOnce(WorkContext) -> anyhow::Result<T> + Send + 'static,
        S: FnOnce(T) + Send + 'static,
        E: FnOnce(WorkError) + Send + 'static,
    {
        self.runner.run(name, work, on_success, on_error)
    }

    /// Run every probe on the calling thread; never call from the presentation thread
    pub fn check_health(&self) -> HealthCheckResult {
        self.probes.check_health()
    }

    /// Recover the critical services on the calling thread
    pub fn recover(&self) -> RecoveryResult {
        self.recovery.recover(&self.probes.critical_services())
    }

    /// Health check in the background, delivered on the presentation thread
    pub fn run_health_check<S, E>(&self, on_success: S, on_error: E) -> Result<OperationTicket>
    where
        S: FnOnce(HealthCheckResult) + Send + 'static,
        E: FnOnce(WorkError) + Send + 'static,
    {
        let probes = Arc::clone(&self.probes);
        self.run(
            operations::HEALTH_CHECK,
            move |ctx| Ok(probes.check_health_cancellable(&ctx)?),
            on_success,
            on_error,
        )
    }

    /// Recovery in the background, delivered on the presentation thread
    pub fn run_recovery<S, E>(&self, on_success: S, on_error: E) -> Result<OperationTicket>
    where
        S: FnOnce(RecoveryResult) + Send + 'static,
        E: FnOnce(WorkError) + Send + 'static,
    {
        let probes = Arc::clone(&self.probes);
        let recovery = Arc::clone(&self.recovery);
        self.run(
            operations::AUTO_RECOVERY,
            move |ctx| Ok(recovery.recover_with(&probes.critical_services(), &ctx)?),
            on_success,
            on_error,
        )
    }

    /// Check, recover when Unhealthy, then check again, as one guarded operation
    pub fn run_auto_heal<S, E>(&self, on_success: S, on_error: E) -> Result<OperationTicket>
    where
        S: FnOnce(AutoHealReport) + Send + 'static,
        E: FnOnce(WorkError) + Send + 'static,
    {
        let probes = Arc::clone(&self.probes);
        let recovery = Arc::clone(&self.recovery);
        self.run(
            operations::AUTO_HEAL,
            move |ctx| {
                let before = probes.check_health_cancellable(&ctx)?;
                if !before.needs_recovery() {
                    return Ok(AutoHealReport {
                        before,
                        recovery: None,
                        after: None,
                    });
                }

                let recovered = recovery.recover_with(&probes.critical_services(), &ctx)?;
                let after = probes.check_health_cancellable(&ctx)?;
                Ok(AutoHealReport {
                    before,
                    recovery: Some(recovered),
                    after: Some(after),
                })
            },
            on_success,
            on_error,
        )
    }

    /// Guarded health check that blocks the caller until it is delivered
    ///
    /// For callers without an event loop of their own, such as the CLI. On
    /// timeout the operation is cancelled, which releases the guard, and
    /// [`ConsoleError::Timeout`] is returned. Never call from the
    /// presentation thread.
    pub fn check_health_within(&self, timeout: Duration) -> Result<HealthCheckResult> {
        self.await_delivery(operations::HEALTH_CHECK, timeout, |on_success, on_error| {
            self.run_health_check(on_success, on_error)
        })
    }

    /// Guarded recovery that blocks the caller; see [`check_health_within`](Self::check_health_within)
    pub fn recover_within(&self, timeout: Duration) -> Result<RecoveryResult> {
        self.await_delivery(operations::AUTO_RECOVERY, timeout, |on_success, on_error| {
            self.run_recovery(on_success, on_error)
        })
    }

    fn await_delivery<T, F>(&self, operation: &str, timeout: Duration, start: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(Deliver<T>, Deliver<WorkError>) -> Result<OperationTicket>,
    {
        // Delivery runs on the presentation thread, so waiting there would deadlock
        if self.dispatcher.is_ui_thread() {
            return Err(DispatchError::WouldBlock(operation.to_string()).into());
        }

        let (tx, rx) = channel::bounded(1);
        let error_tx = tx.clone();
        let ticket = start(
            Box::new(move |value| {
                let _ = tx.send(Ok(value));
            }),
            Box::new(move |work_error| {
                let _ = error_tx.send(Err(work_error));
            }),
        )?;

        match rx.recv_timeout(timeout) {
            Ok(outcome) => outcome.map_err(ConsoleError::from),
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    operation_id = %ticket.id(),
                    operation = %ticket.name(),
                    waited_ms = timeout.as_millis() as u64,
                    "Operation timed out; cancelling"
                );
                ticket.cancel();
                Err(ConsoleError::Timeout {
                    operation: ticket.name().to_string(),
                    waited: timeout,
                })
            }
            Err(RecvTimeoutError::Disconnected) => Err(DispatchError::Disconnected.into()),
        }
    }

    /// Cancel outstanding work and stop the presentation thread
    pub fn shutdown(&self) {
        info!("Admin console shutting down");
        self.runner.pool().shutdown();
        self.dispatcher.shutdown();
    }
}
