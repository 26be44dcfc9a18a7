//! # Auto-Recovery Orchestrator
//!
//! Brings stopped services back in dependency order.
//!
//! Services are visited in ascending `recovery_rank` (ties keep their
//! configured order). A running service is recorded as already running. A
//! stopped one gets up to `max_retries` start attempts, with `retry_delay`
//! between attempts and a status re-check after each. A service that never
//! comes up is recorded as failed and the run continues with the next one;
//! nothing already recovered is rolled back.

use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::RecoveryConfig;
use crate::execution::{WorkContext, WorkError};
use crate::health::ServiceControl;

/// A managed service and its place in the recovery order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    pub name: String,
    /// Down means Unhealthy rather than Degraded
    #[serde(default = "default_critical")]
    pub critical: bool,
    /// Lower ranks are recovered first
    pub recovery_rank: u32,
}

fn default_critical() -> bool {
    true
}

impl ServiceDescriptor {
    pub fn new(name: impl Into<String>, critical: bool, recovery_rank: u32) -> Self {
        Self {
            name: name.into(),
            critical,
            recovery_rank,
        }
    }
}

/// Outcome of one recovery run
///
/// `attempted` lists every service that needed a start, so it overlaps with
/// `recovered` and `failed`; the other buckets are disjoint.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RecoveryResult {
    pub already_running: Vec<String>,
    pub recovered: Vec<String>,
    pub failed: Vec<String>,
    pub attempted: Vec<String>,
    pub success: bool,
}

impl RecoveryResult {
    pub fn summary(&self) -> String {
        if self.attempted.is_empty() {
            return "All services already running".to_string();
        }
        if self.success {
            format!("Recovered {} service(s)", self.recovered.len())
        } else {
            format!(
                "Recovered {} service(s); failed: {}",
                self.recovered.len(),
                self.failed.join(", ")
            )
        }
    }
}

/// Retry parameters for one run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryPolicy {
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub start_timeout: Duration,
}

impl Default for RecoveryPolicy {
    fn default() -> Self {
        Self::from(&RecoveryConfig::default())
    }
}

impl From<&RecoveryConfig> for RecoveryPolicy {
    fn from(config: &RecoveryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            retry_delay: config.retry_delay(),
            start_timeout: config.start_timeout(),
        }
    }
}

#[derive(Clone)]
pub struct RecoveryOrchestrator {
    control: Arc<dyn ServiceControl>,
    policy: RecoveryPolicy,
}

impl fmt::Debug for RecoveryOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecoveryOrchestrator")
            .field("policy", &self.policy)
            .finish()
    }
}

impl RecoveryOrchestrator {
    pub fn new(control: Arc<dyn ServiceControl>, policy: RecoveryPolicy) -> Self {
        Self { control, policy }
    }

    pub fn policy(&self) -> RecoveryPolicy {
        self.policy
    }

    /// Recover `services`, sleeping the calling thread between attempts
    pub fn recover(&self, services: &[ServiceDescriptor]) -> RecoveryResult {
        let pause = |delay: Duration| {
            std::thread::sleep(delay);
            Ok::<(), Infallible>(())
        };
        match self.run(services, pause, || Ok(())) {
            Ok(result) => result,
            Err(never) => match never {},
        }
    }

    /// Recover `services` from inside a unit of work
    ///
    /// Stops with [`WorkError::Cancelled`] at the next attempt boundary or
    /// during a retry delay once `ctx` is cancelled. A start call already in
    /// progress is not interrupted.
    pub fn recover_with(
        &self,
        services: &[ServiceDescriptor],
        ctx: &WorkContext,
    ) -> Result<RecoveryResult, WorkError> {
        self.run(services, |delay| ctx.sleep(delay), || ctx.check_cancelled())
    }

    fn run<E>(
        &self,
        services: &[ServiceDescriptor],
        mut pause: impl FnMut(Duration) -> Result<(), E>,
        checkpoint: impl Fn() -> Result<(), E>,
    ) -> Result<RecoveryResult, E> {
        let mut ordered = services.to_vec();
        ordered.sort_by_key(|service| service.recovery_rank);

        info!(
            services = ordered.len(),
            max_retries = self.policy.max_retries,
            retry_delay_ms = self.policy.retry_delay.as_millis() as u64,
            "Starting auto-recovery"
        );

        let started = Instant::now();
        let mut result = RecoveryResult {
            success: true,
            ..Default::default()
        };

        for service in &ordered {
            checkpoint()?;
            let name = service.name.as_str();

            if self.control.is_running(name) {
                debug!(service = %name, "Service already running");
                result.already_running.push(name.to_string());
                continue;
            }

            result.attempted.push(name.to_string());
            if self.start_with_retries(name, &mut pause, &checkpoint)? {
                result.recovered.push(name.to_string());
            } else {
                warn!(
                    service = %name,
                    attempts = self.policy.max_retries,
                    "Service could not be recovered; continuing with remaining services"
                );
                result.failed.push(name.to_string());
                result.success = false;
            }
        }

        info!(
            success = result.success,
            recovered = result.recovered.len(),
            failed = result.failed.len(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Auto-recovery finished"
        );

        Ok(result)
    }

    fn start_with_retries<E>(
        &self,
        name: &str,
        pause: &mut impl FnMut(Duration) -> Result<(), E>,
        checkpoint: &impl Fn() -> Result<(), E>,
    ) -> Result<bool, E> {
        for attempt in 1..=self.policy.max_retries {
            if attempt > 1 {
                pause(self.policy.retry_delay)?;
            }
            checkpoint()?;

            let accepted = self.control.start(name, self.policy.start_timeout);
            let running = self.control.is_running(name);
            info!(
                service = %name,
                attempt,
                max_retries = self.policy.max_retries,
                accepted,
                running,
                "Service start attempt"
            );

            if running {
                return Ok(true);
            }
        }
        Ok(false)
    }
}
