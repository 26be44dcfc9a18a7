//! # Single-Flight Operation Guard
//!
//! Process-wide "an operation is running" state with RAII release.
//!
//! [`OperationGuard::try_acquire`] hands out at most one [`GuardToken`] at a
//! time. The token releases the guard when dropped, so every exit path
//! (normal return, error, panic unwinding, a callback that never runs)
//! returns the guard to idle without separate bookkeeping.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::ConsoleError;

/// Lifecycle of the operation currently holding the guard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OperationPhase {
    /// No operation in flight
    #[default]
    Idle,
    /// Guard acquired, work being submitted
    Guarded,
    /// Work in flight, completion timer active
    Polling,
    /// Timer stopped, outcome being delivered to the presentation thread
    Delivering,
}

impl OperationPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationPhase::Idle => "idle",
            OperationPhase::Guarded => "guarded",
            OperationPhase::Polling => "polling",
            OperationPhase::Delivering => "delivering",
        }
    }
}

impl std::fmt::Display for OperationPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
struct ActiveOperation {
    id: Uuid,
    name: String,
    acquired_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct GuardState {
    active: Option<ActiveOperation>,
    phase: OperationPhase,
}

/// Point-in-time view of the guard, for display and diagnostics only
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardSnapshot {
    pub phase: OperationPhase,
    pub operation_id: Option<Uuid>,
    pub operation: Option<String>,
    pub acquired_at: Option<DateTime<Utc>>,
}

/// Shared single-flight guard; clones observe the same state
#[derive(Debug, Clone, Default)]
pub struct OperationGuard {
    state: Arc<Mutex<GuardState>>,
}

impl OperationGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// True iff no operation holds the guard
    ///
    /// A snapshot for enabling triggers; correctness relies on `try_acquire`.
    pub fn can_start(&self) -> bool {
        self.state.lock().active.is_none()
    }

    pub fn phase(&self) -> OperationPhase {
        self.state.lock().phase
    }

    pub fn current_operation(&self) -> Option<String> {
        self.state.lock().active.as_ref().map(|op| op.name.clone())
    }

    pub fn snapshot(&self) -> GuardSnapshot {
        let state = self.state.lock();
        GuardSnapshot {
            phase: state.phase,
            operation_id: state.active.as_ref().map(|op| op.id),
            operation: state.active.as_ref().map(|op| op.name.clone()),
            acquired_at: state.active.as_ref().map(|op| op.acquired_at),
        }
    }

    /// Acquire the guard for `name`, or reject if another operation holds it
    pub fn try_acquire(&self, name: &str) -> Result<GuardToken, ConsoleError> {
        let mut state = self.state.lock();

        if let Some(running) = &state.active {
            warn!(
                requested = %name,
                running = %running.name,
                "Operation rejected: another operation is in progress"
            );
            return Err(ConsoleError::GuardRejected {
                requested: name.to_string(),
                running: running.name.clone(),
            });
        }

        let id = Uuid::new_v4();
        state.active = Some(ActiveOperation {
            id,
            name: name.to_string(),
            acquired_at: Utc::now(),
        });
        state.phase = OperationPhase::Guarded;
        drop(state);

        info!(operation_id = %id, operation = %name, "Operation guard acquired");

        Ok(GuardToken {
            guard: self.clone(),
            id,
            name: name.to_string(),
            released: false,
        })
    }

    fn release(&self, id: Uuid) -> bool {
        let mut state = self.state.lock();
        match &state.active {
            Some(active) if active.id == id => {
                state.active = None;
                state.phase = OperationPhase::Idle;
                true
            }
            _ => false,
        }
    }

    fn set_phase(&self, id: Uuid, phase: OperationPhase) {
        let mut state = self.state.lock();
        if state.active.as_ref().is_some_and(|active| active.id == id) {
            state.phase = phase;
        }
    }
}

/// Proof of guard ownership; releases the guard on drop
#[must_use = "dropping the token releases the operation guard immediately"]
#[derive(Debug)]
pub struct GuardToken {
    guard: OperationGuard,
    id: Uuid,
    name: String,
    released: bool,
}

impl GuardToken {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Advance the lifecycle phase reported by the guard
    pub fn set_phase(&self, phase: OperationPhase) {
        debug!(operation_id = %self.id, operation = %self.name, phase = %phase, "Operation phase changed");
        self.guard.set_phase(self.id, phase);
    }

    /// Release explicitly; dropping the token has the same effect
    pub fn release(mut self) {
        self.release_once();
    }

    fn release_once(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if self.guard.release(self.id) {
            info!(operation_id = %self.id, operation = %self.name, "Operation guard released");
        }
    }
}

impl Drop for GuardToken {
    fn drop(&mut self) {
        self.release_once();
    }
}
