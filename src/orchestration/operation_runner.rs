//! # Operation Runner
//!
//! The single entry point for administrative operations started from the GUI
//! or the CLI.
//!
//! ```text
//!   Idle ──try_acquire──► Guarded ──submit──► Polling ──complete──► Delivering ──drop token──► Idle
//!     ▲                      │                   │                                                │
//!     └──────────────────────┴─── submit / timer failure drops the token ─────────────────────────┘
//! ```
//!
//! The [`GuardToken`] travels inside the delivery closure handed to the
//! completion poller. Whether the closure runs, panics, or is dropped unrun
//! (presentation loop stopped), the token is dropped with it and the guard
//! returns to idle.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::operation_guard::{GuardSnapshot, OperationGuard, OperationPhase};
use crate::dispatch::{CompletionPoller, UiDispatcher};
use crate::error::{ConsoleError, Result};
use crate::execution::{WorkContext, WorkError, WorkerPool};

/// Receipt for a started operation
#[derive(Debug, Clone)]
pub struct OperationTicket {
    id: Uuid,
    name: String,
    started_at: DateTime<Utc>,
    cancellation: CancellationToken,
}

impl OperationTicket {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Stop waiting for the result; the work stops only if it checks its context
    ///
    /// The error callback receives [`WorkError::Cancelled`] and the guard is
    /// released after it returns.
    pub fn cancel(&self) {
        info!(operation_id = %self.id, operation = %self.name, "Operation cancellation requested");
        self.cancellation.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

/// Guard + pool + poller, wired together
#[derive(Debug, Clone)]
pub struct OperationRunner {
    guard: OperationGuard,
    pool: WorkerPool,
    poller: CompletionPoller,
}

impl OperationRunner {
    pub fn new(pool: WorkerPool, dispatcher: UiDispatcher, poll_interval: Duration) -> Self {
        Self {
            guard: OperationGuard::new(),
            pool,
            poller: CompletionPoller::new(dispatcher, poll_interval),
        }
    }

    /// True iff no operation is in flight; bind trigger enablement to this
    pub fn can_start(&self) -> bool {
        self.guard.can_start()
    }

    pub fn phase(&self) -> OperationPhase {
        self.guard.phase()
    }

    pub fn current_operation(&self) -> Option<String> {
        self.guard.current_operation()
    }

    pub fn snapshot(&self) -> GuardSnapshot {
        self.guard.snapshot()
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Run `work` in the background and deliver its outcome on the presentation thread
    ///
    /// Rejected with [`ConsoleError::GuardRejected`] while another operation is
    /// in flight. Otherwise exactly one of `on_success` / `on_error` is invoked
    /// on the presentation thread, after which the guard is released. The
    /// guard is also released if either callback panics.
    pub fn run<T, W, S, E>(&self, name: &str, work: W, on_success: S, on_error: E) -> Result<OperationTicket>
    where
        T: Send + 'static,
        W: FnOnce(WorkContext) -> anyhow::Result<T> + Send + 'static,
        S: FnOnce(T) + Send + 'static,
        E: FnOnce(WorkError) + Send + 'static,
    {
        let token = self.guard.try_acquire(name)?;

        let handle = self.pool.submit(name, work).map_err(|e| {
            error!(operation = %name, error = %e, "Failed to submit operation");
            ConsoleError::Submission(e.to_string())
        })?;

        let ticket = OperationTicket {
            id: token.id(),
            name: name.to_string(),
            started_at: handle.started_at(),
            cancellation: handle.cancellation_token(),
        };
        token.set_phase(OperationPhase::Polling);

        let operation_id = token.id();
        let operation = name.to_string();
        let deliver = move |outcome: std::result::Result<T, WorkError>| {
            token.set_phase(OperationPhase::Delivering);
            match outcome {
                Ok(value) => {
                    info!(operation_id = %operation_id, operation = %operation, "Operation succeeded");
                    on_success(value);
                }
                Err(work_error) => {
                    warn!(
                        operation_id = %operation_id,
                        operation = %operation,
                        error = %work_error,
                        "Operation failed"
                    );
                    on_error(work_error);
                }
            }
            drop(token);
        };

        self.poller.watch(handle, deliver).map_err(|e| {
            error!(operation = %name, error = %e, "Failed to start completion polling");
            ConsoleError::Dispatch(e)
        })?;

        info!(operation_id = %ticket.id, operation = %name, "Operation started");
        Ok(ticket)
    }
}
