//! # Async Handle
//!
//! Owned reference to one outstanding unit of background work.
//!
//! The handle exposes a non-blocking completion check, a blocking wait with
//! timeout, an async `join`, and cooperative cancellation. Every retrieving
//! method consumes the handle, so the outcome has exactly one reader.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::{Condvar, Mutex};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use super::errors::{WaitError, WorkError};

/// Shared completion slot written once by the pool and read once by the handle
pub(crate) struct Completion<T> {
    slot: Mutex<Option<Result<T, WorkError>>>,
    ready: Condvar,
    done: AtomicBool,
    notify: Notify,
}

impl<T> Completion<T> {
    pub(crate) fn new() -> Self {
        Self {
            slot: Mutex::new(None),
            ready: Condvar::new(),
            done: AtomicBool::new(false),
            notify: Notify::new(),
        }
    }

    /// Publish the outcome; the first writer wins
    pub(crate) fn complete(&self, outcome: Result<T, WorkError>) -> bool {
        let mut slot = self.slot.lock();
        if self.done.load(Ordering::Acquire) {
            return false;
        }
        *slot = Some(outcome);
        self.done.store(true, Ordering::Release);
        drop(slot);

        self.ready.notify_all();
        self.notify.notify_one();
        true
    }

    pub(crate) fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    /// Block until completed or `deadline`; returns whether the work completed
    fn wait_until(&self, deadline: Instant) -> bool {
        let mut slot = self.slot.lock();
        while !self.done.load(Ordering::Acquire) {
            if self.ready.wait_until(&mut slot, deadline).timed_out() {
                return self.done.load(Ordering::Acquire);
            }
        }
        true
    }

    fn take(&self) -> Option<Result<T, WorkError>> {
        self.slot.lock().take()
    }
}

/// Publishes `PoolClosed` if the pool task is dropped before producing an outcome
///
/// Guarantees every handle eventually completes, even when the runtime shuts
/// down with the work still queued.
pub(crate) struct CompletionGuard<T> {
    completion: Arc<Completion<T>>,
}

impl<T> CompletionGuard<T> {
    pub(crate) fn new(completion: Arc<Completion<T>>) -> Self {
        Self { completion }
    }

    pub(crate) fn complete(&self, outcome: Result<T, WorkError>) {
        self.completion.complete(outcome);
    }
}

impl<T> Drop for CompletionGuard<T> {
    fn drop(&mut self) {
        if !self.completion.is_done() {
            self.completion.complete(Err(WorkError::PoolClosed));
        }
    }
}

/// Handle to one unit of work submitted to the [`WorkerPool`](super::WorkerPool)
///
/// Dropping an unfinished handle cancels the work, which returns its
/// concurrency slot to the pool.
#[must_use = "an AsyncHandle must be waited on, joined, or cancelled"]
pub struct AsyncHandle<T> {
    id: Uuid,
    label: String,
    started_at: DateTime<Utc>,
    started: Instant,
    completion: Arc<Completion<T>>,
    token: CancellationToken,
}

impl<T> AsyncHandle<T> {
    pub(crate) fn new(
        id: Uuid,
        label: String,
        completion: Arc<Completion<T>>,
        token: CancellationToken,
    ) -> Self {
        Self {
            id,
            label,
            started_at: Utc::now(),
            started: Instant::now(),
            completion,
            token,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Wall-clock submission time
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Non-blocking completion check, safe to poll repeatedly
    pub fn is_complete(&self) -> bool {
        self.completion.is_done()
    }

    /// Token shared with the unit of work, for cancelling without owning the handle
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Block until the work completes or `timeout` elapses
    ///
    /// On timeout the handle is returned inside [`WaitError::Timeout`] and the
    /// work is left running. A zero timeout performs a non-blocking retrieval.
    pub fn wait(self, timeout: Duration) -> Result<T, WaitError<T>> {
        let deadline = Instant::now() + timeout;
        if !self.completion.wait_until(deadline) {
            debug!(
                operation_id = %self.id,
                label = %self.label,
                waited_ms = timeout.as_millis() as u64,
                "Wait timed out; work remains in flight"
            );
            return Err(WaitError::Timeout {
                waited: timeout,
                handle: self,
            });
        }
        self.take_outcome().map_err(WaitError::Work)
    }

    /// Await completion without blocking a thread
    pub async fn join(self) -> Result<T, WorkError> {
        while !self.completion.is_done() {
            self.completion.notify.notified().await;
        }
        self.take_outcome()
    }

    /// Request cooperative cancellation and discard the outcome
    pub fn cancel(self) {
        debug!(operation_id = %self.id, label = %self.label, "Cancellation requested");
        self.token.cancel();
    }

    fn take_outcome(&self) -> Result<T, WorkError> {
        self.completion.take().unwrap_or(Err(WorkError::PoolClosed))
    }
}

impl<T> Drop for AsyncHandle<T> {
    fn drop(&mut self) {
        if !self.completion.is_done() {
            self.token.cancel();
        }
    }
}

impl<T> fmt::Debug for AsyncHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncHandle")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("started_at", &self.started_at)
            .field("complete", &self.is_complete())
            .finish()
    }
}
