//! Error types for background execution.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

use super::async_handle::AsyncHandle;

/// Terminal failure of a unit of work
#[derive(Debug, Error)]
pub enum WorkError {
    /// The unit of work returned an error
    #[error("{0:#}")]
    Failed(anyhow::Error),

    /// The unit of work panicked; the worker survived
    #[error("Unit of work panicked: {0}")]
    Panicked(String),

    /// Cancellation was requested before the work produced a result
    #[error("Operation was cancelled")]
    Cancelled,

    /// The pool shut down before the work could run or finish
    #[error("Worker pool is shut down")]
    PoolClosed,
}

impl WorkError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, WorkError::Cancelled)
    }

    /// Recover a `WorkError` that was propagated through `anyhow` with `?`
    pub(crate) fn from_anyhow(error: anyhow::Error) -> Self {
        match error.downcast::<WorkError>() {
            Ok(work_error) => work_error,
            Err(error) => WorkError::Failed(error),
        }
    }
}

/// Failure of a blocking [`AsyncHandle::wait`]
///
/// A timeout hands the handle back: the work keeps running and the caller
/// decides whether to wait again or cancel.
#[derive(Error)]
pub enum WaitError<T> {
    #[error("Timed out after {waited:?}; work is still in flight")]
    Timeout {
        waited: Duration,
        handle: AsyncHandle<T>,
    },

    #[error(transparent)]
    Work(#[from] WorkError),
}

impl<T> WaitError<T> {
    pub fn is_timeout(&self) -> bool {
        matches!(self, WaitError::Timeout { .. })
    }

    /// Recover the still-running handle from a timeout
    pub fn into_handle(self) -> Option<AsyncHandle<T>> {
        match self {
            WaitError::Timeout { handle, .. } => Some(handle),
            WaitError::Work(_) => None,
        }
    }
}

impl<T> fmt::Debug for WaitError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaitError::Timeout { waited, handle } => f
                .debug_struct("Timeout")
                .field("waited", waited)
                .field("handle", handle)
                .finish(),
            WaitError::Work(err) => f.debug_tuple("Work").field(err).finish(),
        }
    }
}

/// Errors raised by the worker pool itself
#[derive(Debug, Error)]
pub enum WorkerPoolError {
    #[error("Worker pool is shut down; submission of '{label}' rejected")]
    ShutDown { label: String },

    #[error("Invalid worker pool configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Failed to build worker runtime: {0}")]
    RuntimeBuild(#[from] std::io::Error),
}
