//! # Console Errors
//!
//! Top-level error taxonomy surfaced to console callers (GUI commands and the CLI).
//! Lower layers keep their own error enums (`WorkError`, `DispatchError`,
//! `ConfigurationError`) and convert into [`ConsoleError`] at the boundary.
//!
//! Probe failures and services that fail to recover are data, not errors:
//! they are reported as health warnings and in `RecoveryResult::failed`.

use std::time::Duration;
use thiserror::Error;

use crate::config::ConfigurationError;
use crate::dispatch::DispatchError;
use crate::execution::WorkError;

/// Errors returned by the console entry points
#[derive(Debug, Error)]
pub enum ConsoleError {
    /// Another administrative operation holds the single-flight guard
    #[error("Cannot start '{requested}': operation '{running}' is already in progress")]
    GuardRejected { requested: String, running: String },

    /// A blocking wait exceeded its deadline; the work is still in flight
    #[error("Timed out after {waited:?} waiting for '{operation}'")]
    Timeout { operation: String, waited: Duration },

    /// The presentation thread could not run an action
    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    /// The unit of work failed, panicked or was cancelled
    #[error("Operation failed: {0}")]
    Work(#[from] WorkError),

    /// The worker pool refused the submission
    #[error("Submission error: {0}")]
    Submission(String),

    /// Configuration could not be loaded or validated
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// A report could not be rendered for output
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ConsoleError {
    /// Whether this error is a benign single-flight rejection rather than a failure
    pub fn is_rejection(&self) -> bool {
        matches!(self, ConsoleError::GuardRejected { .. })
    }
}

pub type Result<T> = std::result::Result<T, ConsoleError>;
