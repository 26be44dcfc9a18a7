//! Configuration Error Types
//!
//! Errors raised while loading or validating [`ConsoleConfig`](super::ConsoleConfig).
//! Validation failures name the offending field so an operator can fix the
//! file or environment variable without reading code.

use thiserror::Error;

/// Configuration-related errors with field context
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// A source could not be read or deserialized
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    /// Invalid configuration value
    #[error("Invalid value '{value}' for field '{field}': {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    /// Two service descriptors share a name
    #[error("Duplicate service '{name}' in services")]
    DuplicateService { name: String },
}

impl ConfigurationError {
    pub fn invalid_value(
        field: impl Into<String>,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            field: field.into(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

pub type ConfigResult<T> = Result<T, ConfigurationError>;
