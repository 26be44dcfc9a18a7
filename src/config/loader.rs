//! Configuration Loader
//!
//! Layers defaults, an optional TOML file and `ADMIN_CONSOLE_*` environment
//! variables, then validates the merged result.

use std::collections::HashMap;
use std::path::Path;

use config::{Config, Environment, File};
use tracing::{debug, info};

use super::error::ConfigResult;
use super::ConsoleConfig;

/// Searched relative to the working directory when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "config/admin_console";

/// Environment variable prefix; nested keys are separated by `__`
pub const ENV_PREFIX: &str = "ADMIN_CONSOLE";

impl ConsoleConfig {
    /// Load from the default file location and the process environment
    pub fn load() -> ConfigResult<Self> {
        Self::load_from(None)
    }

    /// Load with an explicit file; a missing explicit file is an error
    pub fn load_from(path: Option<&Path>) -> ConfigResult<Self> {
        Self::load_with_env(path, None)
    }

    /// Load with an explicit environment map instead of the process environment
    ///
    /// Keys use the same `ADMIN_CONSOLE_SECTION__FIELD` shape as real variables.
    pub fn load_with_env(
        path: Option<&Path>,
        env: Option<HashMap<String, String>>,
    ) -> ConfigResult<Self> {
        let file = match path {
            Some(path) => {
                debug!(path = %path.display(), "Loading configuration file");
                File::from(path).required(true)
            }
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let environment = Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
            .source(env);

        let merged = Config::builder()
            .add_source(Config::try_from(&ConsoleConfig::default())?)
            .add_source(file)
            .add_source(environment)
            .build()?;

        let config: ConsoleConfig = merged.try_deserialize()?;
        config.validate()?;

        info!(
            max_concurrency = config.worker_pool.max_concurrency,
            poll_interval_ms = config.dispatch.poll_interval_ms,
            max_retries = config.recovery.max_retries,
            retry_delay_ms = config.recovery.retry_delay_ms,
            services = config.services.len(),
            "Configuration loaded"
        );

        Ok(config)
    }
}
