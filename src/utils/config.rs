// src/utils/config.rs
//! Tracker configuration
//!
//! Configuration is layered with the `config` crate:
//!
//! 1. Built-in defaults
//! 2. Optional config file (`telemetry.toml`, or the path in `TELEMETRY_CONFIG`)
//! 3. Environment variables prefixed with `TELEMETRY_`, using `__` for nesting
//!    (e.g. `TELEMETRY_SUBMISSION__MAX_EVENTS_LIMIT_UNTIL_SUBMIT=250`)

use crate::recording::storage::StorageConfig;
use crate::runtime::scheduler::{InitOptions, DEFAULT_MAX_EVENTS_LIMIT_UNTIL_SUBMIT};
use crate::utils::errors::Result;
use ::config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default config file name, looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "telemetry.toml";

/// Environment variable overriding the config file location
pub const CONFIG_PATH_ENV: &str = "TELEMETRY_CONFIG";

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Backlog submission settings
    pub submission: SubmissionConfig,

    /// Durable store settings
    pub storage: StorageConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

/// Backlog submission settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SubmissionConfig {
    /// Persisted backlog size above which a submission is scheduled
    #[serde(alias = "maxEventsLimitUntilSubmit")]
    pub max_events_limit_until_submit: usize,
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            max_events_limit_until_submit: DEFAULT_MAX_EVENTS_LIMIT_UNTIL_SUBMIT,
        }
    }
}

impl From<&SubmissionConfig> for InitOptions {
    fn from(config: &SubmissionConfig) -> Self {
        InitOptions {
            max_events_limit_until_submit: Some(config.max_events_limit_until_submit),
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl TrackerConfig {
    /// Load configuration from the default file location and the environment
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        Self::load_from(Path::new(&path))
    }

    /// Load configuration from a specific file (which may be absent) and the environment
    pub fn load_from(path: &Path) -> Result<Self> {
        let settings = Config::builder()
            .add_source(File::from(path).required(false))
            .add_source(
                Environment::with_prefix("TELEMETRY")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: TrackerConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.logging.level.trim().is_empty() {
            return Err(crate::utils::errors::TrackerError::ConfigError(
                "logging.level cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}
