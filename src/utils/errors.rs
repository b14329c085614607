// src/utils/errors.rs
//! Error types for the telemetry buffer
//!
//! Errors are propagated inside the storage, persistence and configuration
//! layers. The [`Tracker`](crate::tracker::Tracker) facade logs them and
//! degrades to a no-op so tracking never breaks the host application.

use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, TrackerError>;

/// Errors raised by the telemetry buffer
#[derive(Error, Debug)]
pub enum TrackerError {
    /// The durable key-value store rejected an operation
    #[error("Storage failed: {0}")]
    StorageFailed(String),

    /// An event batch could not be encoded
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration could not be loaded or is invalid
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Logging or metrics could not be initialized
    #[error("Observability initialization failed: {0}")]
    ObservabilityError(String),
}

impl From<::config::ConfigError> for TrackerError {
    fn from(err: ::config::ConfigError) -> Self {
        TrackerError::ConfigError(err.to_string())
    }
}

impl From<rusqlite::Error> for TrackerError {
    fn from(err: rusqlite::Error) -> Self {
        TrackerError::StorageFailed(err.to_string())
    }
}
