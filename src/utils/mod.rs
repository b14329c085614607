// src/utils/mod.rs
//! Shared configuration and error types

pub mod config;
pub mod errors;

pub use self::config::{LoggingConfig, SubmissionConfig, TrackerConfig};
pub use self::errors::{Result, TrackerError};
