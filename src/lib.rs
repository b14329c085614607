// src/lib.rs
//! Telemetry Buffer Library
//!
//! Accumulates lightweight, timestamped usage events during a session,
//! persists them durably across restarts, and hands the backlog to a
//! caller-supplied submitter once it grows past a threshold.
//!
//! # Architecture
//!
//! The crate is structured into several key modules:
//!
//! - **recording**: event model, session buffer, recorder, key-value storage, persisted queue
//! - **runtime**: host lifecycle signals, environment metadata, session bindings, submission scheduler
//! - **tracker**: the public `Tracker` facade
//! - **observability**: tracing subscriber and metric descriptions
//! - **utils**: configuration and error types
//!
//! # Event lifecycle
//!
//! ```text
//! record → buffer → (unload) commit → persisted queue
//!                                          ↓ next init, backlog > threshold
//!                                  submit after 3s → purge
//! ```

// Public module exports
pub mod observability;
pub mod recording;
pub mod runtime;
pub mod tracker;
pub mod utils;

// Re-export commonly used types
pub use recording::{Event, Fields, KeyValueStore, MemoryStore, SessionMarker, SqliteStore};
pub use runtime::{
    HostEnvironment, HostLifecycle, InitOptions, LocalHost, SubmissionOutcome, Submitter, UserInfo,
    Visibility,
};
pub use tracker::{InitReport, Tracker, TrackerBuilder};
pub use utils::config::TrackerConfig;
pub use utils::errors::{Result, TrackerError};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
