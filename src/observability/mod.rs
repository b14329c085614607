// src/observability/mod.rs
//! Logging and metrics setup
//!
//! The library itself only emits `tracing` events and `metrics` samples.
//! Binaries call [`init_tracing`] once at startup; installing a metrics
//! recorder/exporter is left to the embedding application.

use crate::utils::config::LoggingConfig;
use crate::utils::errors::{Result, TrackerError};
use tracing_subscriber::EnvFilter;

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` takes precedence over the configured level. Logs go to stderr
/// so they never mix with submitted payloads on stdout.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| TrackerError::ObservabilityError(format!("Invalid log filter: {}", e)))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    let installed = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    installed.map_err(|e| TrackerError::ObservabilityError(e.to_string()))
}

/// Register descriptions for the metrics this crate emits
pub fn describe_metrics() {
    metrics::describe_counter!(
        "telemetry_events_recorded_total",
        "Events appended to session buffers"
    );
    metrics::describe_counter!(
        "telemetry_commits_total",
        "Successful commits of session buffers to the durable store"
    );
    metrics::describe_counter!(
        "telemetry_submissions_total",
        "Backlog submissions, labelled by outcome"
    );
    metrics::describe_gauge!(
        "telemetry_saved_events",
        "Events in the persisted queue after the last write"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_filter_rejected() {
        if std::env::var("RUST_LOG").is_ok() {
            return;
        }
        let config = LoggingConfig {
            level: "telemetry_buffer=verbose".to_string(),
            json: false,
        };
        assert!(matches!(
            init_tracing(&config),
            Err(TrackerError::ObservabilityError(_))
        ));
    }

    #[test]
    fn test_describe_metrics_without_recorder() {
        // No recorder installed: descriptions are dropped silently
        describe_metrics();
    }
}
