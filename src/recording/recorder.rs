// src/recording/recorder.rs
//! Event recorder
//!
//! Builds event records (name, timestamp, optional context, optional extra
//! fields) and appends them to the session buffer. Recording never fails.

use crate::recording::buffer::{BufferStats, EventBuffer};
use crate::recording::event::{Event, Fields, SessionMarker};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tracing::trace;

/// Source of event timestamps
pub trait Clock: Send + Sync {
    /// Current time in whole seconds since epoch
    fn now_secs(&self) -> i64;
}

/// Wall clock backed by `chrono::Utc`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_secs(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// Manually driven clock for deterministic tests and replays
#[derive(Debug, Default)]
pub struct ManualClock {
    secs: AtomicI64,
}

impl ManualClock {
    pub fn new(secs: i64) -> Self {
        Self {
            secs: AtomicI64::new(secs),
        }
    }

    pub fn set(&self, secs: i64) {
        self.secs.store(secs, Ordering::SeqCst);
    }

    pub fn advance(&self, secs: i64) {
        self.secs.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_secs(&self) -> i64 {
        self.secs.load(Ordering::SeqCst)
    }
}

/// Records events into a session buffer
#[derive(Clone)]
pub struct EventRecorder {
    buffer: Arc<EventBuffer>,
    clock: Arc<dyn Clock>,
}

impl EventRecorder {
    /// Create a recorder with an empty buffer and the system clock
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create a recorder with an empty buffer and a custom clock
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            buffer: Arc::new(EventBuffer::new()),
            clock,
        }
    }

    /// Record an event.
    ///
    /// The timestamp is taken from the clock; an empty `context` is treated as
    /// absent. Extra fields are merged into the event, see [`Event::with_field`].
    pub fn record(&self, name: &str, context: Option<&str>, extra: Option<Fields>) {
        let mut event = Event::new(name, self.clock.now_secs());
        if let Some(context) = context {
            event = event.with_context(context);
        }
        if let Some(extra) = extra {
            event = event.with_fields(extra);
        }

        let timestamp = self.buffer.push(event);
        metrics::counter!("telemetry_events_recorded_total").increment(1);
        trace!(event = name, timestamp, "Recorded event");
    }

    /// Record one of the tracker's own session markers
    pub fn record_marker(&self, marker: SessionMarker) {
        self.record(marker.as_str(), None, None);
    }

    /// Snapshot of the buffered events in insertion order
    pub fn events(&self) -> Vec<Event> {
        self.buffer.snapshot()
    }

    /// Empty the buffer
    pub fn clear_events(&self) {
        self.buffer.clear();
    }

    /// Underlying buffer
    pub fn buffer(&self) -> &EventBuffer {
        &self.buffer
    }

    /// Get buffer statistics
    pub fn stats(&self) -> BufferStats {
        self.buffer.stats()
    }
}

impl Default for EventRecorder {
    fn default() -> Self {
        Self::new()
    }
}
