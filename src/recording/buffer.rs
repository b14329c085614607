// src/recording/buffer.rs
//! In-memory session event buffer
//!
//! Holds the events recorded in the current execution context, in insertion
//! order, until they are committed to the durable store. The buffer is
//! internally synchronized so a tracker can be shared across tasks.

use crate::recording::event::Event;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// Ordered, session-local event buffer
#[derive(Debug, Default)]
pub struct EventBuffer {
    /// Buffered events in insertion order
    events: Mutex<Vec<Event>>,

    /// Total events appended
    push_count: AtomicU64,

    /// Total events removed by drains
    drain_count: AtomicU64,

    /// Total explicit clears
    clear_count: AtomicU64,
}

impl EventBuffer {
    /// Create an empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event.
    ///
    /// Timestamps never decrease within the buffer: an event stamped earlier
    /// than the last buffered one is clamped to it. Returns the stored timestamp.
    pub fn push(&self, mut event: Event) -> i64 {
        let mut events = self.events.lock();
        if let Some(last) = events.last() {
            if event.timestamp < last.timestamp {
                event.timestamp = last.timestamp;
            }
        }
        let timestamp = event.timestamp;
        events.push(event);
        self.push_count.fetch_add(1, Ordering::Relaxed);
        timestamp
    }

    /// Independent copy of the buffered events
    pub fn snapshot(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    /// Remove the first `count` events (those already persisted).
    ///
    /// Events appended after the snapshot was taken stay in the buffer.
    pub fn drain_front(&self, count: usize) -> usize {
        let mut events = self.events.lock();
        let count = count.min(events.len());
        events.drain(..count);
        self.drain_count.fetch_add(count as u64, Ordering::Relaxed);
        count
    }

    /// Remove every buffered event
    pub fn clear(&self) {
        self.events.lock().clear();
        self.clear_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Get buffer statistics
    pub fn stats(&self) -> BufferStats {
        BufferStats {
            push_count: self.push_count.load(Ordering::Relaxed),
            drain_count: self.drain_count.load(Ordering::Relaxed),
            clear_count: self.clear_count.load(Ordering::Relaxed),
            current_size: self.len(),
        }
    }
}

/// Buffer statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BufferStats {
    /// Total events appended
    pub push_count: u64,

    /// Total events drained after a commit
    pub drain_count: u64,

    /// Total explicit clears
    pub clear_count: u64,

    /// Current buffer size
    pub current_size: usize,
}
