// src/recording/mod.rs
//! Event recording and persistence
//!
//! - **Event**: the flat `{e, t, c, ...}` record
//! - **Buffer**: session-local ordered event buffer
//! - **Recorder**: builds events and appends them to the buffer
//! - **Storage**: synchronous key-value backends (memory, SQLite)
//! - **Persistence**: the persisted queue under the `events` key
//!
//! # Architecture
//!
//! ```text
//! record() → EventBuffer (memory)
//!                 ↓  commit() on unload
//!         persisted ⧺ buffered
//!                 ↓
//!         KeyValueStore["events"]
//! ```

pub mod buffer;
pub mod event;
pub mod persistence;
pub mod recorder;
pub mod storage;

// Re-export commonly used types
pub use buffer::{BufferStats, EventBuffer};
pub use event::{Event, Fields, SessionMarker};
pub use persistence::{EventPersistence, EVENTS_KEY};
pub use recorder::{Clock, EventRecorder, ManualClock, SystemClock};
pub use storage::{open_store, KeyValueStore, MemoryStore, SqliteStore, StorageBackend, StorageConfig};
