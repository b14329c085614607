// src/recording/persistence.rs
//! Persisted event queue
//!
//! The queue lives in the durable store under a single key as a JSON array.
//! A commit appends the session buffer to it; a successful submission purges
//! it. Commits and purges through the same store handle are serialised;
//! separate processes sharing a store still race and the last write wins.
//!
//! Stored elements are never re-encoded. Appends merge at the JSON level, so
//! elements this crate would not have written survive every commit.

use crate::recording::event::{Event, SessionMarker};
use crate::recording::recorder::EventRecorder;
use crate::recording::storage::KeyValueStore;
use crate::utils::errors::Result;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// Key under which the queue is stored
pub const EVENTS_KEY: &str = "events";

/// Reads, appends to and purges the persisted queue
#[derive(Clone)]
pub struct EventPersistence {
    store: Arc<dyn KeyValueStore>,

    /// Held across every read-modify-write of the queue
    write_lock: Arc<Mutex<()>>,
}

impl EventPersistence {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Raw queue elements.
    ///
    /// An absent key, an unreadable store or a value that is not a JSON
    /// array all read as an empty queue.
    fn read_raw(&self) -> Vec<Value> {
        let raw = match self.store.get(EVENTS_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!("Failed to read persisted events: {}", e);
                return Vec::new();
            }
        };

        match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Array(elements)) => elements,
            Ok(_) => {
                warn!("Discarding persisted events: stored value is not an array");
                Vec::new()
            }
            Err(e) => {
                warn!("Discarding undecodable persisted events: {}", e);
                Vec::new()
            }
        }
    }

    /// Persisted events.
    ///
    /// Every object element is returned, whatever its field types. Elements
    /// that are not objects stay in the store but are skipped here.
    pub fn saved_events(&self) -> Vec<Event> {
        self.read_raw()
            .into_iter()
            .filter_map(|element| match element {
                Value::Object(fields) => Some(Event::from(fields)),
                other => {
                    debug!(element = %other, "Skipping non-object persisted element");
                    None
                }
            })
            .collect()
    }

    /// Append `pending` to the persisted queue. Returns the new queue length.
    pub fn append(&self, pending: &[Event]) -> Result<usize> {
        let _write = self.write_lock.lock();
        self.append_locked(pending)
    }

    fn append_locked(&self, pending: &[Event]) -> Result<usize> {
        let mut merged = self.read_raw();
        for event in pending {
            merged.push(serde_json::to_value(event)?);
        }

        let encoded = serde_json::to_string(&merged)?;
        self.store.set(EVENTS_KEY, &encoded)?;

        metrics::gauge!("telemetry_saved_events").set(merged.len() as f64);
        Ok(merged.len())
    }

    /// End the session and persist the buffer.
    ///
    /// Records `EndSession`, writes persisted ⧺ buffered, then drains the
    /// persisted events from the buffer. On a failed write the buffer is kept.
    /// Overlapping commits run one after the other, so each buffered event is
    /// written once.
    pub fn commit(&self, recorder: &EventRecorder) -> Result<usize> {
        let _write = self.write_lock.lock();
        recorder.record_marker(SessionMarker::EndSession);

        let pending = recorder.events();
        let total = self.append_locked(&pending)?;
        recorder.buffer().drain_front(pending.len());

        metrics::counter!("telemetry_commits_total").increment(1);
        debug!(committed = pending.len(), total, "Committed session events");
        Ok(total)
    }

    /// Remove the persisted queue; idempotent
    pub fn delete_saved_events(&self) -> Result<()> {
        let _write = self.write_lock.lock();
        self.store.remove(EVENTS_KEY)?;
        metrics::gauge!("telemetry_saved_events").set(0.0);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::recorder::ManualClock;
    use crate::recording::storage::MemoryStore;
    use crate::utils::errors::TrackerError;
    use std::thread;
    use std::time::Duration;

    fn setup() -> (EventPersistence, Arc<MemoryStore>, EventRecorder) {
        let store = Arc::new(MemoryStore::new());
        let persistence = EventPersistence::new(store.clone());
        let recorder = EventRecorder::with_clock(Arc::new(ManualClock::new(1_000)));
        (persistence, store, recorder)
    }

    #[test]
    fn test_absent_key_reads_empty() {
        let (persistence, _, _) = setup();
        assert!(persistence.saved_events().is_empty());
    }

    #[test]
    fn test_corrupted_value_reads_empty() {
        let (persistence, store, _) = setup();
        store.set(EVENTS_KEY, "{not json").unwrap();
        assert!(persistence.saved_events().is_empty());

        store.set(EVENTS_KEY, r#"{"e":"NotAnArray","t":1}"#).unwrap();
        assert!(persistence.saved_events().is_empty());
    }

    #[test]
    fn test_commit_appends_end_session() {
        let (persistence, _, recorder) = setup();
        recorder.record("Event1", None, None);

        let total = persistence.commit(&recorder).unwrap();
        assert_eq!(total, 2);

        let saved = persistence.saved_events();
        assert_eq!(saved.len(), 2);
        assert_eq!(saved[0].name, "Event1");
        assert_eq!(saved[1].name, "EndSession");
        assert_eq!(saved[1].context, None);
    }

    #[test]
    fn test_commit_persisted_first_ordering() {
        let (persistence, _, recorder) = setup();
        recorder.record("Old", None, None);
        persistence.commit(&recorder).unwrap();

        recorder.record("New", None, None);
        persistence.commit(&recorder).unwrap();

        let names: Vec<_> = persistence
            .saved_events()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, ["Old", "EndSession", "New", "EndSession"]);
    }

    #[test]
    fn test_commit_drains_buffer() {
        let (persistence, _, recorder) = setup();
        recorder.record("Event1", None, None);
        persistence.commit(&recorder).unwrap();
        assert!(recorder.events().is_empty());

        // A second commit adds only its own EndSession
        persistence.commit(&recorder).unwrap();
        assert_eq!(persistence.saved_events().len(), 3);
    }

    #[test]
    fn test_delete_round_trip_and_idempotence() {
        let (persistence, store, recorder) = setup();
        recorder.record("Event1", None, None);
        persistence.commit(&recorder).unwrap();

        persistence.delete_saved_events().unwrap();
        assert!(persistence.saved_events().is_empty());

        persistence.delete_saved_events().unwrap();
        assert!(!store.contains_key(EVENTS_KEY));
    }

    #[test]
    fn test_delete_leaves_buffer_alone() {
        let (persistence, _, recorder) = setup();
        recorder.record("Pending", None, None);
        persistence.delete_saved_events().unwrap();
        assert_eq!(recorder.events().len(), 1);
    }

    struct FailingStore;

    impl KeyValueStore for FailingStore {
        fn get(&self, _key: &str) -> Result<Option<String>> {
            Err(TrackerError::StorageFailed("unavailable".to_string()))
        }

        fn set(&self, _key: &str, _value: &str) -> Result<()> {
            Err(TrackerError::StorageFailed("quota exceeded".to_string()))
        }

        fn remove(&self, _key: &str) -> Result<()> {
            Err(TrackerError::StorageFailed("unavailable".to_string()))
        }
    }

    #[test]
    fn test_failed_write_keeps_buffer() {
        let persistence = EventPersistence::new(Arc::new(FailingStore));
        let recorder = EventRecorder::with_clock(Arc::new(ManualClock::new(1)));
        recorder.record("Event1", None, None);

        assert!(persistence.commit(&recorder).is_err());
        assert!(persistence.saved_events().is_empty());

        let names: Vec<_> = recorder.events().into_iter().map(|e| e.name).collect();
        assert_eq!(names, ["Event1", "EndSession"]);
    }

    #[test]
    fn test_foreign_elements_survive_commit() {
        let (persistence, store, recorder) = setup();
        let stored = serde_json::json!([
            {"e": "A", "t": 1},
            {"e": "B", "t": 2, "c": 5},
            {"e": "C", "t": 2.5},
            {"e": "D"},
            7
        ]);
        store.set(EVENTS_KEY, &stored.to_string()).unwrap();

        let names: Vec<_> = persistence
            .saved_events()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, ["A", "B", "C", "D"]);

        recorder.record("New", None, None);
        assert_eq!(persistence.commit(&recorder).unwrap(), 7);

        let raw: Vec<Value> = serde_json::from_str(&store.get(EVENTS_KEY).unwrap().unwrap()).unwrap();
        assert_eq!(raw.len(), 7);
        assert_eq!(Value::Array(raw[..5].to_vec()), stored);
        assert_eq!(raw[5]["e"], "New");
        assert_eq!(raw[6]["e"], "EndSession");
    }

    /// Store whose reads take long enough for commits to overlap
    struct SlowStore {
        inner: MemoryStore,
        delay: Duration,
    }

    impl KeyValueStore for SlowStore {
        fn get(&self, key: &str) -> Result<Option<String>> {
            thread::sleep(self.delay);
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> Result<()> {
            self.inner.set(key, value)
        }

        fn remove(&self, key: &str) -> Result<()> {
            self.inner.remove(key)
        }
    }

    #[test]
    fn test_overlapping_commits_write_each_event_once() {
        let store = Arc::new(SlowStore {
            inner: MemoryStore::new(),
            delay: Duration::from_millis(100),
        });
        let persistence = EventPersistence::new(store);
        let recorder = EventRecorder::with_clock(Arc::new(ManualClock::new(1)));
        recorder.record("A", None, None);

        thread::scope(|scope| {
            let first = persistence.clone();
            let first_recorder = recorder.clone();
            scope.spawn(move || first.commit(&first_recorder).unwrap());

            thread::sleep(Duration::from_millis(30));
            let second = persistence.clone();
            let second_recorder = recorder.clone();
            scope.spawn(move || second.commit(&second_recorder).unwrap());
        });

        let names: Vec<_> = persistence
            .saved_events()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, ["A", "EndSession", "EndSession"]);
        assert!(recorder.events().is_empty());
    }
}
