// src/recording/storage.rs
//! Durable key-value storage
//!
//! The tracker only needs a synchronous string-keyed get/set/remove interface.
//! Two backends are provided:
//!
//! - [`MemoryStore`]: process-local map, for tests and ephemeral sessions
//! - [`SqliteStore`]: single-table SQLite database that survives restarts

use crate::utils::errors::{Result, TrackerError};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Synchronous string-keyed store
///
/// Implementations are shared between the tracker and its lifecycle hooks, so
/// they must be safe to call from any thread.
pub trait KeyValueStore: Send + Sync {
    /// Read a value; `None` when the key is absent
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a value, replacing any previous one
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a key; removing an absent key is not an error
    fn remove(&self, key: &str) -> Result<()>;
}

/// Storage backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// In-process map, lost on exit
    #[default]
    Memory,

    /// SQLite database file
    Sqlite,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Which backend to open
    pub backend: StorageBackend,

    /// SQLite database file (ignored by the memory backend)
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            path: PathBuf::from("telemetry.db"),
        }
    }
}

/// Open the store described by `config`
pub fn open_store(config: &StorageConfig) -> Result<Arc<dyn KeyValueStore>> {
    match config.backend {
        StorageBackend::Memory => Ok(Arc::new(MemoryStore::new())),
        StorageBackend::Sqlite => Ok(Arc::new(SqliteStore::open(&config.path)?)),
    }
}

/// In-memory store
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.lock().contains_key(key)
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

/// SQLite-backed store
pub struct SqliteStore {
    db: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl SqliteStore {
    /// Open (or create) a database file
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                TrackerError::StorageFailed(format!("Failed to create directory: {}", e))
            })?;
        }

        let conn = Connection::open(path).map_err(|e| {
            TrackerError::StorageFailed(format!("Failed to open database: {}", e))
        })?;

        let store = Self {
            db: Mutex::new(conn),
            path: Some(path.to_path_buf()),
        };
        store.init_schema()?;

        info!("Key-value store opened at {:?}", path);
        Ok(store)
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            db: Mutex::new(conn),
            path: None,
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Database file, if any
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn init_schema(&self) -> Result<()> {
        let db = self.db.lock();

        db.execute(
            r#"
            CREATE TABLE IF NOT EXISTS kv_store (
                key TEXT PRIMARY KEY NOT NULL,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            )
            "#,
            [],
        )
        .map_err(|e| TrackerError::StorageFailed(format!("Schema creation failed: {}", e)))?;

        Ok(())
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let db = self.db.lock();
        let value = db
            .query_row(
                "SELECT value FROM kv_store WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| TrackerError::StorageFailed(format!("Read of {} failed: {}", key, e)))?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let db = self.db.lock();
        db.execute(
            r#"
            INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
            params![key, value, chrono::Utc::now().timestamp()],
        )
        .map_err(|e| TrackerError::StorageFailed(format!("Write of {} failed: {}", key, e)))?;

        debug!("Wrote {} ({} bytes)", key, value.len());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let db = self.db.lock();
        db.execute("DELETE FROM kv_store WHERE key = ?1", params![key])
            .map_err(|e| TrackerError::StorageFailed(format!("Delete of {} failed: {}", key, e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn exercise(store: &dyn KeyValueStore) {
        assert_eq!(store.get("events").unwrap(), None);

        store.set("events", "[]").unwrap();
        assert_eq!(store.get("events").unwrap().as_deref(), Some("[]"));

        store.set("events", "[1]").unwrap();
        assert_eq!(store.get("events").unwrap().as_deref(), Some("[1]"));

        store.remove("events").unwrap();
        store.remove("events").unwrap();
        assert_eq!(store.get("events").unwrap(), None);
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryStore::new();
        exercise(&store);
        assert!(store.is_empty());
    }

    #[test]
    fn test_sqlite_in_memory() {
        let store = SqliteStore::open_in_memory().unwrap();
        exercise(&store);
        assert!(store.path().is_none());
    }

    #[test]
    fn test_sqlite_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("telemetry.db");

        {
            let store = SqliteStore::open(&path).unwrap();
            store.set("events", r#"[{"e":"Event1","t":1}]"#).unwrap();
        }

        let reopened = SqliteStore::open(&path).unwrap();
        assert_eq!(
            reopened.get("events").unwrap().as_deref(),
            Some(r#"[{"e":"Event1","t":1}]"#)
        );
    }

    #[test]
    fn test_open_store_from_config() {
        let dir = tempdir().unwrap();
        let config = StorageConfig {
            backend: StorageBackend::Sqlite,
            path: dir.path().join("kv.db"),
        };

        let store = open_store(&config).unwrap();
        store.set("k", "v").unwrap();
        assert!(config.path.exists());

        let memory = open_store(&StorageConfig::default()).unwrap();
        assert_eq!(memory.get("k").unwrap(), None);
    }
}
