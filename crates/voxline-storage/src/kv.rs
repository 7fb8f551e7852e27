//! String key-value stores.
//!
//! The chat pipeline persists whole JSON documents under fixed keys
//! (`responses`, `messages`), so the storage contract is a plain
//! string-to-string map.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use rusqlite::OptionalExtension;

use voxline_core::error::VoxlineError;

use crate::db::Database;

/// Durable string key-value storage.
pub trait KvStore: Send + Sync {
    /// Read the value stored under `key`, if any.
    fn get(&self, key: &str) -> Result<Option<String>, VoxlineError>;

    /// Write `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> Result<(), VoxlineError>;

    /// Delete `key`. Deleting a missing key is not an error.
    fn remove(&self, key: &str) -> Result<(), VoxlineError>;
}

// =============================================================================
// SQLite
// =============================================================================

/// [`KvStore`] backed by the `kv_store` table.
#[derive(Debug, Clone)]
pub struct SqliteKvStore {
    db: Arc<Database>,
}

impl SqliteKvStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

impl KvStore for SqliteKvStore {
    fn get(&self, key: &str) -> Result<Option<String>, VoxlineError> {
        self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT value FROM kv_store WHERE key = ?1",
                rusqlite::params![key],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| VoxlineError::Storage(format!("Failed to read {}: {}", key, e)))
        })
    }

    fn set(&self, key: &str, value: &str) -> Result<(), VoxlineError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO kv_store (key, value, updated_at)
                 VALUES (?1, ?2, strftime('%s', 'now'))
                 ON CONFLICT(key) DO UPDATE SET
                    value = excluded.value,
                    updated_at = excluded.updated_at",
                rusqlite::params![key, value],
            )
            .map_err(|e| VoxlineError::Storage(format!("Failed to write {}: {}", key, e)))?;
            Ok(())
        })
    }

    fn remove(&self, key: &str) -> Result<(), VoxlineError> {
        self.db.with_conn(|conn| {
            conn.execute("DELETE FROM kv_store WHERE key = ?1", rusqlite::params![key])
                .map_err(|e| VoxlineError::Storage(format!("Failed to delete {}: {}", key, e)))?;
            Ok(())
        })
    }
}

// =============================================================================
// In-memory
// =============================================================================

/// Process-local [`KvStore`]; contents vanish with the process.
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, VoxlineError> {
        self.entries
            .lock()
            .map_err(|e| VoxlineError::Storage(format!("kv lock poisoned: {}", e)))
    }
}

impl KvStore for MemoryKvStore {
    fn get(&self, key: &str) -> Result<Option<String>, VoxlineError> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), VoxlineError> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), VoxlineError> {
        self.lock()?.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sqlite_store() -> SqliteKvStore {
        SqliteKvStore::new(Arc::new(Database::in_memory().unwrap()))
    }

    fn exercise(store: &dyn KvStore) {
        assert_eq!(store.get("responses").unwrap(), None);

        store.set("responses", "[]").unwrap();
        assert_eq!(store.get("responses").unwrap().as_deref(), Some("[]"));

        store.set("responses", "[1]").unwrap();
        assert_eq!(store.get("responses").unwrap().as_deref(), Some("[1]"));

        store.remove("responses").unwrap();
        assert_eq!(store.get("responses").unwrap(), None);

        // Removing twice is fine.
        store.remove("responses").unwrap();
    }

    #[test]
    fn test_sqlite_store_get_set_remove() {
        exercise(&sqlite_store());
    }

    #[test]
    fn test_memory_store_get_set_remove() {
        exercise(&MemoryKvStore::new());
    }

    #[test]
    fn test_sqlite_keys_are_independent() {
        let store = sqlite_store();
        store.set("responses", "a").unwrap();
        store.set("messages", "b").unwrap();
        store.remove("responses").unwrap();
        assert_eq!(store.get("messages").unwrap().as_deref(), Some("b"));
    }

    #[test]
    fn test_sqlite_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("voxline.db");
        {
            let store = SqliteKvStore::new(Arc::new(Database::new(&path).unwrap()));
            store.set("messages", r#"[{"role":"user"}]"#).unwrap();
        }
        let store = SqliteKvStore::new(Arc::new(Database::new(&path).unwrap()));
        assert_eq!(
            store.get("messages").unwrap().as_deref(),
            Some(r#"[{"role":"user"}]"#)
        );
    }

    #[test]
    fn test_sqlite_store_unicode_value() {
        let store = sqlite_store();
        store.set("messages", "caf\u{00e9} \u{1f3a4}").unwrap();
        assert_eq!(
            store.get("messages").unwrap().as_deref(),
            Some("caf\u{00e9} \u{1f3a4}")
        );
    }
}
