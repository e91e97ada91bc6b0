//! Durable key-value side store.

use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use dashmap::DashMap;
use rusqlite::{Connection, OptionalExtension, params};

use crate::sync::core::errors::{SyncError, SyncResult};
use crate::sync::core::ids::now_millis;

/// String key-value store that survives restarts.
pub trait KeyValueStore: Send + Sync {
    /// Read a value.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn get(&self, key: &str) -> SyncResult<Option<String>>;

    /// Write a value, replacing any previous one.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn set(&self, key: &str, value: &str) -> SyncResult<()>;

    /// Delete a value.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn remove(&self, key: &str) -> SyncResult<()>;
}

/// `SQLite` implementation of the key-value store.
pub struct SqliteKeyValueStore {
    conn: Mutex<Connection>,
    table: String,
}

impl SqliteKeyValueStore {
    /// Open (or create) the store at `path`.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or the table name
    /// is not a plain identifier.
    pub fn open(path: &Path, table: &str) -> SyncResult<Self> {
        Self::init(Connection::open(path)?, table)
    }

    /// Open a private in-memory database.
    ///
    /// # Errors
    /// Returns an error if the table cannot be created.
    pub fn open_in_memory(table: &str) -> SyncResult<Self> {
        Self::init(Connection::open_in_memory()?, table)
    }

    fn init(conn: Connection, table: &str) -> SyncResult<Self> {
        if table.is_empty() || !table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(SyncError::InvalidConfig(format!(
                "invalid side-store table name: {table:?}"
            )));
        }
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            )"
        ))?;
        Ok(Self {
            conn: Mutex::new(conn),
            table: table.to_string(),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl KeyValueStore for SqliteKeyValueStore {
    fn get(&self, key: &str) -> SyncResult<Option<String>> {
        let table = &self.table;
        let value = self
            .lock()
            .query_row(
                &format!("SELECT value FROM {table} WHERE key = ?1"),
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> SyncResult<()> {
        let table = &self.table;
        self.lock().execute(
            &format!(
                "INSERT OR REPLACE INTO {table} (key, value, updated_at) VALUES (?1, ?2, ?3)"
            ),
            params![key, value, now_millis()],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> SyncResult<()> {
        let table = &self.table;
        self.lock()
            .execute(&format!("DELETE FROM {table} WHERE key = ?1"), params![key])?;
        Ok(())
    }
}

/// In-memory implementation, for tests and ephemeral sessions.
#[derive(Default)]
pub struct MemoryKeyValueStore {
    entries: DashMap<String, String>,
}

impl MemoryKeyValueStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: &str) -> SyncResult<Option<String>> {
        Ok(self.entries.get(key).map(|value| value.clone()))
    }

    fn set(&self, key: &str, value: &str) -> SyncResult<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> SyncResult<()> {
        self.entries.remove(key);
        Ok(())
    }
}
