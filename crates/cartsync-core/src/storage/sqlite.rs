//! Durable key-value store on `SQLite`

use rusqlite::{params, OptionalExtension};
use std::path::Path;

use super::KeyValueStore;
use crate::db::Database;
use crate::error::{Error, Result};

/// `SQLite` implementation of `KeyValueStore`
pub struct SqliteStore {
    db: Database,
    quota_bytes: Option<usize>,
}

impl SqliteStore {
    /// Open (or create) the store at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            db: Database::open(path)?,
            quota_bytes: None,
        })
    }

    /// Open an in-memory store (useful for testing)
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            db: Database::open_in_memory()?,
            quota_bytes: None,
        })
    }

    /// Reject writes once stored values would exceed `quota_bytes`
    #[must_use]
    pub const fn with_quota(mut self, quota_bytes: usize) -> Self {
        self.quota_bytes = Some(quota_bytes);
        self
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.db.connection()?;
        let value = conn
            .query_row("SELECT value FROM kv WHERE key = ?", params![key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.db.connection()?;

        if let Some(quota) = self.quota_bytes {
            let used: i64 = conn.query_row(
                "SELECT COALESCE(SUM(LENGTH(CAST(value AS BLOB))), 0) FROM kv WHERE key != ?",
                params![key],
                |row| row.get(0),
            )?;
            let used = usize::try_from(used).unwrap_or(usize::MAX);
            if used.saturating_add(value.len()) > quota {
                return Err(Error::Storage("quota exceeded".into()));
            }
        }

        let now = chrono::Utc::now().timestamp_millis();
        conn.execute(
            "INSERT INTO kv (key, value, updated_at) VALUES (?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, now],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let conn = self.db.connection()?;
        conn.execute("DELETE FROM kv WHERE key = ?", params![key])?;
        Ok(())
    }
}
