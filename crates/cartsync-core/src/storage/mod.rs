//! Client-side key-value storage backends.

mod keys;
mod memory;
mod sqlite;

pub use keys::StorageKeys;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::error::Result;

/// Durable string key-value storage on the client
///
/// Reads and writes are synchronous. Implementations report quota or
/// availability problems as `Error::Storage`.
pub trait KeyValueStore {
    /// Read a value, `None` when the key is absent
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a value, replacing any previous one
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a key; removing an absent key is not an error
    fn remove(&self, key: &str) -> Result<()>;
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for &T {
    fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<()> {
        (**self).remove(key)
    }
}
