//! In-memory key-value store

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use super::KeyValueStore;
use crate::error::{Error, Result};

/// Process-local store; clones share the same contents
///
/// Can emulate a storage quota and disabled storage (private browsing)
/// so callers can exercise the degraded paths.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
    quota_bytes: Option<usize>,
    disabled: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject writes once stored values would exceed `quota_bytes`
    #[must_use]
    pub const fn with_quota(mut self, quota_bytes: usize) -> Self {
        self.quota_bytes = Some(quota_bytes);
        self
    }

    /// Make every operation fail as if storage were unavailable
    pub fn set_disabled(&self, disabled: bool) {
        self.disabled.store(disabled, Ordering::SeqCst);
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.lock().is_ok_and(|entries| entries.contains_key(key))
    }

    pub fn len(&self) -> usize {
        self.lock().map_or(0, |entries| entries.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, String>>> {
        if self.disabled.load(Ordering::SeqCst) {
            return Err(Error::Storage("storage is disabled".into()));
        }
        self.entries
            .lock()
            .map_err(|_| Error::Storage("memory store lock poisoned".into()))
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.lock()?;
        if let Some(quota) = self.quota_bytes {
            let used: usize = entries
                .iter()
                .filter(|(existing, _)| existing.as_str() != key)
                .map(|(_, stored)| stored.len())
                .sum();
            if used + value.len() > quota {
                return Err(Error::Storage("quota exceeded".into()));
            }
        }
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_remove() {
        let store = MemoryStore::new();
        store.set("a", "1").unwrap();
        assert_eq!(store.get("a").unwrap().as_deref(), Some("1"));
        store.remove("a").unwrap();
        assert_eq!(store.get("a").unwrap(), None);
        store.remove("a").unwrap();
    }

    #[test]
    fn test_clones_share_contents() {
        let store = MemoryStore::new();
        let handle = store.clone();
        store.set("a", "1").unwrap();
        assert!(handle.contains_key("a"));
    }

    #[test]
    fn test_quota_rejects_large_writes() {
        let store = MemoryStore::new().with_quota(8);
        store.set("a", "12345").unwrap();
        assert!(matches!(store.set("b", "12345"), Err(Error::Storage(_))));
        // Replacing a value only counts the new size
        store.set("a", "12345678").unwrap();
    }

    #[test]
    fn test_disabled_store_fails() {
        let store = MemoryStore::new();
        store.set_disabled(true);
        assert!(store.get("a").is_err());
        assert!(store.set("a", "1").is_err());
        store.set_disabled(false);
        assert!(store.get("a").unwrap().is_none());
    }
}
