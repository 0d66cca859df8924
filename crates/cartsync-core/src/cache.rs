//! Local snapshot cache

use serde_json::Value;

use crate::error::Result;
use crate::models::{decode_snapshot, encode_snapshot, CartData, CartSnapshot};
use crate::storage::{KeyValueStore, StorageKeys};
use crate::util::is_older_than;

/// Remove the snapshot, the offline queue and the sync status together
///
/// A queue built against a snapshot is meaningless without it, so the three
/// keys are never cleared individually. Every key is attempted even if an
/// earlier removal fails; the first error is returned.
pub fn clear_local_state<S: KeyValueStore>(store: &S, keys: &StorageKeys) -> Result<()> {
    let mut first_error = None;
    for key in keys.all() {
        if let Err(error) = store.remove(key) {
            tracing::warn!("Failed to remove {key}: {error}");
            first_error.get_or_insert(error);
        }
    }
    first_error.map_or(Ok(()), Err)
}

/// Persists the cart snapshot for one user with a time-to-live
pub struct LocalCache<'a, S> {
    store: &'a S,
    keys: &'a StorageKeys,
    ttl_ms: i64,
}

impl<'a, S: KeyValueStore> LocalCache<'a, S> {
    pub const fn new(store: &'a S, keys: &'a StorageKeys, ttl_ms: i64) -> Self {
        Self {
            store,
            keys,
            ttl_ms,
        }
    }

    /// Stamp and persist `data`, returning the stored snapshot
    ///
    /// The stamp never moves backwards relative to the snapshot already
    /// stored, even if the wall clock does.
    pub fn save(&self, data: CartData, now: i64) -> Result<CartSnapshot> {
        let timestamp = self.stored_timestamp().map_or(now, |previous| previous.max(now));
        let snapshot = CartSnapshot::new(data, timestamp);
        self.store
            .set(&self.keys.snapshot, &encode_snapshot(&snapshot)?)?;
        tracing::debug!(
            "Saved cart snapshot ({} cart, {} saved, {} wishlist)",
            snapshot.data.cart_items.len(),
            snapshot.data.saved_items.len(),
            snapshot.data.wishlist_items.len()
        );
        Ok(snapshot)
    }

    /// Load the snapshot if present, readable and fresh
    ///
    /// Corrupt or expired snapshots are purged together with the queue and
    /// status before `None` is returned.
    pub fn load(&self, now: i64) -> Option<CartSnapshot> {
        let raw = match self.store.get(&self.keys.snapshot) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(error) => {
                tracing::warn!("Failed to read cart snapshot: {error}");
                return None;
            }
        };

        let snapshot = match decode_snapshot(&raw) {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => return None,
            Err(error) => {
                tracing::warn!("Discarding corrupt cart snapshot: {error}");
                self.clear_quietly();
                return None;
            }
        };

        if is_older_than(snapshot.timestamp, self.ttl_ms, now) {
            tracing::info!("Discarding expired cart snapshot from {}", snapshot.timestamp);
            self.clear_quietly();
            return None;
        }

        Some(snapshot)
    }

    /// Remove all local cart state for this user
    pub fn clear(&self) -> Result<()> {
        clear_local_state(self.store, self.keys)?;
        tracing::debug!("Cleared local cart state");
        Ok(())
    }

    fn clear_quietly(&self) {
        if let Err(error) = self.clear() {
            tracing::warn!("Failed to clear local cart state: {error}");
        }
    }

    fn stored_timestamp(&self) -> Option<i64> {
        let raw = self.store.get(&self.keys.snapshot).ok()??;
        serde_json::from_str::<Value>(&raw)
            .ok()?
            .get("timestamp")?
            .as_i64()
    }
}
