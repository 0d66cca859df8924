//! Sync status register

use crate::cache::clear_local_state;
use crate::error::Result;
use crate::models::{SyncState, SyncStatus};
use crate::storage::{KeyValueStore, StorageKeys};

/// Reads and writes the persisted sync status for one user
pub struct SyncStatusTracker<'a, S> {
    store: &'a S,
    keys: &'a StorageKeys,
}

impl<'a, S: KeyValueStore> SyncStatusTracker<'a, S> {
    pub const fn new(store: &'a S, keys: &'a StorageKeys) -> Self {
        Self { store, keys }
    }

    /// Record `state` as of `now`
    pub fn set(&self, state: SyncState, now: i64) -> Result<SyncStatus> {
        let status = SyncStatus::new(state, now);
        self.store.set(&self.keys.sync_status, &serde_json::to_string(&status)?)?;
        tracing::debug!("Cart sync status -> {state}");
        Ok(status)
    }

    /// Current status; `Idle` when none was recorded, `Unknown` when the
    /// record cannot be read
    ///
    /// A record that is present but unparsable counts as corrupt local
    /// state: the snapshot, queue and status are all cleared.
    pub fn get(&self) -> SyncStatus {
        match self.store.get(&self.keys.sync_status) {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|error| {
                tracing::warn!(
                    "Discarding corrupt cart sync status under {}: {error}",
                    self.keys.sync_status
                );
                if let Err(error) = clear_local_state(self.store, self.keys) {
                    tracing::warn!("Failed to clear local cart state: {error}");
                }
                SyncStatus::new(SyncState::Unknown, 0)
            }),
            Ok(None) => SyncStatus::new(SyncState::Idle, 0),
            Err(error) => {
                tracing::warn!("Failed to read cart sync status: {error}");
                SyncStatus::new(SyncState::Unknown, 0)
            }
        }
    }

    /// Record `state`, logging instead of failing
    ///
    /// Status is advisory; a storage failure here must not abort the
    /// operation that is reporting progress.
    pub fn mark(&self, state: SyncState, now: i64) {
        if let Err(error) = self.set(state, now) {
            tracing::warn!("Failed to record cart sync status {state}: {error}");
        }
    }
}
