//! Persisted queue of offline cart changes
//!
//! The queue is a JSON array stored under one key. Entries keep insertion
//! order and are never coalesced: two quantity updates to the same item are
//! two entries, replayed in order so the later one wins.

use std::collections::HashSet;

use crate::cache::clear_local_state;
use crate::error::Result;
use crate::models::{ChangeId, ChangeRequest, OfflineChange, SyncState};
use crate::status::SyncStatusTracker;
use crate::storage::{KeyValueStore, StorageKeys};

/// Append-only log of changes awaiting a remote write
pub struct OfflineChangeQueue<'a, S> {
    store: &'a S,
    keys: &'a StorageKeys,
}

impl<'a, S: KeyValueStore> OfflineChangeQueue<'a, S> {
    pub const fn new(store: &'a S, keys: &'a StorageKeys) -> Self {
        Self { store, keys }
    }

    fn status(&self) -> SyncStatusTracker<'a, S> {
        SyncStatusTracker::new(self.store, self.keys)
    }

    /// Queue a change, stamping its id and timestamp, and mark status pending
    pub fn add(&self, request: ChangeRequest, now: i64) -> Result<OfflineChange> {
        let change = OfflineChange::from_request(request, now);
        let mut changes = self.list();
        changes.push(change.clone());
        self.write(&changes)?;
        tracing::debug!(
            "Queued offline change {} ({}) for item {}",
            change.id,
            change.change_type,
            change.item_id
        );
        self.status().mark(SyncState::Pending, now);
        Ok(change)
    }

    /// Queued changes in insertion order
    ///
    /// Missing data yields an empty queue. Unparsable data is treated like a
    /// corrupt snapshot: all local cart state is cleared.
    pub fn list(&self) -> Vec<OfflineChange> {
        let raw = match self.store.get(&self.keys.offline_changes) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(error) => {
                tracing::warn!("Failed to read offline cart changes: {error}");
                return Vec::new();
            }
        };

        serde_json::from_str(&raw).unwrap_or_else(|error| {
            tracing::warn!("Discarding corrupt offline cart changes: {error}");
            if let Err(error) = clear_local_state(self.store, self.keys) {
                tracing::warn!("Failed to clear local cart state: {error}");
            }
            Vec::new()
        })
    }

    /// Empty the queue and mark status synced
    pub fn clear(&self, now: i64) -> Result<()> {
        self.write(&[])?;
        self.status().mark(SyncState::Synced, now);
        Ok(())
    }

    /// Drop the given entries, keeping everything else in order
    ///
    /// Returns how many entries remain queued.
    pub fn remove(&self, ids: &HashSet<ChangeId>) -> Result<usize> {
        let mut changes = self.list();
        changes.retain(|change| !ids.contains(&change.id));
        self.write(&changes)?;
        Ok(changes.len())
    }

    /// Drop entries queued before `cutoff`, returning how many were removed
    pub fn retain_since(&self, cutoff: i64) -> Result<usize> {
        let mut changes = self.list();
        let before = changes.len();
        changes.retain(|change| change.timestamp >= cutoff);
        let removed = before - changes.len();
        if removed > 0 {
            self.write(&changes)?;
            tracing::info!("Dropped {removed} expired offline cart change(s)");
        }
        Ok(removed)
    }

    fn write(&self, changes: &[OfflineChange]) -> Result<()> {
        self.store
            .set(&self.keys.offline_changes, &serde_json::to_string(changes)?)
    }
}
