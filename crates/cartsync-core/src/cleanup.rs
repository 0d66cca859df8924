//! Opportunistic garbage collection of local cart state

use crate::cache::LocalCache;
use crate::config::CartSyncConfig;
use crate::error::Result;
use crate::queue::OfflineChangeQueue;
use crate::storage::{KeyValueStore, StorageKeys};

/// What a cleanup pass removed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// An expired or corrupt snapshot was purged along with queue and status
    pub snapshot_purged: bool,
    /// Queue entries dropped for exceeding the maximum age
    pub changes_dropped: usize,
}

/// Purge an expired snapshot and drop over-age queue entries
///
/// Never touches remote state.
pub fn cleanup<S: KeyValueStore>(
    store: &S,
    keys: &StorageKeys,
    config: &CartSyncConfig,
    now: i64,
) -> Result<CleanupReport> {
    let had_snapshot = store.get(&keys.snapshot)?.is_some();
    // Loading purges stale or corrupt snapshots as a side effect
    let loaded = LocalCache::new(store, keys, config.snapshot_ttl_ms).load(now);
    let snapshot_purged = had_snapshot && loaded.is_none() && store.get(&keys.snapshot)?.is_none();

    let cutoff = now.saturating_sub(config.queue_entry_max_age_ms);
    let changes_dropped = OfflineChangeQueue::new(store, keys).retain_since(cutoff)?;

    if snapshot_purged || changes_dropped > 0 {
        tracing::info!(
            "Cart cleanup purged snapshot: {snapshot_purged}, dropped {changes_dropped} change(s)"
        );
    }
    Ok(CleanupReport {
        snapshot_purged,
        changes_dropped,
    })
}
