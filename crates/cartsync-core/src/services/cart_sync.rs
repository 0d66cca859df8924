//! Per-user cart persistence and sync manager.
//!
//! Owns the injected local and remote stores and hands out short-lived
//! component views per call. Every public method degrades to a boolean or
//! `Option` sentinel and logs the underlying error; nothing here panics or
//! propagates an error to the caller except the `*_report` variants.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex as StdMutex;

use tokio::sync::Mutex;

use crate::backup::CloudBackupService;
use crate::cache::LocalCache;
use crate::cleanup::{cleanup, CleanupReport};
use crate::config::CartSyncConfig;
use crate::conflict::{merge_cart_data, MergeOutcome, MergePolicy};
use crate::error::Result;
use crate::models::{
    CartData, CartSnapshot, ChangeRequest, CloudBackup, DeviceInfo, OfflineChange, SyncState,
    SyncStatus,
};
use crate::queue::OfflineChangeQueue;
use crate::remote::{RemoteStore, WriteBatch};
use crate::status::SyncStatusTracker;
use crate::storage::{KeyValueStore, StorageKeys};
use crate::sync::{change_to_write, RemoteSyncEngine, SyncReport};
use crate::util::{normalize_text_option, unix_timestamp_ms_now};

/// Where a change made through [`CartSyncManager::apply_change`] ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeDisposition {
    /// Written to the remote store immediately
    Synced,
    /// Saved locally and queued for the next sync
    Queued,
    /// Could not be applied to the local cart; nothing was written
    Rejected,
}

/// Cart engine for one user on one device
pub struct CartSyncManager<S, R> {
    user_id: Option<String>,
    keys: StorageKeys,
    store: S,
    remote: R,
    config: CartSyncConfig,
    online: AtomicBool,
    /// Server time minus local time, learned from the last restore
    clock_offset_ms: StdMutex<Option<i64>>,
    sync_guard: Mutex<()>,
}

impl<S: KeyValueStore, R: RemoteStore> CartSyncManager<S, R> {
    /// Create a manager with default retention windows
    pub fn new(user_id: Option<&str>, store: S, remote: R) -> Self {
        Self::with_config(user_id, store, remote, CartSyncConfig::default())
    }

    pub fn with_config(user_id: Option<&str>, store: S, remote: R, config: CartSyncConfig) -> Self {
        let user_id = normalize_text_option(user_id.map(str::to_string));
        let keys = StorageKeys::new(user_id.as_deref(), config.normalized_key_prefix().as_deref());
        Self {
            user_id,
            keys,
            store,
            remote,
            config,
            online: AtomicBool::new(true),
            clock_offset_ms: StdMutex::new(None),
            sync_guard: Mutex::new(()),
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub const fn keys(&self) -> &StorageKeys {
        &self.keys
    }

    pub const fn config(&self) -> &CartSyncConfig {
        &self.config
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    pub const fn remote(&self) -> &R {
        &self.remote
    }

    fn cache(&self) -> LocalCache<'_, S> {
        LocalCache::new(&self.store, &self.keys, self.config.snapshot_ttl_ms)
    }

    fn queue(&self) -> OfflineChangeQueue<'_, S> {
        OfflineChangeQueue::new(&self.store, &self.keys)
    }

    fn status(&self) -> SyncStatusTracker<'_, S> {
        SyncStatusTracker::new(&self.store, &self.keys)
    }

    fn backups(&self) -> CloudBackupService<'_, R> {
        CloudBackupService::new(&self.remote, &self.config.backup_collection)
    }

    // Local snapshot

    /// Persist the cart locally; `false` when storage is unavailable
    pub fn save_to_local(&self, data: &CartData) -> bool {
        match self.cache().save(data.clone(), unix_timestamp_ms_now()) {
            Ok(_) => true,
            Err(error) => {
                tracing::warn!("Failed to save cart locally: {error}");
                false
            }
        }
    }

    /// The local snapshot, unless absent, unreadable or expired
    pub fn load_from_local(&self) -> Option<CartSnapshot> {
        self.cache().load(unix_timestamp_ms_now())
    }

    /// Remove the snapshot, queue and status together
    pub fn clear_local(&self) -> bool {
        self.cache().clear().is_ok()
    }

    // Offline queue and status

    pub fn add_offline_change(&self, request: ChangeRequest) -> Option<OfflineChange> {
        self.queue()
            .add(request, unix_timestamp_ms_now())
            .inspect_err(|error| tracing::warn!("Failed to queue offline cart change: {error}"))
            .ok()
    }

    pub fn get_offline_changes(&self) -> Vec<OfflineChange> {
        self.queue().list()
    }

    pub fn clear_offline_changes(&self) -> bool {
        self.queue()
            .clear(unix_timestamp_ms_now())
            .inspect_err(|error| tracing::warn!("Failed to clear offline cart changes: {error}"))
            .is_ok()
    }

    pub fn set_sync_status(&self, state: SyncState) -> bool {
        self.status()
            .set(state, unix_timestamp_ms_now())
            .inspect_err(|error| tracing::warn!("Failed to set cart sync status: {error}"))
            .is_ok()
    }

    pub fn get_sync_status(&self) -> SyncStatus {
        self.status().get()
    }

    // Remote

    /// Submit the offline queue; `false` when the batch failed or another
    /// sync is still running
    pub async fn sync_offline_changes(&self) -> bool {
        self.sync_offline_changes_report().await.is_ok()
    }

    /// Submit the offline queue, reporting what was written
    pub async fn sync_offline_changes_report(&self) -> Result<SyncReport> {
        RemoteSyncEngine::new(
            &self.store,
            &self.keys,
            &self.remote,
            &self.config.cart_collection,
            &self.sync_guard,
        )
        .sync()
        .await
    }

    /// Back the cart up for the signed-in user; `false` when anonymous or
    /// when the write fails
    pub async fn backup_to_cloud(&self, data: &CartData) -> bool {
        let Some(user_id) = self.user_id() else {
            tracing::debug!("Skipping cart backup: no signed-in user");
            return false;
        };
        match self.backups().backup(user_id, data, &self.device_info()).await {
            Ok(()) => true,
            Err(error) => {
                tracing::warn!("Cart backup failed: {error}");
                false
            }
        }
    }

    /// Fetch the signed-in user's backup unless it is missing or expired
    ///
    /// A successful read also records the offset between server and local
    /// clocks, used by later merges.
    pub async fn restore_from_cloud(&self) -> Option<CloudBackup> {
        let user_id = self.user_id()?;
        let restored = match self
            .backups()
            .restore(user_id, self.config.backup_max_age_ms)
            .await
        {
            Ok(restored) => restored?,
            Err(error) => {
                tracing::warn!("Cart restore failed: {error}");
                return None;
            }
        };
        self.record_clock_offset(restored.server_time - unix_timestamp_ms_now());
        Some(restored.backup)
    }

    fn record_clock_offset(&self, offset_ms: i64) {
        if let Ok(mut slot) = self.clock_offset_ms.lock() {
            *slot = Some(offset_ms);
        }
    }

    /// Server time minus local time, once a restore has observed it
    pub fn clock_offset_ms(&self) -> Option<i64> {
        self.clock_offset_ms.lock().ok().and_then(|slot| *slot)
    }

    /// Last-writer-wins between the local snapshot and a cloud backup
    pub fn merge_cart_data(
        &self,
        local: Option<CartSnapshot>,
        cloud: Option<CloudBackup>,
    ) -> Option<MergeOutcome> {
        merge_cart_data(
            local,
            cloud,
            MergePolicy {
                clock_offset_ms: self.clock_offset_ms(),
                skew_tolerance_ms: self.config.clock_skew_tolerance_ms,
            },
        )
    }

    /// Purge expired local state; failures are logged and reported as no-op
    pub fn cleanup(&self) -> CleanupReport {
        cleanup(&self.store, &self.keys, &self.config, unix_timestamp_ms_now()).unwrap_or_else(
            |error| {
                tracing::warn!("Cart cleanup failed: {error}");
                CleanupReport::default()
            },
        )
    }

    // Connectivity and cart edits

    pub fn set_online(&self, online: bool) {
        let was_online = self.online.swap(online, Ordering::SeqCst);
        if was_online != online {
            tracing::info!("Cart connectivity changed: online = {online}");
        }
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    pub fn device_info(&self) -> DeviceInfo {
        DeviceInfo::capture()
    }

    /// Apply a cart edit locally, then write it remotely or queue it
    ///
    /// The edit is always saved to the local snapshot first. It is written
    /// straight to the remote store only when online and nothing is already
    /// queued, so a direct write never overtakes older queued changes. A
    /// failed direct write falls back to the queue.
    pub async fn apply_change(&self, request: ChangeRequest) -> ChangeDisposition {
        let now = unix_timestamp_ms_now();
        let mut data = self
            .cache()
            .load(now)
            .map(|snapshot| snapshot.data)
            .unwrap_or_default();
        if let Err(error) = data.apply_change(&request) {
            tracing::warn!("Rejecting cart change on {}: {error}", request.item_id);
            return ChangeDisposition::Rejected;
        }
        if let Err(error) = self.cache().save(data, now) {
            tracing::warn!("Failed to save cart locally: {error}");
        }

        if self.is_online() && self.queue().list().is_empty() {
            let change = OfflineChange::from_request(request.clone(), now);
            match self.write_now(&change).await {
                Ok(()) => return ChangeDisposition::Synced,
                Err(error) => {
                    tracing::warn!("Direct cart write failed, queueing instead: {error}");
                }
            }
        }

        match self.queue().add(request, now) {
            Ok(_) => ChangeDisposition::Queued,
            Err(error) => {
                tracing::error!("Failed to queue cart change: {error}");
                ChangeDisposition::Rejected
            }
        }
    }

    async fn write_now(&self, change: &OfflineChange) -> Result<()> {
        let mut batch = WriteBatch::new();
        if let Some(op) = change_to_write(change, &self.config.cart_collection)? {
            batch.push(op);
        }
        if !batch.is_empty() {
            self.remote.commit(batch).await?;
        }
        Ok(())
    }
}
