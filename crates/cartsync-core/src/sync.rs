//! Replays the offline queue against the remote store
//!
//! All queued changes go out as one atomic batch. A change that cannot be
//! turned into a write is skipped and logged; the rest still go out. Once a
//! change reaches the store, though, any failure inside the batch (for
//! example an update against a document another device deleted) rejects
//! the whole batch and every change stays queued.

use std::collections::HashSet;

use serde_json::Value;
use tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::models::{
    patch_notes, patch_priority, patch_quantity, ChangeId, ChangeType, OfflineChange, SyncState,
};
use crate::queue::OfflineChangeQueue;
use crate::remote::{DocumentRef, FieldMap, FieldValue, RemoteStore, WriteBatch, WriteOp};
use crate::status::SyncStatusTracker;
use crate::storage::{KeyValueStore, StorageKeys};
use crate::util::unix_timestamp_ms_now;

/// Outcome of a successful sync
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Changes written in the committed batch
    pub submitted: usize,
    /// Changes dropped because they could not be turned into a write
    pub skipped: usize,
    /// Changes queued while the batch was in flight
    pub remaining: usize,
}

/// Translate one queued change into a write against its cart-item document
///
/// Returns `Ok(None)` for change types this client does not understand.
pub fn change_to_write(change: &OfflineChange, collection: &str) -> Result<Option<WriteOp>> {
    if change.item_id.trim().is_empty() {
        return Err(Error::InvalidChange(format!(
            "change {} has no item id",
            change.id
        )));
    }
    let doc = DocumentRef::new(collection, change.item_id.clone());

    let (name, value) = match change.change_type {
        ChangeType::RemoveItem => return Ok(Some(WriteOp::Delete { doc })),
        ChangeType::UpdateQuantity => ("quantity", Value::from(patch_quantity(&change.data)?)),
        ChangeType::SaveForLater => ("savedForLater", Value::Bool(true)),
        ChangeType::MoveToCart => ("savedForLater", Value::Bool(false)),
        ChangeType::UpdateNotes => (
            "notes",
            patch_notes(&change.data)?.map_or(Value::Null, Value::String),
        ),
        ChangeType::UpdatePriority => (
            "priority",
            Value::from(patch_priority(&change.data)?.as_str()),
        ),
        ChangeType::Unrecognized => return Ok(None),
    };

    let mut fields = FieldMap::new();
    fields.insert(name.to_string(), FieldValue::Value(value));
    fields.insert("updatedAt".to_string(), FieldValue::ServerTimestamp);
    Ok(Some(WriteOp::Update { doc, fields }))
}

/// Drains one user's offline queue into the remote store
pub struct RemoteSyncEngine<'a, S, R> {
    store: &'a S,
    keys: &'a StorageKeys,
    remote: &'a R,
    collection: &'a str,
    in_flight: &'a Mutex<()>,
}

impl<'a, S: KeyValueStore, R: RemoteStore> RemoteSyncEngine<'a, S, R> {
    /// `in_flight` must be shared by every engine built for the same user
    pub const fn new(
        store: &'a S,
        keys: &'a StorageKeys,
        remote: &'a R,
        collection: &'a str,
        in_flight: &'a Mutex<()>,
    ) -> Self {
        Self {
            store,
            keys,
            remote,
            collection,
            in_flight,
        }
    }

    /// Submit every queued change as one batch
    ///
    /// Fails with `SyncInProgress` without touching the store or the status
    /// when another sync for the same user has not finished yet.
    pub async fn sync(&self) -> Result<SyncReport> {
        let Ok(_guard) = self.in_flight.try_lock() else {
            tracing::warn!("Cart sync already in progress; rejecting overlapping request");
            return Err(Error::SyncInProgress);
        };

        let queue = OfflineChangeQueue::new(self.store, self.keys);
        let status = SyncStatusTracker::new(self.store, self.keys);

        let changes = queue.list();
        if changes.is_empty() {
            status.mark(SyncState::Synced, unix_timestamp_ms_now());
            return Ok(SyncReport::default());
        }

        status.mark(SyncState::Syncing, unix_timestamp_ms_now());

        let mut batch = WriteBatch::new();
        let mut skipped = 0;
        for change in &changes {
            match change_to_write(change, self.collection) {
                Ok(Some(op)) => {
                    batch.push(op);
                }
                Ok(None) => {
                    skipped += 1;
                    tracing::warn!(
                        "Skipping offline change {} with unrecognized type",
                        change.id
                    );
                }
                Err(error) => {
                    skipped += 1;
                    tracing::warn!("Skipping offline change {}: {error}", change.id);
                }
            }
        }

        let submitted = batch.len();
        if batch.is_empty() {
            tracing::info!("No valid offline changes to submit; dropping {skipped} change(s)");
        } else if let Err(error) = self.remote.commit(batch).await {
            tracing::error!("Cart sync batch of {submitted} change(s) failed: {error}");
            status.mark(SyncState::Error, unix_timestamp_ms_now());
            return Err(error);
        }

        let synced: HashSet<_> = changes.into_iter().map(|change| change.id).collect();
        let remaining = self.drop_synced(&queue, &synced);
        let next = if remaining == 0 {
            SyncState::Synced
        } else {
            SyncState::Pending
        };
        status.mark(next, unix_timestamp_ms_now());

        tracing::info!("Cart sync committed {submitted} change(s), skipped {skipped}");
        Ok(SyncReport {
            submitted,
            skipped,
            remaining,
        })
    }

    /// Remove committed entries from the queue, returning how many remain
    ///
    /// Runs after the batch has committed, so it never fails: if the queue
    /// cannot be rewritten the whole key is removed instead, and if that
    /// also fails the entries stay queued and are counted as remaining.
    fn drop_synced(
        &self,
        queue: &OfflineChangeQueue<'_, S>,
        synced: &HashSet<ChangeId>,
    ) -> usize {
        match queue.remove(synced) {
            Ok(remaining) => remaining,
            Err(error) => {
                tracing::error!(
                    "Batch committed but the offline queue could not be updated: {error}"
                );
                match self.store.remove(&self.keys.offline_changes) {
                    Ok(()) => 0,
                    Err(error) => {
                        tracing::error!("Failed to drop committed offline changes: {error}");
                        queue.list().len()
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChangePatch, ChangeRequest, Priority};
    use crate::remote::MemoryRemoteStore;
    use crate::storage::MemoryStore;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const COLLECTION: &str = "cart_items";

    /// Store whose writes to one key fail while `failing` is set
    struct FailingKeyStore {
        inner: MemoryStore,
        key: String,
        failing: std::sync::atomic::AtomicBool,
    }

    impl FailingKeyStore {
        fn new(key: &str) -> Self {
            Self {
                inner: MemoryStore::new(),
                key: key.to_string(),
                failing: std::sync::atomic::AtomicBool::new(false),
            }
        }

        fn set_failing(&self, failing: bool) {
            self.failing
                .store(failing, std::sync::atomic::Ordering::SeqCst);
        }
    }

    impl KeyValueStore for FailingKeyStore {
        fn get(&self, key: &str) -> Result<Option<String>> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> Result<()> {
            if key == self.key && self.failing.load(std::sync::atomic::Ordering::SeqCst) {
                return Err(Error::Storage(format!("quota exceeded writing {key}")));
            }
            self.inner.set(key, value)
        }

        fn remove(&self, key: &str) -> Result<()> {
            self.inner.remove(key)
        }
    }

    struct Fixture {
        store: MemoryStore,
        keys: StorageKeys,
        remote: MemoryRemoteStore,
        in_flight: Mutex<()>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                store: MemoryStore::new(),
                keys: StorageKeys::new(Some("u1"), None),
                remote: MemoryRemoteStore::new(),
                in_flight: Mutex::new(()),
            }
        }

        fn engine(&self) -> RemoteSyncEngine<'_, MemoryStore, MemoryRemoteStore> {
            RemoteSyncEngine::new(
                &self.store,
                &self.keys,
                &self.remote,
                COLLECTION,
                &self.in_flight,
            )
        }

        fn queue(&self) -> OfflineChangeQueue<'_, MemoryStore> {
            OfflineChangeQueue::new(&self.store, &self.keys)
        }

        fn status(&self) -> SyncState {
            SyncStatusTracker::new(&self.store, &self.keys)
                .get()
                .status
        }

        fn seed_item(&self, id: &str, quantity: u32) {
            self.remote.insert_document(
                DocumentRef::new(COLLECTION, id),
                json!({"bookId": "b", "quantity": quantity, "savedForLater": false})
                    .as_object()
                    .cloned()
                    .unwrap(),
            );
        }

        fn item(&self, id: &str) -> Option<serde_json::Map<String, Value>> {
            self.remote.document(&DocumentRef::new(COLLECTION, id))
        }
    }

    fn change(change_type: ChangeType, data: Value) -> OfflineChange {
        OfflineChange::from_request(
            ChangeRequest::new(change_type, "c1", data.as_object().cloned().unwrap()),
            1,
        )
    }

    #[test]
    fn test_change_to_write_per_type() {
        let quantity = change(ChangeType::UpdateQuantity, json!({"quantity": 4}));
        let op = change_to_write(&quantity, COLLECTION).unwrap().unwrap();
        let WriteOp::Update { doc, fields } = op else {
            panic!("expected update");
        };
        assert_eq!(doc, DocumentRef::new(COLLECTION, "c1"));
        assert_eq!(fields["quantity"], FieldValue::Value(json!(4)));
        assert_eq!(fields["updatedAt"], FieldValue::ServerTimestamp);

        let op = change_to_write(&change(ChangeType::RemoveItem, json!({})), COLLECTION)
            .unwrap()
            .unwrap();
        assert!(matches!(op, WriteOp::Delete { .. }));

        let op = change_to_write(&change(ChangeType::SaveForLater, json!({})), COLLECTION)
            .unwrap()
            .unwrap();
        let WriteOp::Update { fields, .. } = op else {
            panic!("expected update");
        };
        assert_eq!(fields["savedForLater"], FieldValue::Value(json!(true)));

        let unknown = change(ChangeType::Unrecognized, json!({}));
        assert!(change_to_write(&unknown, COLLECTION).unwrap().is_none());
    }

    #[test]
    fn test_change_to_write_rejects_missing_fields() {
        let missing = change(ChangeType::UpdateQuantity, json!({}));
        let error = change_to_write(&missing, COLLECTION).unwrap_err();
        assert!(matches!(error, Error::InvalidChange(_)));

        let mut blank = change(ChangeType::RemoveItem, json!({}));
        blank.item_id = " ".into();
        assert!(change_to_write(&blank, COLLECTION).is_err());
    }

    #[tokio::test]
    async fn test_empty_queue_syncs_without_network() {
        let fixture = Fixture::new();
        let report = fixture.engine().sync().await.unwrap();
        assert_eq!(report, SyncReport::default());
        assert_eq!(fixture.remote.call_count(), 0);
        assert_eq!(fixture.status(), SyncState::Synced);
    }

    #[tokio::test]
    async fn test_replay_applies_in_order_and_clears_queue() {
        let fixture = Fixture::new();
        fixture.seed_item("c1", 1);
        fixture.seed_item("c2", 1);
        let queue = fixture.queue();
        queue.add(ChangeRequest::update_quantity("c1", 2), 1).unwrap();
        queue.add(ChangeRequest::update_quantity("c1", 7), 2).unwrap();
        queue.add(ChangeRequest::save_for_later("c2"), 3).unwrap();
        queue
            .add(ChangeRequest::update_priority("c2", Priority::High), 4)
            .unwrap();
        queue
            .add(ChangeRequest::update_notes("c2", Some("gift".into())), 5)
            .unwrap();

        let report = fixture.engine().sync().await.unwrap();
        assert_eq!(report.submitted, 5);
        assert_eq!(report.remaining, 0);
        assert_eq!(fixture.remote.commit_count(), 1);

        let c1 = fixture.item("c1").unwrap();
        assert_eq!(c1["quantity"], 7);
        assert!(c1["updatedAt"].as_i64().is_some());
        let c2 = fixture.item("c2").unwrap();
        assert_eq!(c2["savedForLater"], true);
        assert_eq!(c2["priority"], "high");
        assert_eq!(c2["notes"], "gift");

        assert!(queue.list().is_empty());
        assert_eq!(fixture.status(), SyncState::Synced);
    }

    #[tokio::test]
    async fn test_rejected_batch_keeps_queue() {
        let fixture = Fixture::new();
        fixture.seed_item("c1", 1);
        let queue = fixture.queue();
        queue.add(ChangeRequest::update_quantity("c1", 2), 1).unwrap();
        queue.add(ChangeRequest::remove_item("c1"), 2).unwrap();
        let before = queue.list();

        fixture.remote.set_reject_commits(true);
        assert!(fixture.engine().sync().await.is_err());

        assert_eq!(queue.list(), before);
        assert_eq!(fixture.status(), SyncState::Error);
        assert_eq!(fixture.item("c1").unwrap()["quantity"], 1);
    }

    #[tokio::test]
    async fn test_malformed_change_is_skipped_not_fatal() {
        let fixture = Fixture::new();
        fixture.seed_item("c1", 1);
        let queue = fixture.queue();
        queue
            .add(
                ChangeRequest::new(ChangeType::UpdateQuantity, "c1", ChangePatch::new()),
                1,
            )
            .unwrap();
        queue
            .add(ChangeRequest::new(ChangeType::Unrecognized, "c1", ChangePatch::new()), 2)
            .unwrap();
        queue.add(ChangeRequest::update_quantity("c1", 9), 3).unwrap();

        let report = fixture.engine().sync().await.unwrap();
        assert_eq!(report.submitted, 1);
        assert_eq!(report.skipped, 2);
        assert_eq!(fixture.item("c1").unwrap()["quantity"], 9);
        assert!(queue.list().is_empty());
    }

    #[tokio::test]
    async fn test_update_of_missing_document_fails_whole_batch() {
        let fixture = Fixture::new();
        fixture.seed_item("c1", 1);
        let queue = fixture.queue();
        queue.add(ChangeRequest::update_quantity("c1", 4), 1).unwrap();
        queue.add(ChangeRequest::save_for_later("deleted-elsewhere"), 2).unwrap();

        assert!(fixture.engine().sync().await.is_err());
        assert_eq!(fixture.item("c1").unwrap()["quantity"], 1);
        assert_eq!(queue.list().len(), 2);
        assert_eq!(fixture.status(), SyncState::Error);
    }

    #[tokio::test]
    async fn test_overlapping_sync_is_rejected() {
        let fixture = Fixture::new();
        fixture.queue().add(ChangeRequest::remove_item("c1"), 1).unwrap();

        let _held = fixture.in_flight.try_lock().unwrap();
        let error = fixture.engine().sync().await.unwrap_err();
        assert!(matches!(error, Error::SyncInProgress));
        assert_eq!(fixture.remote.call_count(), 0);
        assert_eq!(fixture.status(), SyncState::Pending);
    }

    #[tokio::test]
    async fn test_retry_after_failure_succeeds() {
        let fixture = Fixture::new();
        fixture.seed_item("c1", 1);
        fixture
            .queue()
            .add(ChangeRequest::update_quantity("c1", 3), 1)
            .unwrap();

        fixture.remote.set_reject_commits(true);
        assert!(fixture.engine().sync().await.is_err());
        fixture.remote.set_reject_commits(false);
        fixture.engine().sync().await.unwrap();

        assert_eq!(fixture.item("c1").unwrap()["quantity"], 3);
        assert_eq!(fixture.status(), SyncState::Synced);
    }

    #[tokio::test]
    async fn test_all_invalid_changes_are_dropped_without_network() {
        let fixture = Fixture::new();
        let queue = fixture.queue();
        queue
            .add(
                ChangeRequest::new(ChangeType::UpdateQuantity, "c1", ChangePatch::new()),
                1,
            )
            .unwrap();
        queue
            .add(ChangeRequest::new(ChangeType::Unrecognized, "c1", ChangePatch::new()), 2)
            .unwrap();

        let report = fixture.engine().sync().await.unwrap();
        assert_eq!(
            report,
            SyncReport {
                submitted: 0,
                skipped: 2,
                remaining: 0,
            }
        );
        assert_eq!(fixture.remote.call_count(), 0);
        assert!(queue.list().is_empty());
        assert_eq!(fixture.status(), SyncState::Synced);
    }

    #[tokio::test]
    async fn test_committed_batch_settles_when_queue_write_fails() {
        let keys = StorageKeys::new(Some("u1"), None);
        let store = FailingKeyStore::new(&keys.offline_changes);
        let remote = MemoryRemoteStore::new();
        let in_flight = Mutex::new(());
        remote.insert_document(
            DocumentRef::new(COLLECTION, "c1"),
            json!({"bookId": "b", "quantity": 1}).as_object().cloned().unwrap(),
        );

        let queue = OfflineChangeQueue::new(&store, &keys);
        queue.add(ChangeRequest::update_quantity("c1", 3), 1).unwrap();
        queue.add(ChangeRequest::remove_item("c1"), 2).unwrap();
        store.set_failing(true);

        let engine = RemoteSyncEngine::new(&store, &keys, &remote, COLLECTION, &in_flight);
        let report = engine.sync().await.unwrap();
        assert_eq!(report.submitted, 2);
        assert_eq!(report.remaining, 0);
        assert_eq!(remote.commit_count(), 1);
        assert!(remote.document(&DocumentRef::new(COLLECTION, "c1")).is_none());
        assert!(queue.list().is_empty());
        assert_eq!(
            SyncStatusTracker::new(&store, &keys).get().status,
            SyncState::Synced
        );

        store.set_failing(false);
        engine.sync().await.unwrap();
        assert_eq!(remote.commit_count(), 1);
    }
}
