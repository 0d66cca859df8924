//! Cloud backup of the full cart state
//!
//! One merge-upserted document per user in the backup collection. The
//! backup timestamp is written as a server timestamp, so staleness on
//! restore is judged against server time as well.

use serde_json::Value;

use crate::error::Result;
use crate::models::{CartData, CloudBackup, DeviceInfo, SNAPSHOT_VERSION};
use crate::remote::{DocumentRef, FieldMap, FieldValue, RemoteStore};
use crate::util::is_older_than;

/// A backup returned by restore, with the server time it was checked at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoredBackup {
    pub backup: CloudBackup,
    pub server_time: i64,
}

/// Publishes and fetches per-user cart backups
pub struct CloudBackupService<'a, R> {
    remote: &'a R,
    collection: &'a str,
}

impl<'a, R: RemoteStore> CloudBackupService<'a, R> {
    pub const fn new(remote: &'a R, collection: &'a str) -> Self {
        Self { remote, collection }
    }

    fn document(&self, user_id: &str) -> DocumentRef {
        DocumentRef::new(self.collection, user_id)
    }

    /// Merge-upsert the user's backup document
    pub async fn backup(&self, user_id: &str, data: &CartData, device: &DeviceInfo) -> Result<()> {
        let mut metadata = FieldMap::new();
        metadata.insert(
            "deviceInfo".into(),
            FieldValue::Value(serde_json::to_value(device)?),
        );
        metadata.insert("backupTimestamp".into(), FieldValue::ServerTimestamp);
        metadata.insert(
            "version".into(),
            FieldValue::Value(Value::from(SNAPSHOT_VERSION)),
        );

        let mut fields = FieldMap::new();
        fields.insert("userId".into(), FieldValue::Value(Value::from(user_id)));
        fields.insert(
            "cartItems".into(),
            FieldValue::Value(serde_json::to_value(&data.cart_items)?),
        );
        fields.insert(
            "savedItems".into(),
            FieldValue::Value(serde_json::to_value(&data.saved_items)?),
        );
        fields.insert(
            "wishlistItems".into(),
            FieldValue::Value(serde_json::to_value(&data.wishlist_items)?),
        );
        fields.insert("metadata".into(), FieldValue::Map(metadata));

        self.remote
            .set_document(&self.document(user_id), fields, true)
            .await?;
        tracing::info!(
            "Backed up cart for {user_id} ({} cart, {} saved, {} wishlist)",
            data.cart_items.len(),
            data.saved_items.len(),
            data.wishlist_items.len()
        );
        Ok(())
    }

    /// Fetch the user's backup unless it is missing, unreadable or older
    /// than `max_age_ms` by server time
    pub async fn restore(&self, user_id: &str, max_age_ms: i64) -> Result<Option<RestoredBackup>> {
        let Some(document) = self.remote.get_document(&self.document(user_id)).await? else {
            tracing::debug!("No cart backup for {user_id}");
            return Ok(None);
        };

        let backup: CloudBackup = match serde_json::from_value(Value::Object(document)) {
            Ok(backup) => backup,
            Err(error) => {
                tracing::warn!("Ignoring unreadable cart backup for {user_id}: {error}");
                return Ok(None);
            }
        };

        let server_time = self.remote.server_time().await?;
        if is_older_than(backup.metadata.backup_timestamp, max_age_ms, server_time) {
            tracing::info!(
                "Ignoring stale cart backup for {user_id} from {}",
                backup.metadata.backup_timestamp
            );
            return Ok(None);
        }

        Ok(Some(RestoredBackup {
            backup,
            server_time,
        }))
    }
}
