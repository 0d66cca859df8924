//! Cart snapshot model and its versioned storage encoding
//!
//! Snapshots are persisted as one JSON object discriminated by `version`.
//! Decoding dispatches on that tag before touching any other field: the
//! current layout is parsed directly, the legacy layout is migrated, and an
//! unrecognized tag is reported as absent instead of being partially parsed.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{
    patch_notes, patch_priority, patch_quantity, validate_quantity, CartItem, ChangeRequest,
    ChangeType, WishlistItem,
};
use crate::error::{Error, Result};

/// Schema tag written with every snapshot
pub const SNAPSHOT_VERSION: &str = "2";

/// Layout written before wishlists were part of the snapshot
const LEGACY_SNAPSHOT_VERSION: &str = "1";

/// The three collections that make up a shopper's cart state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartData {
    pub cart_items: Vec<CartItem>,
    pub saved_items: Vec<CartItem>,
    pub wishlist_items: Vec<WishlistItem>,
}

impl CartData {
    /// Find an item in the cart or the saved-for-later list
    pub fn find_item(&self, item_id: &str) -> Option<&CartItem> {
        self.cart_items
            .iter()
            .chain(self.saved_items.iter())
            .find(|item| item.id == item_id)
    }

    /// Check item invariants that deserialization alone does not enforce
    pub fn validate(&self) -> Result<()> {
        for item in self.cart_items.iter().chain(self.saved_items.iter()) {
            validate_quantity(item.quantity).map_err(|_| {
                Error::CorruptData(format!("cart item {} has quantity 0", item.id))
            })?;
        }
        Ok(())
    }

    fn find_item_mut(&mut self, item_id: &str) -> Option<&mut CartItem> {
        self.cart_items
            .iter_mut()
            .chain(self.saved_items.iter_mut())
            .find(|item| item.id == item_id)
    }

    fn take_item(&mut self, item_id: &str) -> Option<CartItem> {
        if let Some(index) = self.cart_items.iter().position(|item| item.id == item_id) {
            return Some(self.cart_items.remove(index));
        }
        let index = self.saved_items.iter().position(|item| item.id == item_id)?;
        Some(self.saved_items.remove(index))
    }

    /// Apply a mutation to the local collections
    ///
    /// Mirrors the remote effect of the same change so the local snapshot
    /// and the eventually-synced documents agree.
    pub fn apply_change(&mut self, change: &ChangeRequest) -> Result<()> {
        let item_id = change.item_id.as_str();
        let not_found = || Error::NotFound(format!("cart item {item_id}"));

        match change.change_type {
            ChangeType::UpdateQuantity => {
                let quantity = patch_quantity(&change.data)?;
                self.find_item_mut(item_id).ok_or_else(not_found)?.quantity = quantity;
            }
            ChangeType::RemoveItem => {
                self.take_item(item_id).ok_or_else(not_found)?;
            }
            ChangeType::SaveForLater => {
                let mut item = self.take_item(item_id).ok_or_else(not_found)?;
                item.saved_for_later = true;
                self.saved_items.push(item);
            }
            ChangeType::MoveToCart => {
                let mut item = self.take_item(item_id).ok_or_else(not_found)?;
                item.saved_for_later = false;
                self.cart_items.push(item);
            }
            ChangeType::UpdateNotes => {
                let notes = patch_notes(&change.data)?;
                self.find_item_mut(item_id).ok_or_else(not_found)?.notes = notes;
            }
            ChangeType::UpdatePriority => {
                let priority = patch_priority(&change.data)?;
                self.find_item_mut(item_id).ok_or_else(not_found)?.priority = Some(priority);
            }
            ChangeType::Unrecognized => {
                return Err(Error::InvalidChange(format!(
                    "unrecognized change type for item {item_id}"
                )));
            }
        }
        Ok(())
    }
}

/// A cart state persisted as one unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartSnapshot {
    #[serde(flatten)]
    pub data: CartData,
    /// Client wall-clock time of the save (Unix ms)
    pub timestamp: i64,
    pub version: String,
}

impl CartSnapshot {
    /// Stamp cart data with the current schema version
    #[must_use]
    pub fn new(data: CartData, timestamp: i64) -> Self {
        Self {
            data,
            timestamp,
            version: SNAPSHOT_VERSION.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacySnapshotV1 {
    cart_items: Vec<CartItem>,
    saved_items: Vec<CartItem>,
    timestamp: i64,
}

impl LegacySnapshotV1 {
    fn migrate(self) -> CartSnapshot {
        CartSnapshot::new(
            CartData {
                cart_items: self.cart_items,
                saved_items: self.saved_items,
                wishlist_items: Vec::new(),
            },
            self.timestamp,
        )
    }
}

/// Serialize a snapshot for storage
pub fn encode_snapshot(snapshot: &CartSnapshot) -> Result<String> {
    Ok(serde_json::to_string(snapshot)?)
}

/// Decode a stored snapshot
///
/// Returns `Ok(None)` for a well-formed record whose `version` tag this
/// client does not know. Malformed JSON, a missing tag, a shape mismatch
/// under a known tag or a zero quantity is an error.
pub fn decode_snapshot(raw: &str) -> Result<Option<CartSnapshot>> {
    let value: Value = serde_json::from_str(raw)?;
    let version = value
        .get("version")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::CorruptData("snapshot has no version tag".into()))?
        .to_string();

    let snapshot: CartSnapshot = match version.as_str() {
        SNAPSHOT_VERSION => serde_json::from_value(value)?,
        LEGACY_SNAPSHOT_VERSION => {
            let legacy: LegacySnapshotV1 = serde_json::from_value(value)?;
            tracing::debug!("Migrating cart snapshot from version {version}");
            legacy.migrate()
        }
        _ => {
            tracing::warn!("Ignoring cart snapshot with unrecognized version '{version}'");
            return Ok(None);
        }
    };
    snapshot.data.validate()?;
    Ok(Some(snapshot))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Priority;
    use pretty_assertions::assert_eq;

    fn sample_data() -> CartData {
        CartData {
            cart_items: vec![
                CartItem::new("c1", "book-1", 1).unwrap(),
                CartItem::new("c2", "book-2", 2).unwrap(),
            ],
            saved_items: vec![],
            wishlist_items: vec![WishlistItem::new("w1", "book-9")],
        }
    }

    #[test]
    fn test_encode_decode_current_version() {
        let snapshot = CartSnapshot::new(sample_data(), 1_000);
        let raw = encode_snapshot(&snapshot).unwrap();
        assert!(raw.contains("\"version\":\"2\""));
        assert!(raw.contains("\"cartItems\""));

        let decoded = decode_snapshot(&raw).unwrap().unwrap();
        assert_eq!(decoded, snapshot);
    }

    #[test]
    fn test_decode_migrates_legacy_layout() {
        let raw = r#"{"version":"1","timestamp":77,
            "cartItems":[{"id":"c1","bookId":"b1","quantity":3}],
            "savedItems":[]}"#;
        let decoded = decode_snapshot(raw).unwrap().unwrap();
        assert_eq!(decoded.version, SNAPSHOT_VERSION);
        assert_eq!(decoded.timestamp, 77);
        assert_eq!(decoded.data.cart_items.len(), 1);
        assert!(decoded.data.wishlist_items.is_empty());
    }

    #[test]
    fn test_decode_unknown_version_is_absent() {
        let raw = r#"{"version":"9","timestamp":1,"somethingNew":true}"#;
        assert!(decode_snapshot(raw).unwrap().is_none());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_snapshot("invalid json").is_err());
        assert!(decode_snapshot(r#"{"timestamp":1}"#).is_err());
        // Known tag, wrong shape: never partially parsed
        assert!(decode_snapshot(r#"{"version":"2","timestamp":1,"cartItems":[]}"#).is_err());
    }

    #[test]
    fn test_apply_quantity_and_notes() {
        let mut data = sample_data();
        data.apply_change(&ChangeRequest::update_quantity("c1", 5))
            .unwrap();
        data.apply_change(&ChangeRequest::update_notes("c1", Some("gift".into())))
            .unwrap();
        data.apply_change(&ChangeRequest::update_priority("c1", Priority::Low))
            .unwrap();

        let item = data.find_item("c1").unwrap();
        assert_eq!(item.quantity, 5);
        assert_eq!(item.notes.as_deref(), Some("gift"));
        assert_eq!(item.priority, Some(Priority::Low));
    }

    #[test]
    fn test_apply_save_for_later_and_back() {
        let mut data = sample_data();
        data.apply_change(&ChangeRequest::save_for_later("c2"))
            .unwrap();
        assert_eq!(data.cart_items.len(), 1);
        assert_eq!(data.saved_items.len(), 1);
        assert!(data.saved_items[0].saved_for_later);

        data.apply_change(&ChangeRequest::move_to_cart("c2")).unwrap();
        assert_eq!(data.cart_items.len(), 2);
        assert!(data.saved_items.is_empty());
        assert!(!data.cart_items[1].saved_for_later);
    }

    #[test]
    fn test_apply_remove_and_missing_item() {
        let mut data = sample_data();
        data.apply_change(&ChangeRequest::remove_item("c1")).unwrap();
        assert!(data.find_item("c1").is_none());

        let error = data
            .apply_change(&ChangeRequest::remove_item("c1"))
            .unwrap_err();
        assert!(matches!(error, Error::NotFound(_)));
    }

    #[test]
    fn test_decode_rejects_zero_quantity() {
        let raw = r#"{"version":"2","timestamp":1,"cartItems":[],"savedItems":[{"id":"s1","bookId":"b","quantity":0}],"wishlistItems":[]}"#;
        let error = decode_snapshot(raw).unwrap_err();
        assert!(matches!(error, Error::CorruptData(_)));

        let legacy = r#"{"version":"1","timestamp":1,"cartItems":[{"id":"c1","bookId":"b","quantity":0}],"savedItems":[]}"#;
        assert!(decode_snapshot(legacy).is_err());
    }
}
