//! Offline change model
//!
//! An offline change is one pending cart mutation recorded while the remote
//! write could not be confirmed. Changes are replayed in insertion order.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::{validate_quantity, Priority};
use crate::error::{Error, Result};

/// Client-generated identifier of a queued change (UUID v7, time-sortable)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangeId(String);

impl ChangeId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ChangeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ChangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChangeId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Kind of cart mutation
///
/// Types written by other client versions deserialize as `Unrecognized`
/// so one unknown entry never makes the whole queue unreadable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    UpdateQuantity,
    RemoveItem,
    SaveForLater,
    MoveToCart,
    UpdateNotes,
    UpdatePriority,
    #[serde(other)]
    Unrecognized,
}

impl ChangeType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UpdateQuantity => "update_quantity",
            Self::RemoveItem => "remove_item",
            Self::SaveForLater => "save_for_later",
            Self::MoveToCart => "move_to_cart",
            Self::UpdateNotes => "update_notes",
            Self::UpdatePriority => "update_priority",
            Self::Unrecognized => "unrecognized",
        }
    }
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChangeType {
    type Err = Error;

    /// Parse a known wire name; unlike deserialization, unknown names fail
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "update_quantity" => Ok(Self::UpdateQuantity),
            "remove_item" => Ok(Self::RemoveItem),
            "save_for_later" => Ok(Self::SaveForLater),
            "move_to_cart" => Ok(Self::MoveToCart),
            "update_notes" => Ok(Self::UpdateNotes),
            "update_priority" => Ok(Self::UpdatePriority),
            other => Err(Error::InvalidInput(format!("unknown change type '{other}'"))),
        }
    }
}

/// Partial patch carried by a change (e.g. `{"quantity": 3}`)
pub type ChangePatch = Map<String, Value>;

/// A mutation as issued by the UI, before it is queued
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeRequest {
    #[serde(rename = "type")]
    pub change_type: ChangeType,
    pub item_id: String,
    #[serde(default)]
    pub data: ChangePatch,
}

impl ChangeRequest {
    pub fn new(change_type: ChangeType, item_id: impl Into<String>, data: ChangePatch) -> Self {
        Self {
            change_type,
            item_id: item_id.into(),
            data,
        }
    }

    pub fn update_quantity(item_id: impl Into<String>, quantity: u32) -> Self {
        Self::new(
            ChangeType::UpdateQuantity,
            item_id,
            patch("quantity", Value::from(quantity)),
        )
    }

    pub fn remove_item(item_id: impl Into<String>) -> Self {
        Self::new(ChangeType::RemoveItem, item_id, ChangePatch::new())
    }

    pub fn save_for_later(item_id: impl Into<String>) -> Self {
        Self::new(ChangeType::SaveForLater, item_id, ChangePatch::new())
    }

    pub fn move_to_cart(item_id: impl Into<String>) -> Self {
        Self::new(ChangeType::MoveToCart, item_id, ChangePatch::new())
    }

    /// `None` clears the notes
    pub fn update_notes(item_id: impl Into<String>, notes: Option<String>) -> Self {
        Self::new(
            ChangeType::UpdateNotes,
            item_id,
            patch("notes", notes.map_or(Value::Null, Value::String)),
        )
    }

    pub fn update_priority(item_id: impl Into<String>, priority: Priority) -> Self {
        Self::new(
            ChangeType::UpdatePriority,
            item_id,
            patch("priority", Value::from(priority.as_str())),
        )
    }
}

/// A queued mutation with its client-assigned id and queue timestamp
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfflineChange {
    pub id: ChangeId,
    #[serde(rename = "type")]
    pub change_type: ChangeType,
    pub item_id: String,
    #[serde(default)]
    pub data: ChangePatch,
    /// When the change was queued (Unix ms)
    pub timestamp: i64,
}

impl OfflineChange {
    /// Stamp a request with a fresh id and the given queue time
    #[must_use]
    pub fn from_request(request: ChangeRequest, timestamp: i64) -> Self {
        Self {
            id: ChangeId::new(),
            change_type: request.change_type,
            item_id: request.item_id,
            data: request.data,
            timestamp,
        }
    }
}

/// Read the required `quantity` field of an `update_quantity` patch
pub fn patch_quantity(data: &ChangePatch) -> Result<u32> {
    let quantity = data
        .get("quantity")
        .and_then(Value::as_u64)
        .ok_or_else(|| Error::InvalidChange("missing or non-integer 'quantity'".into()))?;
    let quantity = u32::try_from(quantity)
        .map_err(|_| Error::InvalidChange(format!("quantity {quantity} out of range")))?;
    validate_quantity(quantity).map_err(|error| Error::InvalidChange(error.to_string()))?;
    Ok(quantity)
}

/// Read the `notes` field of an `update_notes` patch; `null` clears notes
pub fn patch_notes(data: &ChangePatch) -> Result<Option<String>> {
    match data.get("notes") {
        Some(Value::String(notes)) => Ok(Some(notes.clone())),
        Some(Value::Null) => Ok(None),
        Some(_) => Err(Error::InvalidChange("'notes' must be a string or null".into())),
        None => Err(Error::InvalidChange("missing 'notes'".into())),
    }
}

/// Read the required `priority` field of an `update_priority` patch
pub fn patch_priority(data: &ChangePatch) -> Result<Priority> {
    data.get("priority")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::InvalidChange("missing 'priority'".into()))?
        .parse()
        .map_err(|error: Error| Error::InvalidChange(error.to_string()))
}

fn patch(field: &str, value: Value) -> ChangePatch {
    let mut data = ChangePatch::new();
    data.insert(field.to_string(), value);
    data
}
