//! Cart and wishlist item models

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Shopper-assigned priority for a cart or wishlist entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    /// Wire name used in persisted snapshots and remote documents
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(Error::InvalidInput(format!("unknown priority '{other}'"))),
        }
    }
}

/// An entry in the cart or the saved-for-later list
///
/// `id` is the remote document id of the cart-item document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub id: String,
    pub book_id: String,
    /// Always at least 1
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub saved_for_later: bool,
}

impl CartItem {
    /// Create a cart item, rejecting a zero quantity
    pub fn new(id: impl Into<String>, book_id: impl Into<String>, quantity: u32) -> Result<Self> {
        validate_quantity(quantity)?;
        Ok(Self {
            id: id.into(),
            book_id: book_id.into(),
            quantity,
            notes: None,
            priority: None,
            saved_for_later: false,
        })
    }

    #[must_use]
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    #[must_use]
    pub const fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }
}

/// An entry on the wishlist
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WishlistItem {
    pub id: String,
    pub book_id: String,
    /// When the book was wishlisted (Unix ms)
    pub added_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
}

impl WishlistItem {
    #[must_use]
    pub fn new(id: impl Into<String>, book_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            book_id: book_id.into(),
            added_at: chrono::Utc::now().timestamp_millis(),
            notes: None,
            priority: None,
        }
    }
}

/// Check the `quantity >= 1` invariant
pub fn validate_quantity(quantity: u32) -> Result<()> {
    if quantity == 0 {
        Err(Error::InvalidInput("quantity must be at least 1".into()))
    } else {
        Ok(())
    }
}
