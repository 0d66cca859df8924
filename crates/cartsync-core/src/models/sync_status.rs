//! Sync status model

use serde::{Deserialize, Serialize};
use std::fmt;

/// Sync state exposed to the UI
///
/// `Unknown` is only ever produced when reading a status record that cannot
/// be understood; nothing transitions into it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    #[default]
    Idle,
    Pending,
    Syncing,
    Synced,
    Error,
    Unknown,
}

impl SyncState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Pending => "pending",
            Self::Syncing => "syncing",
            Self::Synced => "synced",
            Self::Error => "error",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted sync status record
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStatus {
    pub status: SyncState,
    /// When the status was set (Unix ms)
    pub timestamp: i64,
}

impl SyncStatus {
    #[must_use]
    pub const fn new(status: SyncState, timestamp: i64) -> Self {
        Self { status, timestamp }
    }
}
