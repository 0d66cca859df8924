//! cartsync-core - Offline-first cart persistence and sync engine
//!
//! Keeps a shopper's cart, saved-for-later list and wishlist usable while
//! offline, queues edits for replay against a remote document store, backs
//! the whole cart up per user, and reconciles local and cloud copies with
//! snapshot-granularity last-writer-wins.

pub mod backup;
pub mod cache;
pub mod cleanup;
pub mod config;
pub mod conflict;
pub mod db;
pub mod error;
pub mod models;
pub mod queue;
pub mod remote;
pub mod services;
pub mod status;
pub mod storage;
pub mod sync;
pub mod util;

pub use cleanup::CleanupReport;
pub use config::{parse_config, CartSyncConfig};
pub use conflict::{MergeOutcome, ResolvedCart};
pub use error::{Error, Result};
pub use models::{
    CartData, CartItem, CartSnapshot, ChangeRequest, ChangeType, CloudBackup, OfflineChange,
    Priority, SyncState, SyncStatus, WishlistItem,
};
pub use remote::{MemoryRemoteStore, RemoteStore, SqliteDocumentStore};
pub use services::{CartSyncManager, ChangeDisposition};
pub use storage::{KeyValueStore, MemoryStore, SqliteStore, StorageKeys};
pub use sync::SyncReport;
