//! Data models for cartsync

mod backup;
mod cart_item;
mod offline_change;
mod snapshot;
mod sync_status;

pub use backup::{BackupMetadata, CloudBackup, DeviceInfo};
pub use cart_item::{validate_quantity, CartItem, Priority, WishlistItem};
pub use offline_change::{
    patch_notes, patch_priority, patch_quantity, ChangeId, ChangePatch, ChangeRequest,
    ChangeType, OfflineChange,
};
pub use snapshot::{decode_snapshot, encode_snapshot, CartData, CartSnapshot, SNAPSHOT_VERSION};
pub use sync_status::{SyncState, SyncStatus};
