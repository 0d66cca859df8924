//! Consumer-facing services.

mod cart_sync;

pub use cart_sync::{CartSyncManager, ChangeDisposition};
