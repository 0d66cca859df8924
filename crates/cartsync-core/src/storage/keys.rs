//! Per-user storage key layout

/// User id used to namespace keys when no one is signed in
pub const ANONYMOUS_USER: &str = "anonymous";

/// The three storage keys owned by one user's cart engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageKeys {
    pub snapshot: String,
    pub offline_changes: String,
    pub sync_status: String,
}

impl StorageKeys {
    /// Build keys for `user_id`, optionally under a namespace prefix
    pub fn new(user_id: Option<&str>, prefix: Option<&str>) -> Self {
        let user = user_id.unwrap_or(ANONYMOUS_USER);
        let prefix = prefix.map(|p| format!("{p}:")).unwrap_or_default();
        Self {
            snapshot: format!("{prefix}enhanced_cart_data_{user}"),
            offline_changes: format!("{prefix}offline_cart_changes_{user}"),
            sync_status: format!("{prefix}cart_sync_status_{user}"),
        }
    }

    /// All keys, in the order they are cleared
    pub fn all(&self) -> [&str; 3] {
        [
            self.snapshot.as_str(),
            self.offline_changes.as_str(),
            self.sync_status.as_str(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_are_namespaced_per_user() {
        let keys = StorageKeys::new(Some("u42"), None);
        assert_eq!(keys.snapshot, "enhanced_cart_data_u42");
        assert_eq!(keys.offline_changes, "offline_cart_changes_u42");
        assert_eq!(keys.sync_status, "cart_sync_status_u42");
    }

    #[test]
    fn test_keys_with_prefix_and_anonymous_user() {
        let keys = StorageKeys::new(None, Some("shop"));
        assert_eq!(keys.snapshot, "shop:enhanced_cart_data_anonymous");
    }
}
