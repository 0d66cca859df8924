//! Engine configuration.
//!
//! Every field has a default, so an absent config file yields the standard
//! retention windows: 7-day snapshots, 24-hour queue entries, 30-day backups.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::util::{normalize_text_option, DAY_MS, HOUR_MS};

const CONFIG_SCHEMA_VERSION: u32 = 1;

/// Default collection holding one document per cart item
pub const DEFAULT_CART_COLLECTION: &str = "cart_items";

/// Default collection holding one backup document per user
pub const DEFAULT_BACKUP_COLLECTION: &str = "cart_backups";

/// Tunables for the cart persistence and sync engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CartSyncConfig {
    /// Local snapshots older than this are purged on load
    pub snapshot_ttl_ms: i64,
    /// Queued changes older than this are dropped by cleanup
    pub queue_entry_max_age_ms: i64,
    /// Backups older than this are ignored on restore
    pub backup_max_age_ms: i64,
    /// Timestamps closer than this are flagged as clock-skew suspect
    pub clock_skew_tolerance_ms: i64,
    pub cart_collection: String,
    pub backup_collection: String,
    /// Namespace prepended to the local storage keys
    pub key_prefix: Option<String>,
}

impl Default for CartSyncConfig {
    fn default() -> Self {
        Self {
            snapshot_ttl_ms: 7 * DAY_MS,
            queue_entry_max_age_ms: 24 * HOUR_MS,
            backup_max_age_ms: 30 * DAY_MS,
            clock_skew_tolerance_ms: 5 * 60 * 1000,
            cart_collection: DEFAULT_CART_COLLECTION.to_string(),
            backup_collection: DEFAULT_BACKUP_COLLECTION.to_string(),
            key_prefix: None,
        }
    }
}

impl CartSyncConfig {
    /// Load a config file, falling back to defaults when it does not exist
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(payload) => parse_config(&payload),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No config at {}; using defaults", path.display());
                Ok(Self::default())
            }
            Err(error) => Err(error.into()),
        }
    }

    /// Reject values that would disable the retention rules
    pub fn validate(&self) -> Result<()> {
        let windows = [
            ("snapshot_ttl_ms", self.snapshot_ttl_ms),
            ("queue_entry_max_age_ms", self.queue_entry_max_age_ms),
            ("backup_max_age_ms", self.backup_max_age_ms),
        ];
        for (field, value) in windows {
            if value <= 0 {
                return Err(Error::InvalidInput(format!(
                    "config field '{field}' must be positive"
                )));
            }
        }
        if self.clock_skew_tolerance_ms < 0 {
            return Err(Error::InvalidInput(
                "config field 'clock_skew_tolerance_ms' must not be negative".into(),
            ));
        }
        for (field, value) in [
            ("cart_collection", &self.cart_collection),
            ("backup_collection", &self.backup_collection),
        ] {
            if value.trim().is_empty() {
                return Err(Error::InvalidInput(format!(
                    "config field '{field}' is required"
                )));
            }
        }
        Ok(())
    }

    /// Key prefix with surrounding whitespace removed, `None` when blank
    pub fn normalized_key_prefix(&self) -> Option<String> {
        normalize_text_option(self.key_prefix.clone())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    schema_version: u32,
    #[serde(default)]
    cartsync: CartSyncConfig,
}

/// Parse a config file payload
///
/// Accepts `{"schema_version": 1, "cartsync": {...}}`.
pub fn parse_config(payload: &str) -> Result<CartSyncConfig> {
    let file: ConfigFile = serde_json::from_str(payload)
        .map_err(|error| Error::InvalidInput(format!("invalid config JSON: {error}")))?;
    if file.schema_version != CONFIG_SCHEMA_VERSION {
        return Err(Error::InvalidInput(format!(
            "unsupported config schema_version {} (expected {CONFIG_SCHEMA_VERSION})",
            file.schema_version
        )));
    }
    file.cartsync.validate()?;
    Ok(file.cartsync)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn default_windows_match_retention_rules() {
        let config = CartSyncConfig::default();
        assert_eq!(config.snapshot_ttl_ms, 604_800_000);
        assert_eq!(config.queue_entry_max_age_ms, 86_400_000);
        assert_eq!(config.backup_max_age_ms, 2_592_000_000);
        assert_eq!(config.backup_collection, "cart_backups");
        config.validate().unwrap();
    }

    #[test]
    fn parse_config_fills_defaults() {
        let config = parse_config(
            r#"{"schema_version": 1, "cartsync": {"key_prefix": "shop"}}"#,
        )
        .unwrap();
        assert_eq!(config.normalized_key_prefix().as_deref(), Some("shop"));
        assert_eq!(config.snapshot_ttl_ms, 7 * DAY_MS);
    }

    #[test]
    fn parse_config_rejects_unknown_fields() {
        let error = parse_config(
            r#"{"schema_version": 1, "cartsync": {"snapshot_ttl": 5}}"#,
        )
        .unwrap_err();
        assert!(error.to_string().contains("unknown field"));
    }

    #[test]
    fn parse_config_rejects_invalid_schema_version() {
        let error = parse_config(r#"{"schema_version": 9}"#).unwrap_err();
        assert!(error.to_string().contains("schema_version"));
    }

    #[test]
    fn parse_config_rejects_zero_windows() {
        let error = parse_config(
            r#"{"schema_version": 1, "cartsync": {"backup_max_age_ms": 0}}"#,
        )
        .unwrap_err();
        assert!(error.to_string().contains("backup_max_age_ms"));
    }

    #[test]
    fn load_missing_file_uses_defaults() {
        let tmp = tempdir().unwrap();
        let config = CartSyncConfig::load(tmp.path().join("absent.json")).unwrap();
        assert_eq!(config, CartSyncConfig::default());
    }
}
