//! Cloud backup model

use serde::{Deserialize, Serialize};

use super::CartData;

/// Descriptive metadata about the device that wrote a backup
///
/// Never consulted when resolving conflicts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    pub user_agent: String,
    pub platform: String,
    pub language: String,
    #[serde(default)]
    pub screen_resolution: Option<String>,
    pub timezone: String,
    /// Capture time (Unix ms)
    pub timestamp: i64,
}

impl DeviceInfo {
    /// Describe the current process environment
    #[must_use]
    pub fn capture() -> Self {
        let now = chrono::Local::now();
        Self {
            user_agent: format!("cartsync/{}", env!("CARGO_PKG_VERSION")),
            platform: format!("{}-{}", std::env::consts::OS, std::env::consts::ARCH),
            language: detect_language(),
            screen_resolution: None,
            timezone: now.offset().to_string(),
            timestamp: now.timestamp_millis(),
        }
    }
}

fn detect_language() -> String {
    ["LC_ALL", "LC_MESSAGES", "LANG"]
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .map(|value| value.split('.').next().unwrap_or_default().replace('_', "-"))
        .find(|value| !value.is_empty() && value != "C" && value != "POSIX")
        .unwrap_or_else(|| "en-US".to_string())
}

/// Metadata stored alongside the backed-up collections
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupMetadata {
    pub device_info: DeviceInfo,
    /// Server time of the backup write (Unix ms)
    pub backup_timestamp: i64,
    pub version: String,
}

/// A per-user backup document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudBackup {
    pub user_id: String,
    #[serde(flatten)]
    pub data: CartData,
    pub metadata: BackupMetadata,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_info_capture_is_populated() {
        let info = DeviceInfo::capture();
        assert!(info.user_agent.starts_with("cartsync/"));
        assert!(!info.platform.is_empty());
        assert!(!info.language.is_empty());
        assert!(info.timestamp > 0);
    }

    #[test]
    fn test_backup_document_shape() {
        let backup = CloudBackup {
            user_id: "u1".into(),
            data: CartData::default(),
            metadata: BackupMetadata {
                device_info: DeviceInfo::capture(),
                backup_timestamp: 10,
                version: "2".into(),
            },
        };
        let json = serde_json::to_value(&backup).unwrap();
        assert_eq!(json["userId"], "u1");
        assert!(json["cartItems"].is_array());
        assert_eq!(json["metadata"]["backupTimestamp"], 10);
        assert!(json["metadata"]["deviceInfo"]["userAgent"].is_string());
    }
}
