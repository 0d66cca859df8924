use std::env;
use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};

use cartsync_core::models::validate_quantity;
use cartsync_core::sync::change_to_write;
use cartsync_core::{
    CartData, CartItem, CartSyncConfig, CartSyncManager, ChangeRequest, ChangeType,
    OfflineChange, SqliteDocumentStore, SqliteStore,
};
use serde::Serialize;
use serde_json::Value;

use crate::error::CliError;

pub type CliManager = CartSyncManager<SqliteStore, SqliteDocumentStore>;

const USER_ENV: &str = "CARTSYNC_USER_ID";
const LOCAL_DB_FILE: &str = "local.db";
const DOCUMENTS_DB_FILE: &str = "documents.db";
const CONFIG_FILE: &str = "config.json";

/// Paths and identity resolved from flags and the environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliContext {
    pub data_dir: PathBuf,
    pub config: CartSyncConfig,
    pub user_id: Option<String>,
}

impl CliContext {
    pub fn resolve(
        data_dir: Option<PathBuf>,
        config_path: Option<PathBuf>,
        user: Option<String>,
    ) -> Result<Self, CliError> {
        let data_dir = data_dir.unwrap_or_else(default_data_dir);
        let config_path = config_path.unwrap_or_else(|| data_dir.join(CONFIG_FILE));
        let config = CartSyncConfig::load(&config_path)?;
        Ok(Self {
            data_dir,
            config,
            user_id: resolve_user_id(user, env::var(USER_ENV).ok()),
        })
    }

    pub fn open_manager(&self) -> Result<CliManager, CliError> {
        std::fs::create_dir_all(&self.data_dir)?;
        let store = SqliteStore::open(self.data_dir.join(LOCAL_DB_FILE))?;
        let remote = SqliteDocumentStore::open(self.data_dir.join(DOCUMENTS_DB_FILE))?;
        tracing::debug!(
            "Opened cart stores under {} for user {}",
            self.data_dir.display(),
            self.user_id.as_deref().unwrap_or("anonymous")
        );
        Ok(CartSyncManager::with_config(
            self.user_id.as_deref(),
            store,
            remote,
            self.config.clone(),
        ))
    }
}

pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("cartsync")
}

/// Explicit flag first, then the environment; blank values count as unset
pub fn resolve_user_id(flag: Option<String>, env_value: Option<String>) -> Option<String> {
    [flag, env_value]
        .into_iter()
        .flatten()
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
}

pub fn read_cart_input(file: Option<&Path>) -> Result<CartData, CliError> {
    let payload = match file {
        Some(path) => Some(std::fs::read_to_string(path)?),
        None => read_piped_stdin()?,
    };
    let payload = payload
        .filter(|payload| !payload.trim().is_empty())
        .ok_or(CliError::EmptyInput)?;
    parse_cart_data(&payload)
}

pub fn parse_cart_data(payload: &str) -> Result<CartData, CliError> {
    let data: CartData = serde_json::from_str(payload)?;
    for item in data.cart_items.iter().chain(&data.saved_items) {
        validate_quantity(item.quantity).map_err(|error| {
            CliError::InvalidChange(format!("cart item {}: {error}", item.id))
        })?;
    }
    Ok(data)
}

fn read_piped_stdin() -> Result<Option<String>, CliError> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        return Ok(None);
    }

    let mut buffer = String::new();
    stdin.lock().read_to_string(&mut buffer)?;
    Ok(Some(buffer))
}

/// Build a change request from CLI arguments, rejecting patches that could
/// never be written remotely
pub fn parse_change_request(
    change_type: &str,
    item_id: &str,
    data: Option<&str>,
) -> Result<ChangeRequest, CliError> {
    let change_type: ChangeType = change_type
        .parse()
        .map_err(|error: cartsync_core::Error| CliError::InvalidChange(error.to_string()))?;

    let item_id = item_id.trim();
    if item_id.is_empty() {
        return Err(CliError::InvalidChange("item id cannot be empty".into()));
    }

    let data = match data.map(str::trim).filter(|data| !data.is_empty()) {
        Some(raw) => match serde_json::from_str::<Value>(raw)? {
            Value::Object(map) => map,
            _ => {
                return Err(CliError::InvalidChange(
                    "--data must be a JSON object".into(),
                ))
            }
        },
        None => serde_json::Map::new(),
    };

    let request = ChangeRequest::new(change_type, item_id, data);
    change_to_write(&OfflineChange::from_request(request.clone(), 0), "validate")
        .map_err(|error| CliError::InvalidChange(error.to_string()))?;
    Ok(request)
}

#[derive(Debug, Serialize)]
pub struct ChangeListItem {
    pub id: String,
    #[serde(rename = "type")]
    pub change_type: String,
    pub item_id: String,
    pub data: serde_json::Map<String, Value>,
    pub timestamp: i64,
    pub queued_at: String,
}

pub fn change_to_list_item(change: &OfflineChange) -> ChangeListItem {
    ChangeListItem {
        id: change.id.to_string(),
        change_type: change.change_type.to_string(),
        item_id: change.item_id.clone(),
        data: change.data.clone(),
        timestamp: change.timestamp,
        queued_at: format_timestamp(change.timestamp),
    }
}

pub fn format_change_lines(changes: &[OfflineChange], now_ms: i64) -> Vec<String> {
    changes
        .iter()
        .enumerate()
        .map(|(index, change)| {
            let data = if change.data.is_empty() {
                String::new()
            } else {
                format!("  {}", Value::Object(change.data.clone()))
            };
            format!(
                "{:>3}. {:<16} item={}{}  ({})",
                index + 1,
                change.change_type.as_str(),
                change.item_id,
                data,
                format_relative_time(change.timestamp, now_ms)
            )
        })
        .collect()
}

pub fn format_cart_lines(data: &CartData) -> Vec<String> {
    let mut lines = Vec::new();
    push_item_section(&mut lines, "Cart", &data.cart_items);
    push_item_section(&mut lines, "Saved for later", &data.saved_items);

    lines.push(format!("Wishlist ({})", data.wishlist_items.len()));
    for item in &data.wishlist_items {
        let priority = item
            .priority
            .map(|priority| format!("  [{priority}]"))
            .unwrap_or_default();
        lines.push(format!("  {}  book={}{priority}", item.id, item.book_id));
    }
    lines
}

fn push_item_section(lines: &mut Vec<String>, title: &str, items: &[CartItem]) {
    lines.push(format!("{title} ({})", items.len()));
    for item in items {
        let priority = item
            .priority
            .map(|priority| format!("  [{priority}]"))
            .unwrap_or_default();
        let notes = item
            .notes
            .as_deref()
            .map(|notes| format!("  \"{notes}\""))
            .unwrap_or_default();
        lines.push(format!(
            "  {}  book={}  x{}{priority}{notes}",
            item.id, item.book_id, item.quantity
        ));
    }
}

pub fn format_timestamp(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else {
        format!("{}d ago", diff / day)
    }
}

pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
