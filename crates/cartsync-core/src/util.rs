//! Shared utility functions used across multiple modules.

/// Milliseconds in one hour.
pub const HOUR_MS: i64 = 60 * 60 * 1000;

/// Milliseconds in one day.
pub const DAY_MS: i64 = 24 * HOUR_MS;

/// Normalize optional text by trimming whitespace and removing empties.
///
/// Returns `None` when the input is `None` or the trimmed value is empty.
pub fn normalize_text_option(value: Option<String>) -> Option<String> {
    let value = value?;
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Current Unix timestamp in milliseconds.
pub fn unix_timestamp_ms_now() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Whether `timestamp_ms` lies more than `max_age_ms` before `now_ms`.
pub const fn is_older_than(timestamp_ms: i64, max_age_ms: i64, now_ms: i64) -> bool {
    now_ms.saturating_sub(timestamp_ms) > max_age_ms
}
