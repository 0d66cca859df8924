//! Error types for cartsync-core

use thiserror::Error;

/// Result type alias using cartsync-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in cartsync-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Local storage failure (quota exceeded, storage disabled)
    #[error("Storage error: {0}")]
    Storage(String),

    /// `SQLite` error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Persisted data exists but cannot be understood
    #[error("Corrupt data under '{0}'")]
    CorruptData(String),

    /// Remote document store rejected or failed an operation
    #[error("Remote store error: {0}")]
    Remote(String),

    /// An offline change could not be turned into a remote write
    #[error("Invalid offline change: {0}")]
    InvalidChange(String),

    /// Document or record not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A sync batch is already being submitted
    #[error("A sync is already in progress")]
    SyncInProgress,
}
