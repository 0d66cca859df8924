use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] cartsync_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("No cart JSON provided. Pass --file or pipe it on stdin.")]
    EmptyInput,
    #[error("Invalid change: {0}")]
    InvalidChange(String),
    #[error("No local cart snapshot to back up")]
    NoLocalCart,
    #[error("`{0}` needs a signed-in user. Pass --user or set CARTSYNC_USER_ID.")]
    UserRequired(&'static str),
    #[error("Failed to write local cart state")]
    LocalWriteFailed,
    #[error("Cloud backup failed")]
    BackupFailed,
}
