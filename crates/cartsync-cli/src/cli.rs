use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "cartsync")]
#[command(about = "Offline-first cart persistence and sync from the command line")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Directory holding the local and document databases
    #[arg(long, global = true, value_name = "PATH")]
    pub data_dir: Option<PathBuf>,

    /// Engine config file (defaults to <data-dir>/config.json)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Signed-in user id (falls back to CARTSYNC_USER_ID)
    #[arg(long, global = true, value_name = "ID")]
    pub user: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Save a cart snapshot from a JSON file or stdin
    Save {
        /// JSON file with cartItems, savedItems and wishlistItems
        #[arg(short, long, value_name = "PATH")]
        file: Option<PathBuf>,
        /// Also write each item as a cart-item document
        #[arg(long)]
        publish: bool,
    },
    /// Show the local cart snapshot
    Load {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove the local snapshot, queue and status
    Clear,
    /// Inspect or edit the offline change queue
    Queue {
        #[command(subcommand)]
        command: QueueCommands,
    },
    /// Apply a cart edit locally, then write it through or queue it
    Apply {
        /// Change type (e.g. update_quantity)
        #[arg(long = "type", value_name = "TYPE")]
        change_type: String,
        /// Cart item id
        #[arg(long, value_name = "ID")]
        item: String,
        /// Patch as a JSON object (e.g. '{"quantity": 2}')
        #[arg(long, value_name = "JSON")]
        data: Option<String>,
        /// Treat the device as offline and queue the change
        #[arg(long)]
        offline: bool,
    },
    /// Show the sync status
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Replay the offline queue against the document store
    Sync,
    /// Back the local cart up to the document store
    Backup,
    /// Fetch the cloud backup
    Restore {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Compare the local snapshot with the cloud backup
    Merge {
        /// Save the winning cart locally
        #[arg(long)]
        apply: bool,
    },
    /// Purge expired local state
    Cleanup,
    /// Print the device metadata recorded with backups
    DeviceInfo,
}

#[derive(Subcommand)]
pub enum QueueCommands {
    /// Queue a change without touching the local snapshot
    Add {
        /// Change type (e.g. update_quantity)
        #[arg(long = "type", value_name = "TYPE")]
        change_type: String,
        /// Cart item id
        #[arg(long, value_name = "ID")]
        item: String,
        /// Patch as a JSON object (e.g. '{"quantity": 2}')
        #[arg(long, value_name = "JSON")]
        data: Option<String>,
    },
    /// List queued changes in replay order
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Empty the queue
    Clear,
}
