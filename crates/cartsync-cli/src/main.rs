//! cartsync CLI - drive the offline cart engine from a terminal
//!
//! Works against a durable local store and a local document store under the
//! data directory, so offline edits, sync, backup and restore can be
//! exercised without a live backend.

mod cli;
mod commands;
mod error;


use clap::Parser;

use crate::cli::{Cli, Commands, QueueCommands};
use crate::commands::backup::{run_backup, run_device_info, run_merge, run_restore};
use crate::commands::cache::{run_cleanup, run_clear, run_load, run_save};
use crate::commands::common::CliContext;
use crate::commands::queue::{run_apply, run_queue_add, run_queue_clear, run_queue_list};
use crate::commands::sync::{run_status, run_sync};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    if let Ok(directive) = "cartsync=info".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let context = CliContext::resolve(cli.data_dir, cli.config, cli.user)?;

    match cli.command {
        Commands::Save { file, publish } => run_save(&context, file.as_deref(), publish).await?,
        Commands::Load { json } => run_load(&context, json)?,
        Commands::Clear => run_clear(&context)?,
        Commands::Queue { command } => match command {
            QueueCommands::Add {
                change_type,
                item,
                data,
            } => run_queue_add(&context, &change_type, &item, data.as_deref())?,
            QueueCommands::List { json } => run_queue_list(&context, json)?,
            QueueCommands::Clear => run_queue_clear(&context)?,
        },
        Commands::Apply {
            change_type,
            item,
            data,
            offline,
        } => run_apply(&context, &change_type, &item, data.as_deref(), offline).await?,
        Commands::Status { json } => run_status(&context, json)?,
        Commands::Sync => run_sync(&context).await?,
        Commands::Backup => run_backup(&context).await?,
        Commands::Restore { json } => run_restore(&context, json).await?,
        Commands::Merge { apply } => run_merge(&context, apply).await?,
        Commands::Cleanup => run_cleanup(&context)?,
        Commands::DeviceInfo => run_device_info()?,
    }

    Ok(())
}
