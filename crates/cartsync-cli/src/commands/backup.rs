use crate::commands::common::{format_cart_lines, format_timestamp, CliContext};
use crate::error::CliError;

pub async fn run_backup(context: &CliContext) -> Result<(), CliError> {
    let manager = context.open_manager()?;
    if manager.user_id().is_none() {
        return Err(CliError::UserRequired("backup"));
    }
    let snapshot = manager.load_from_local().ok_or(CliError::NoLocalCart)?;
    if !manager.backup_to_cloud(&snapshot.data).await {
        return Err(CliError::BackupFailed);
    }
    println!("Backed up cart for {}", manager.user_id().unwrap_or_default());
    Ok(())
}

pub async fn run_restore(context: &CliContext, as_json: bool) -> Result<(), CliError> {
    let manager = context.open_manager()?;
    if manager.user_id().is_none() {
        return Err(CliError::UserRequired("restore"));
    }

    let Some(backup) = manager.restore_from_cloud().await else {
        if as_json {
            println!("null");
        } else {
            println!("No usable cloud backup.");
        }
        return Ok(());
    };

    if as_json {
        println!("{}", serde_json::to_string_pretty(&backup)?);
        return Ok(());
    }

    println!(
        "Backup from {} ({} on {})",
        format_timestamp(backup.metadata.backup_timestamp),
        backup.metadata.device_info.user_agent,
        backup.metadata.device_info.platform
    );
    for line in format_cart_lines(&backup.data) {
        println!("{line}");
    }
    Ok(())
}

pub async fn run_merge(context: &CliContext, apply: bool) -> Result<(), CliError> {
    let manager = context.open_manager()?;
    let local = manager.load_from_local();
    let cloud = manager.restore_from_cloud().await;

    let Some(outcome) = manager.merge_cart_data(local, cloud) else {
        println!("Neither a local snapshot nor a cloud backup exists.");
        return Ok(());
    };

    println!("Kept the {} copy", outcome.cart.source());
    if outcome.clock_skew_suspect {
        println!("Warning: timestamps are within the clock skew tolerance; ordering is uncertain");
    }
    for line in format_cart_lines(outcome.cart.data()) {
        println!("{line}");
    }

    if apply {
        if !manager.save_to_local(outcome.cart.data()) {
            return Err(CliError::LocalWriteFailed);
        }
        println!("Saved merged cart locally");
    }
    Ok(())
}

pub fn run_device_info() -> Result<(), CliError> {
    let info = cartsync_core::models::DeviceInfo::capture();
    println!("{}", serde_json::to_string_pretty(&info)?);
    Ok(())
}
