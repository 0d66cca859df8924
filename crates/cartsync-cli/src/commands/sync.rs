use serde_json::json;

use crate::commands::common::{format_timestamp, CliContext};
use crate::error::CliError;

pub fn run_status(context: &CliContext, as_json: bool) -> Result<(), CliError> {
    let manager = context.open_manager()?;
    let status = manager.get_sync_status();
    let queued = manager.get_offline_changes().len();

    if as_json {
        let payload = json!({
            "status": status.status,
            "timestamp": status.timestamp,
            "queued": queued,
            "user": manager.user_id(),
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    let since = if status.timestamp > 0 {
        format!(" since {}", format_timestamp(status.timestamp))
    } else {
        String::new()
    };
    println!("Status: {}{since}", status.status);
    println!("Queued changes: {queued}");
    Ok(())
}

pub async fn run_sync(context: &CliContext) -> Result<(), CliError> {
    let manager = context.open_manager()?;
    let report = manager.sync_offline_changes_report().await?;
    tracing::info!(
        "Synced offline cart changes for {}: {} written, {} skipped, {} remaining",
        manager.user_id().unwrap_or("anonymous"),
        report.submitted,
        report.skipped,
        report.remaining
    );

    if report.submitted == 0 && report.skipped == 0 {
        println!("Nothing to sync");
    } else {
        println!(
            "Sync completed: {} written, {} skipped",
            report.submitted, report.skipped
        );
    }
    if report.remaining > 0 {
        println!("{} change(s) queued during sync remain", report.remaining);
    }
    Ok(())
}
