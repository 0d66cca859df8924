use cartsync_core::ChangeDisposition;

use crate::commands::common::{
    change_to_list_item, format_change_lines, now_ms, parse_change_request, ChangeListItem,
    CliContext,
};
use crate::error::CliError;

pub fn run_queue_add(
    context: &CliContext,
    change_type: &str,
    item_id: &str,
    data: Option<&str>,
) -> Result<(), CliError> {
    let request = parse_change_request(change_type, item_id, data)?;
    let manager = context.open_manager()?;
    let change = manager
        .add_offline_change(request)
        .ok_or(CliError::LocalWriteFailed)?;
    println!("Queued {} for {} ({})", change.change_type, change.item_id, change.id);
    Ok(())
}

pub fn run_queue_list(context: &CliContext, as_json: bool) -> Result<(), CliError> {
    let manager = context.open_manager()?;
    let changes = manager.get_offline_changes();

    if as_json {
        let json_items = changes
            .iter()
            .map(change_to_list_item)
            .collect::<Vec<ChangeListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
        return Ok(());
    }

    if changes.is_empty() {
        println!("No offline changes queued.");
        return Ok(());
    }

    for line in format_change_lines(&changes, now_ms()) {
        println!("{line}");
    }
    Ok(())
}

pub fn run_queue_clear(context: &CliContext) -> Result<(), CliError> {
    let manager = context.open_manager()?;
    if !manager.clear_offline_changes() {
        return Err(CliError::LocalWriteFailed);
    }
    println!("Cleared offline change queue");
    Ok(())
}

pub async fn run_apply(
    context: &CliContext,
    change_type: &str,
    item_id: &str,
    data: Option<&str>,
    offline: bool,
) -> Result<(), CliError> {
    let request = parse_change_request(change_type, item_id, data)?;
    let manager = context.open_manager()?;
    manager.set_online(!offline);

    match manager.apply_change(request).await {
        ChangeDisposition::Synced => println!("Applied and written to the document store"),
        ChangeDisposition::Queued => println!("Applied locally and queued for sync"),
        ChangeDisposition::Rejected => {
            return Err(CliError::InvalidChange(format!(
                "could not apply {change_type} to {item_id}; is it in the local cart?"
            )))
        }
    }
    Ok(())
}
