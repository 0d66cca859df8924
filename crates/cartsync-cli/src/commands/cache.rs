use std::path::Path;

use cartsync_core::remote::{fields_from_document, DocumentRef, FieldValue};
use cartsync_core::{CartData, RemoteStore};
use serde_json::Value;

use crate::commands::common::{
    format_cart_lines, format_timestamp, read_cart_input, CliContext, CliManager,
};
use crate::error::CliError;

pub async fn run_save(context: &CliContext, file: Option<&Path>, publish: bool) -> Result<(), CliError> {
    let data = read_cart_input(file)?;
    let manager = context.open_manager()?;
    if !manager.save_to_local(&data) {
        return Err(CliError::LocalWriteFailed);
    }
    println!(
        "Saved cart: {} in cart, {} saved for later, {} on wishlist",
        data.cart_items.len(),
        data.saved_items.len(),
        data.wishlist_items.len()
    );

    if publish {
        let published = publish_items(&manager, &data).await?;
        println!("Published {published} cart item document(s)");
    }
    Ok(())
}

/// Merge-write one cart-item document per cart and saved item
pub async fn publish_items(manager: &CliManager, data: &CartData) -> Result<usize, CliError> {
    let collection = &manager.config().cart_collection;
    let mut published = 0;
    for item in data.cart_items.iter().chain(&data.saved_items) {
        let Value::Object(document) = serde_json::to_value(item)? else {
            continue;
        };
        let mut fields = fields_from_document(document);
        fields.remove("id");
        if let Some(user_id) = manager.user_id() {
            fields.insert("userId".into(), FieldValue::Value(Value::from(user_id)));
        }
        fields.insert("updatedAt".into(), FieldValue::ServerTimestamp);
        manager
            .remote()
            .set_document(&DocumentRef::new(collection.as_str(), item.id.as_str()), fields, true)
            .await?;
        published += 1;
    }
    Ok(published)
}

pub fn run_load(context: &CliContext, as_json: bool) -> Result<(), CliError> {
    let manager = context.open_manager()?;
    let Some(snapshot) = manager.load_from_local() else {
        if as_json {
            println!("null");
        } else {
            println!("No local cart snapshot.");
        }
        return Ok(());
    };

    if as_json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }

    println!(
        "Snapshot v{} saved {}",
        snapshot.version,
        format_timestamp(snapshot.timestamp)
    );
    for line in format_cart_lines(&snapshot.data) {
        println!("{line}");
    }
    Ok(())
}

pub fn run_clear(context: &CliContext) -> Result<(), CliError> {
    let manager = context.open_manager()?;
    if !manager.clear_local() {
        return Err(CliError::LocalWriteFailed);
    }
    println!("Cleared local cart state");
    Ok(())
}

pub fn run_cleanup(context: &CliContext) -> Result<(), CliError> {
    let manager = context.open_manager()?;
    let report = manager.cleanup();
    if report.snapshot_purged {
        println!("Purged expired local cart snapshot");
    }
    println!("Dropped {} expired offline change(s)", report.changes_dropped);
    Ok(())
}
