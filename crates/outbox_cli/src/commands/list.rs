//! List command implementation.

use super::open_store;
use std::path::Path;

/// Runs the list command.
pub async fn run(
    path: &Path,
    since: Option<&str>,
    until: Option<&str>,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store(path).await?;
    let records = if since.is_some() || until.is_some() {
        store.list_by_timestamp(since, until).await?
    } else {
        store.list_all().await?
    };

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&records)?),
        _ => {
            if records.is_empty() {
                println!("No pending changes.");
                return Ok(());
            }
            println!("{:>8}  {:<24}  {:<37}  PAYLOAD", "ID", "TIMESTAMP", "CLIENT TEMP ID");
            for record in &records {
                println!(
                    "{:>8}  {:<24}  {:<37}  {}",
                    record.id,
                    record.timestamp,
                    record.client_temp_id,
                    serde_json::Value::Object(record.payload.clone())
                );
            }
            println!();
            println!("{} pending change(s)", records.len());
        }
    }
    Ok(())
}
