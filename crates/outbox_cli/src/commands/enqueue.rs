//! Enqueue command implementation.

use super::open_store;
use outbox_core::PayloadMap;
use std::path::Path;

/// Parses a payload given on the command line.
pub fn parse_payload(raw: &str) -> Result<PayloadMap, Box<dyn std::error::Error>> {
    match serde_json::from_str::<serde_json::Value>(raw)? {
        serde_json::Value::Object(map) => Ok(map),
        other => Err(format!("payload must be a JSON object, got {other}").into()),
    }
}

/// Runs the enqueue command.
pub async fn run(path: &Path, raw: &str, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let payload = parse_payload(raw)?;
    let store = open_store(path).await?;
    let record = store.append(payload).await?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&record)?),
        _ => println!(
            "Staged change {} ({}) at {}",
            record.id, record.client_temp_id, record.timestamp
        ),
    }
    Ok(())
}
