//! Compact command implementation.

use super::open_store;
use std::path::Path;

/// Runs the compact command.
pub async fn run(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store(path).await?;
    let before = store.stats().await?;

    println!("Compacting journal at {}", path.display());
    println!("  Pending changes:   {}", before.live_records);
    println!("  Tombstones:        {}", before.tombstones);
    println!();

    let report = store.compact().await?;
    let saved = report.bytes_before.saturating_sub(report.bytes_after);

    println!("  Size before: {} bytes", report.bytes_before);
    println!("  Size after:  {} bytes", report.bytes_after);
    println!(
        "  Space saved: {} bytes ({:.1}%)",
        saved,
        if report.bytes_before > 0 {
            (saved as f64 / report.bytes_before as f64) * 100.0
        } else {
            0.0
        }
    );
    Ok(())
}
