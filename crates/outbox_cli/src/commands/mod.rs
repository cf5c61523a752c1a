//! CLI command implementations.

pub mod compact;
pub mod dump_journal;
pub mod enqueue;
pub mod list;
pub mod sync;
pub mod watch;

use outbox_core::{CoreResult, RecordStore, StoreConfig};
use outbox_sync_engine::{NotificationSink, Severity};
use std::path::Path;

/// Opens and initializes the store at `path`.
pub async fn open_store(path: &Path) -> CoreResult<RecordStore> {
    let store = RecordStore::at_path(path, StoreConfig::default());
    store.initialize().await?;
    Ok(store)
}

/// Prints notifications to stdout.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleSink;

impl NotificationSink for ConsoleSink {
    fn notify(&self, message: &str, severity: Severity) {
        let tag = match severity {
            Severity::Info => "[info]   ",
            Severity::Success => "[ok]     ",
            Severity::Warning => "[warning]",
            Severity::Error => "[error]  ",
        };
        println!("{tag} {message}");
    }
}
