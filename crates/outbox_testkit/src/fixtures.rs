//! Test fixtures and store helpers.
//!
//! Provides ready-to-use stores and payloads for common test scenarios.

use outbox_core::{ChangeRecord, PayloadMap, RecordStore, StoreConfig};
use proptest::prelude::*;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// File name used by [`TestStore::file`].
pub const JOURNAL_FILE: &str = "outbox.journal";

/// An initialized store with automatic cleanup.
pub struct TestStore {
    /// The store handle.
    pub store: RecordStore,
    /// The temporary directory (kept alive to prevent cleanup).
    temp_dir: Option<TempDir>,
}

impl TestStore {
    /// Creates an initialized in-memory store.
    pub async fn memory() -> Self {
        let store = RecordStore::in_memory();
        store
            .initialize()
            .await
            .expect("Failed to initialize in-memory store");
        Self {
            store,
            temp_dir: None,
        }
    }

    /// Creates an initialized store journaling into a fresh temp directory.
    pub async fn file() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = RecordStore::at_path(temp_dir.path().join(JOURNAL_FILE), StoreConfig::default());
        store
            .initialize()
            .await
            .expect("Failed to initialize file store");
        Self {
            store,
            temp_dir: Some(temp_dir),
        }
    }

    /// Returns the journal path if file-based, None if in-memory.
    pub fn path(&self) -> Option<PathBuf> {
        self.temp_dir.as_ref().map(|d| d.path().join(JOURNAL_FILE))
    }

    /// Returns the temp directory if file-based.
    pub fn dir(&self) -> Option<&Path> {
        self.temp_dir.as_ref().map(TempDir::path)
    }

    /// Returns a clone of the store handle.
    pub fn handle(&self) -> RecordStore {
        self.store.clone()
    }
}

impl std::ops::Deref for TestStore {
    type Target = RecordStore;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

/// Builds a payload from a JSON object literal.
///
/// # Panics
///
/// Panics if `value` is not an object.
pub fn payload(value: Value) -> PayloadMap {
    match value {
        Value::Object(map) => map,
        other => panic!("payload must be a JSON object, got {other}"),
    }
}

/// A small task-update payload tagged with `n`.
pub fn task_update(n: usize) -> PayloadMap {
    payload(json!({
        "entity": "task",
        "action": "update",
        "taskId": n,
        "fields": { "done": n % 2 == 0 }
    }))
}

/// Appends `n` task updates and returns the staged records.
pub async fn stage(store: &RecordStore, n: usize) -> Vec<ChangeRecord> {
    let mut records = Vec::with_capacity(n);
    for i in 0..n {
        records.push(
            store
                .append(task_update(i))
                .await
                .expect("Failed to stage record"),
        );
    }
    records
}

/// Strategy producing arbitrary flat payloads.
pub fn arb_payload() -> impl Strategy<Value = PayloadMap> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        "[a-zA-Z0-9 ]{0,24}".prop_map(Value::from),
    ];
    prop::collection::btree_map("[a-z][a-zA-Z]{0,11}", leaf, 0..6)
        .prop_map(|fields| fields.into_iter().collect::<PayloadMap>())
}
