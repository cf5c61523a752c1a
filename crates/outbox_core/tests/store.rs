//! Integration tests for the record store: persistence across reopen and
//! behavior under injected storage faults.

use outbox_core::{CoreError, RecordId, RecordStore, StoreConfig, HEADER_SIZE};
use outbox_storage::StorageError;
use outbox_testkit::{arb_payload, stage, task_update, FaultyBackend, TestStore, JOURNAL_FILE};
use proptest::prelude::*;
use tempfile::TempDir;

fn reopen(dir: &TempDir) -> RecordStore {
    RecordStore::at_path(dir.path().join(JOURNAL_FILE), StoreConfig::default())
}

#[tokio::test]
async fn records_survive_reopen() {
    let dir = TempDir::new().unwrap();

    let staged = {
        let store = reopen(&dir);
        store.initialize().await.unwrap();
        let staged = stage(&store, 3).await;
        store.delete_by_id(staged[0].id).await.unwrap();
        staged
    };

    let store = reopen(&dir);
    store.initialize().await.unwrap();
    assert_eq!(store.list_all().await.unwrap(), staged[1..].to_vec());

    let next = store.append(task_update(9)).await.unwrap();
    assert_eq!(next.id, RecordId::new(4));
}

#[tokio::test]
async fn ids_never_reused_after_compaction_and_reopen() {
    let dir = TempDir::new().unwrap();

    {
        let store = reopen(&dir);
        store.initialize().await.unwrap();
        let staged = stage(&store, 5).await;
        for record in &staged {
            store.delete_by_id(record.id).await.unwrap();
        }
        store.compact().await.unwrap();
        assert_eq!(store.stats().await.unwrap().live_records, 0);
    }

    let store = reopen(&dir);
    store.initialize().await.unwrap();
    assert!(store.is_empty().await.unwrap());
    assert_eq!(store.append(task_update(0)).await.unwrap().id, RecordId::new(6));
}

#[tokio::test]
async fn second_process_is_locked_out() {
    let store = TestStore::file().await;
    let path = store.path().unwrap();

    let intruder = RecordStore::at_path(&path, StoreConfig::default());
    let err = intruder.initialize().await.unwrap_err();
    assert!(matches!(
        err,
        CoreError::Storage(StorageError::Locked { .. })
    ));
    assert!(!intruder.is_ready());
}

#[tokio::test]
async fn missing_directory_without_create_dirs_fails() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join(JOURNAL_FILE);

    let store = RecordStore::at_path(&path, StoreConfig::default().create_dirs(false));
    assert!(store.initialize().await.unwrap_err().is_storage());

    let store = RecordStore::at_path(&path, StoreConfig::default());
    store.initialize().await.unwrap();
    assert!(path.exists());
}

#[tokio::test]
async fn flipped_byte_fails_initialize() {
    let dir = TempDir::new().unwrap();
    {
        let store = reopen(&dir);
        store.initialize().await.unwrap();
        stage(&store, 2).await;
    }

    let path = dir.path().join(JOURNAL_FILE);
    let mut bytes = std::fs::read(&path).unwrap();
    bytes[HEADER_SIZE + 5] ^= 0xFF;
    std::fs::write(&path, bytes).unwrap();

    let store = reopen(&dir);
    let err = store.initialize().await.unwrap_err();
    assert!(matches!(err, CoreError::ChecksumMismatch { offset: 0, .. }));
}

#[tokio::test]
async fn failed_append_leaves_store_unchanged() {
    let backend = FaultyBackend::new();
    let store = RecordStore::with_backend(Box::new(backend.clone()), StoreConfig::default());
    store.initialize().await.unwrap();
    let first = store.append(task_update(0)).await.unwrap();
    let journal = backend.bytes();

    backend.fail_appends(true);
    let err = store.append(task_update(1)).await.unwrap_err();
    assert!(err.is_storage());
    assert_eq!(store.list_all().await.unwrap(), vec![first.clone()]);
    assert_eq!(backend.bytes(), journal);

    backend.reset();
    let second = store.append(task_update(1)).await.unwrap();
    assert_eq!(second.id, RecordId::new(2));
}

#[tokio::test]
async fn partial_write_is_rolled_back() {
    let backend = FaultyBackend::new();
    let store = RecordStore::with_backend(Box::new(backend.clone()), StoreConfig::default());
    store.initialize().await.unwrap();
    store.append(task_update(0)).await.unwrap();
    let journal = backend.bytes();

    backend.crash_after(10);
    assert!(store.append(task_update(1)).await.is_err());
    assert!(backend.has_crashed());
    assert_eq!(backend.bytes(), journal);
    assert_eq!(store.len().await.unwrap(), 1);
}

#[tokio::test]
async fn failed_flush_does_not_stage() {
    let backend = FaultyBackend::new();
    let store = RecordStore::with_backend(Box::new(backend.clone()), StoreConfig::default());
    store.initialize().await.unwrap();

    backend.fail_flush(true);
    assert!(store.append(task_update(0)).await.is_err());
    assert!(store.is_empty().await.unwrap());
    assert!(backend.bytes().is_empty());
}

#[tokio::test]
async fn failed_delete_keeps_record() {
    let backend = FaultyBackend::new();
    let store = RecordStore::with_backend(Box::new(backend.clone()), StoreConfig::default());
    store.initialize().await.unwrap();
    let record = store.append(task_update(0)).await.unwrap();

    backend.fail_appends(true);
    assert!(store.delete_by_id(record.id).await.is_err());
    assert_eq!(store.get(record.id).await.unwrap(), Some(record));
}

#[tokio::test]
async fn failed_compaction_keeps_old_journal() {
    let backend = FaultyBackend::new();
    let store = RecordStore::with_backend(
        Box::new(backend.clone()),
        StoreConfig::default().compact_after(0),
    );
    store.initialize().await.unwrap();
    let staged = stage(&store, 2).await;
    store.delete_by_id(staged[0].id).await.unwrap();
    let journal = backend.bytes();

    backend.fail_replace(true);
    assert!(store.compact().await.is_err());
    assert_eq!(backend.bytes(), journal);
    assert_eq!(store.list_all().await.unwrap(), vec![staged[1].clone()]);
}

#[tokio::test]
async fn automatic_compaction_failure_does_not_fail_delete() {
    let backend = FaultyBackend::new();
    let store = RecordStore::with_backend(
        Box::new(backend.clone()),
        StoreConfig::default().compact_after(1),
    );
    store.initialize().await.unwrap();
    let staged = stage(&store, 2).await;

    backend.fail_replace(true);
    assert!(store.delete_by_id(staged[0].id).await.unwrap());
    assert_eq!(store.stats().await.unwrap().tombstones, 1);
}

#[tokio::test]
async fn writes_after_failed_automatic_compaction_are_replayed() {
    let backend = FaultyBackend::new();
    let store = RecordStore::with_backend(
        Box::new(backend.clone()),
        StoreConfig::default().compact_after(1),
    );
    store.initialize().await.unwrap();
    let staged = stage(&store, 2).await;

    backend.fail_replace(true);
    store.delete_by_id(staged[0].id).await.unwrap();
    let later = store.append(task_update(7)).await.unwrap();
    store.delete_by_id(staged[1].id).await.unwrap();

    let replayed = RecordStore::with_backend(
        Box::new(FaultyBackend::with_data(backend.bytes())),
        StoreConfig::default(),
    );
    replayed.initialize().await.unwrap();
    assert_eq!(replayed.list_all().await.unwrap(), vec![later]);
}

#[tokio::test]
async fn writes_after_automatic_compaction_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(JOURNAL_FILE);
    let config = StoreConfig::default().compact_after(1);

    let survivors = {
        let store = RecordStore::at_path(&path, config.clone());
        store.initialize().await.unwrap();
        let staged = stage(&store, 3).await;
        store.delete_by_id(staged[0].id).await.unwrap();
        assert_eq!(store.stats().await.unwrap().tombstones, 0);

        let later = store.append(task_update(7)).await.unwrap();
        store.delete_by_id(staged[1].id).await.unwrap();
        vec![staged[2].clone(), later]
    };

    let store = RecordStore::at_path(&path, config);
    store.initialize().await.unwrap();
    assert_eq!(store.list_all().await.unwrap(), survivors);
    assert_eq!(store.append(task_update(8)).await.unwrap().id, RecordId::new(5));
}

#[tokio::test]
async fn crash_mid_frame_recovers_on_next_open() {
    let backend = FaultyBackend::new();
    {
        let store =
            RecordStore::with_backend(Box::new(backend.clone()), StoreConfig::default());
        store.initialize().await.unwrap();
        stage(&store, 2).await;
    }

    // Simulate a torn frame from a process that died mid-write.
    let mut bytes = backend.bytes();
    let intact = bytes.len();
    let fragment = bytes[..HEADER_SIZE + 3].to_vec();
    bytes.extend_from_slice(&fragment);
    let torn = FaultyBackend::with_data(bytes);

    let store = RecordStore::with_backend(Box::new(torn.clone()), StoreConfig::default());
    store.initialize().await.unwrap();
    assert_eq!(store.len().await.unwrap(), 2);
    assert_eq!(torn.bytes().len(), intact);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn list_all_counts_every_append(payloads in prop::collection::vec(arb_payload(), 0..20)) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        runtime.block_on(async {
            let store = RecordStore::in_memory();
            store.initialize().await.unwrap();

            let mut ids = Vec::new();
            for payload in &payloads {
                ids.push(store.append(payload.clone()).await.unwrap().id);
            }

            let listed = store.list_all().await.unwrap();
            prop_assert_eq!(listed.len(), payloads.len());
            prop_assert_eq!(listed.iter().map(|r| r.id).collect::<Vec<_>>(), ids);
            for (record, payload) in listed.iter().zip(&payloads) {
                prop_assert_eq!(&record.payload, payload);
            }
            Ok(())
        })?;
    }

    #[test]
    fn replay_matches_live_state(ops in prop::collection::vec(any::<bool>(), 1..30)) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        runtime.block_on(async {
            let backend = FaultyBackend::new();
            let store = RecordStore::with_backend(
                Box::new(backend.clone()),
                StoreConfig::default().compact_after(4),
            );
            store.initialize().await.unwrap();

            // true appends, false deletes the oldest staged record.
            for append in ops {
                if append {
                    store.append(task_update(0)).await.unwrap();
                } else if let Some(oldest) = store.list_all().await.unwrap().first() {
                    store.delete_by_id(oldest.id).await.unwrap();
                }
            }
            let live = store.list_all().await.unwrap();
            let next_id = store.stats().await.unwrap().next_id;
            drop(store);

            let replayed = RecordStore::with_backend(
                Box::new(FaultyBackend::with_data(backend.bytes())),
                StoreConfig::default(),
            );
            replayed.initialize().await.unwrap();
            prop_assert_eq!(replayed.list_all().await.unwrap(), live);
            prop_assert_eq!(replayed.stats().await.unwrap().next_id, next_id);
            Ok(())
        })?;
    }
}
