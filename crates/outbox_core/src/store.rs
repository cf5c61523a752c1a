//! The record store: durable staging area for not-yet-delivered changes.

use crate::config::StoreConfig;
use crate::error::{CoreError, CoreResult};
use crate::journal::{Frame, FrameIter};
use crate::record::{ChangeRecord, PayloadMap, RecordId};
use outbox_storage::{FileBackend, InMemoryBackend, StorageBackend};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Statistics about a record store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    /// Records currently staged.
    pub live_records: usize,
    /// Delete frames written since the last compaction.
    pub tombstones: usize,
    /// Journal size in bytes.
    pub journal_bytes: u64,
    /// Id the next append will receive.
    pub next_id: u64,
}

/// Outcome of a journal compaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompactionReport {
    /// Records carried over into the new journal.
    pub live_records: usize,
    /// Journal size before compaction.
    pub bytes_before: u64,
    /// Journal size after compaction.
    pub bytes_after: u64,
}

/// Handle to the durable outbox.
///
/// Cloning is cheap; all clones share the same journal. Build one at
/// startup, call [`initialize`](Self::initialize) once, and hand clones to
/// the producer path and to the sync engine.
///
/// Mutating operations run on the blocking thread pool so they never stall
/// the async runtime; reads are served from the in-memory index.
#[derive(Clone)]
pub struct RecordStore {
    shared: Arc<Shared>,
}

struct Shared {
    config: StoreConfig,
    location: Mutex<Option<Location>>,
    journal: Mutex<Option<Journal>>,
}

enum Location {
    Path(PathBuf),
    Backend(Box<dyn StorageBackend>),
}

impl RecordStore {
    /// Creates an ephemeral store backed by memory.
    pub fn in_memory() -> Self {
        Self::with_backend(Box::new(InMemoryBackend::new()), StoreConfig::default())
    }

    /// Creates a store whose journal lives at `path`.
    ///
    /// Nothing is opened until [`initialize`](Self::initialize).
    pub fn at_path(path: impl Into<PathBuf>, config: StoreConfig) -> Self {
        Self::from_location(Location::Path(path.into()), config)
    }

    /// Creates a store on top of an existing backend.
    pub fn with_backend(backend: Box<dyn StorageBackend>, config: StoreConfig) -> Self {
        Self::from_location(Location::Backend(backend), config)
    }

    fn from_location(location: Location, config: StoreConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                location: Mutex::new(Some(location)),
                journal: Mutex::new(None),
            }),
        }
    }

    /// Opens the journal and replays it into the index.
    ///
    /// Idempotent: once the store is ready further calls return `Ok(())`.
    /// A failed initialize can be retried.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the journal cannot be opened, is locked by
    /// another process, or is corrupted.
    pub async fn initialize(&self) -> CoreResult<()> {
        self.blocking(|shared| shared.initialize()).await
    }

    /// Returns true once [`initialize`](Self::initialize) has completed.
    ///
    /// Takes the journal lock, so it can wait for an in-flight write.
    pub fn is_ready(&self) -> bool {
        self.shared.journal.lock().is_some()
    }

    /// Stages a new record.
    ///
    /// Assigns the id, timestamp and client temp id, persists the record and
    /// returns it.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotReady`] before initialization, or a storage
    /// error if the journal write fails. On failure nothing is staged.
    pub async fn append(&self, payload: PayloadMap) -> CoreResult<ChangeRecord> {
        self.blocking(move |shared| shared.append(payload)).await
    }

    /// Returns every staged record, ordered by ascending id.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotReady`] before initialization.
    pub async fn list_all(&self) -> CoreResult<Vec<ChangeRecord>> {
        self.read(|index| index.records.values().cloned().collect())
            .await
    }

    /// Returns the record with the given id, if staged.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotReady`] before initialization.
    pub async fn get(&self, id: RecordId) -> CoreResult<Option<ChangeRecord>> {
        self.read(move |index| index.records.get(&id).cloned()).await
    }

    /// Returns staged records whose timestamp lies in `[from, until)`.
    ///
    /// Either bound may be open. Records are ordered by timestamp, then id.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotReady`] before initialization.
    pub async fn list_by_timestamp(
        &self,
        from: Option<&str>,
        until: Option<&str>,
    ) -> CoreResult<Vec<ChangeRecord>> {
        if let (Some(from), Some(until)) = (from, until) {
            if from >= until {
                return self.read(|_| Vec::new()).await;
            }
        }
        let from = from.map(str::to_owned);
        let until = until.map(str::to_owned);

        self.read(move |index| {
            let lower = from.as_deref().map_or(Bound::Unbounded, Bound::Included);
            let upper = until.as_deref().map_or(Bound::Unbounded, Bound::Excluded);
            index
                .by_timestamp
                .range::<str, _>((lower, upper))
                .flat_map(|(_, ids)| ids.iter())
                .filter_map(|id| index.records.get(id).cloned())
                .collect()
        })
        .await
    }

    /// Returns the number of staged records.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotReady`] before initialization.
    pub async fn len(&self) -> CoreResult<usize> {
        self.read(|index| index.records.len()).await
    }

    /// Returns true if nothing is staged.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotReady`] before initialization.
    pub async fn is_empty(&self) -> CoreResult<bool> {
        self.read(|index| index.records.is_empty()).await
    }

    /// Removes a record.
    ///
    /// Deleting an id that is not staged is not an error: it returns
    /// `Ok(false)` and writes nothing, so overlapping deletions are harmless.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotReady`] before initialization, or a storage
    /// error if the journal write fails (the record then stays staged).
    pub async fn delete_by_id(&self, id: RecordId) -> CoreResult<bool> {
        self.blocking(move |shared| shared.delete(id)).await
    }

    /// Rewrites the journal so it holds only the staged records.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotReady`] before initialization, or a storage
    /// error if the new journal cannot be written (the old one is kept).
    pub async fn compact(&self) -> CoreResult<CompactionReport> {
        self.blocking(|shared| shared.compact()).await
    }

    /// Returns store statistics.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotReady`] before initialization.
    pub async fn stats(&self) -> CoreResult<StoreStats> {
        self.blocking(|shared| shared.stats()).await
    }

    /// Runs `f` against the index off the runtime; the journal lock may be
    /// held by a writer syncing to disk.
    async fn read<T, F>(&self, f: F) -> CoreResult<T>
    where
        F: FnOnce(&Index) -> T + Send + 'static,
        T: Send + 'static,
    {
        self.blocking(move |shared| shared.read(f)).await
    }

    async fn blocking<T, F>(&self, f: F) -> CoreResult<T>
    where
        F: FnOnce(&Shared) -> CoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let shared = Arc::clone(&self.shared);
        tokio::task::spawn_blocking(move || f(&shared))
            .await
            .map_err(|e| CoreError::TaskFailed(e.to_string()))?
    }
}

impl std::fmt::Debug for RecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordStore")
            .field("ready", &self.is_ready())
            .field("config", &self.shared.config)
            .finish()
    }
}

impl Shared {
    fn read<T>(&self, f: impl FnOnce(&Index) -> T) -> CoreResult<T> {
        let guard = self.journal.lock();
        let journal = guard.as_ref().ok_or(CoreError::NotReady)?;
        Ok(f(&journal.index))
    }

    fn stats(&self) -> CoreResult<StoreStats> {
        let guard = self.journal.lock();
        let journal = guard.as_ref().ok_or(CoreError::NotReady)?;
        Ok(StoreStats {
            live_records: journal.index.records.len(),
            tombstones: journal.index.tombstones,
            journal_bytes: journal.backend.size()?,
            next_id: journal.index.next_id,
        })
    }

    fn initialize(&self) -> CoreResult<()> {
        let mut journal = self.journal.lock();
        if journal.is_some() {
            return Ok(());
        }

        let mut location = self.location.lock();
        let Some(loc) = location.take() else {
            return Err(CoreError::NotReady);
        };

        match Journal::open(loc, &self.config) {
            Ok(opened) => {
                info!(
                    pending = opened.index.records.len(),
                    next_id = opened.index.next_id,
                    "record store initialized"
                );
                *journal = Some(opened);
                Ok(())
            }
            Err((loc, err)) => {
                *location = Some(loc);
                Err(err)
            }
        }
    }

    fn append(&self, payload: PayloadMap) -> CoreResult<ChangeRecord> {
        let mut guard = self.journal.lock();
        let journal = guard.as_mut().ok_or(CoreError::NotReady)?;

        let record = ChangeRecord::stamp(RecordId::new(journal.index.next_id), payload);
        journal.write(&Frame::Append(record.clone()), self.config.sync_on_write)?;
        journal.index.insert(record.clone());

        debug!(record_id = %record.id, client_temp_id = %record.client_temp_id, "change staged");
        Ok(record)
    }

    fn delete(&self, id: RecordId) -> CoreResult<bool> {
        let mut guard = self.journal.lock();
        let journal = guard.as_mut().ok_or(CoreError::NotReady)?;

        if !journal.index.records.contains_key(&id) {
            debug!(record_id = %id, "delete of unknown record ignored");
            return Ok(false);
        }

        journal.write(&Frame::Delete(id), self.config.sync_on_write)?;
        journal.index.remove(id);
        journal.index.tombstones += 1;
        debug!(record_id = %id, "change removed from queue");

        let threshold = self.config.compact_after;
        if threshold > 0 && journal.index.tombstones >= threshold {
            if let Err(e) = journal.compact() {
                warn!(error = %e, "automatic journal compaction failed");
            }
        }
        Ok(true)
    }

    fn compact(&self) -> CoreResult<CompactionReport> {
        let mut guard = self.journal.lock();
        let journal = guard.as_mut().ok_or(CoreError::NotReady)?;
        journal.compact()
    }
}

/// Opened journal plus the index replayed from it.
struct Journal {
    backend: Box<dyn StorageBackend>,
    index: Index,
}

impl Journal {
    fn open(location: Location, config: &StoreConfig) -> Result<Self, (Location, CoreError)> {
        let backend: Box<dyn StorageBackend> = match location {
            Location::Path(path) => {
                let opened = if config.create_dirs {
                    FileBackend::open_with_create_dirs(&path)
                } else {
                    FileBackend::open(&path)
                };
                match opened {
                    Ok(file) => Box::new(file),
                    Err(e) => return Err((Location::Path(path), e.into())),
                }
            }
            Location::Backend(backend) => backend,
        };

        Self::replay(backend).map_err(|(backend, e)| (Location::Backend(backend), e))
    }

    fn replay(
        mut backend: Box<dyn StorageBackend>,
    ) -> Result<Self, (Box<dyn StorageBackend>, CoreError)> {
        let (index, valid_len, torn) = match scan(backend.as_ref()) {
            Ok(scanned) => scanned,
            Err(e) => return Err((backend, e)),
        };

        if torn {
            warn!(valid_len, "discarding torn journal tail");
            if let Err(e) = backend.truncate(valid_len) {
                return Err((backend, e.into()));
            }
        }

        Ok(Self { backend, index })
    }

    /// Appends one frame; on failure the journal is rolled back to its
    /// previous length.
    fn write(&mut self, frame: &Frame, sync: bool) -> CoreResult<()> {
        let bytes = frame.encode()?;
        let before = self.backend.size()?;

        let written = self.backend.append(&bytes).and_then(|_| {
            if sync {
                self.backend.flush()
            } else {
                Ok(())
            }
        });

        if let Err(e) = written {
            if let Err(undo) = self.backend.truncate(before) {
                warn!(error = %undo, "failed to roll back partial journal write");
            }
            return Err(e.into());
        }
        Ok(())
    }

    fn compact(&mut self) -> CoreResult<CompactionReport> {
        let bytes_before = self.backend.size()?;

        let mut data = Frame::Sequence {
            next_id: self.index.next_id,
        }
        .encode()?;
        for record in self.index.records.values() {
            data.extend_from_slice(&Frame::Append(record.clone()).encode()?);
        }

        self.backend.replace(&data)?;
        self.index.tombstones = 0;

        let report = CompactionReport {
            live_records: self.index.records.len(),
            bytes_before,
            bytes_after: data.len() as u64,
        };
        info!(
            live = report.live_records,
            bytes_before = report.bytes_before,
            bytes_after = report.bytes_after,
            "journal compacted"
        );
        Ok(report)
    }
}

fn scan(backend: &dyn StorageBackend) -> CoreResult<(Index, u64, bool)> {
    let mut index = Index::default();
    let mut frames = FrameIter::new(backend)?;
    for item in frames.by_ref() {
        let (_, frame) = item?;
        index.apply(frame);
    }
    Ok((index, frames.valid_len(), frames.has_torn_tail()))
}

/// In-memory view of the journal.
struct Index {
    records: BTreeMap<RecordId, ChangeRecord>,
    by_timestamp: BTreeMap<String, BTreeSet<RecordId>>,
    next_id: u64,
    tombstones: usize,
}

impl Default for Index {
    fn default() -> Self {
        Self {
            records: BTreeMap::new(),
            by_timestamp: BTreeMap::new(),
            next_id: 1,
            tombstones: 0,
        }
    }
}

impl Index {
    fn apply(&mut self, frame: Frame) {
        match frame {
            Frame::Append(record) => self.insert(record),
            Frame::Delete(id) => {
                self.remove(id);
                self.tombstones += 1;
            }
            Frame::Sequence { next_id } => self.next_id = self.next_id.max(next_id),
        }
    }

    fn insert(&mut self, record: ChangeRecord) {
        self.next_id = self.next_id.max(record.id.as_u64() + 1);
        self.by_timestamp
            .entry(record.timestamp.clone())
            .or_default()
            .insert(record.id);
        self.records.insert(record.id, record);
    }

    fn remove(&mut self, id: RecordId) -> Option<ChangeRecord> {
        let record = self.records.remove(&id)?;
        if let Some(ids) = self.by_timestamp.get_mut(&record.timestamp) {
            ids.remove(&id);
            if ids.is_empty() {
                self.by_timestamp.remove(&record.timestamp);
            }
        }
        Some(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(n: i64) -> PayloadMap {
        let mut map = PayloadMap::new();
        map.insert("n".into(), json!(n));
        map
    }

    async fn ready_store() -> RecordStore {
        let store = RecordStore::in_memory();
        store.initialize().await.unwrap();
        store
    }

    #[tokio::test]
    async fn operations_fail_before_initialize() {
        let store = RecordStore::in_memory();
        assert!(!store.is_ready());
        assert!(store.append(payload(1)).await.unwrap_err().is_not_ready());
        assert!(store.list_all().await.unwrap_err().is_not_ready());
        assert!(store
            .delete_by_id(RecordId::new(1))
            .await
            .unwrap_err()
            .is_not_ready());
        assert!(store.stats().await.unwrap_err().is_not_ready());
    }

    #[tokio::test]
    async fn initialize_is_idempotent() {
        let store = ready_store().await;
        store.append(payload(1)).await.unwrap();
        store.initialize().await.unwrap();
        assert!(store.is_ready());
        assert_eq!(store.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn append_assigns_ascending_ids() {
        let store = ready_store().await;
        let a = store.append(payload(1)).await.unwrap();
        let b = store.append(payload(2)).await.unwrap();
        assert_eq!(a.id, RecordId::new(1));
        assert_eq!(b.id, RecordId::new(2));
        assert_eq!(b.payload, payload(2));

        let all = store.list_all().await.unwrap();
        assert_eq!(all, vec![a, b]);
    }

    #[tokio::test]
    async fn list_all_empty_is_not_an_error() {
        let store = ready_store().await;
        assert!(store.list_all().await.unwrap().is_empty());
        assert!(store.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = ready_store().await;
        let a = store.append(payload(1)).await.unwrap();
        let b = store.append(payload(2)).await.unwrap();

        assert!(store.delete_by_id(a.id).await.unwrap());
        assert!(!store.delete_by_id(a.id).await.unwrap());
        assert!(!store.delete_by_id(RecordId::new(99)).await.unwrap());
        assert_eq!(store.list_all().await.unwrap(), vec![b]);
    }

    #[tokio::test]
    async fn ids_not_reused_after_delete() {
        let store = ready_store().await;
        let a = store.append(payload(1)).await.unwrap();
        store.delete_by_id(a.id).await.unwrap();
        let b = store.append(payload(2)).await.unwrap();
        assert_eq!(b.id, RecordId::new(2));
    }

    #[tokio::test]
    async fn compaction_keeps_live_records_and_high_water_mark() {
        let store = RecordStore::with_backend(
            Box::new(InMemoryBackend::new()),
            StoreConfig::default().compact_after(0),
        );
        store.initialize().await.unwrap();

        for n in 0..4 {
            store.append(payload(n)).await.unwrap();
        }
        for id in 1..=3 {
            store.delete_by_id(RecordId::new(id)).await.unwrap();
        }

        let report = store.compact().await.unwrap();
        assert_eq!(report.live_records, 1);
        assert!(report.bytes_after < report.bytes_before);

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.tombstones, 0);
        assert_eq!(stats.next_id, 5);
        assert_eq!(store.append(payload(9)).await.unwrap().id, RecordId::new(5));
    }

    #[tokio::test]
    async fn automatic_compaction_after_threshold() {
        let store = RecordStore::with_backend(
            Box::new(InMemoryBackend::new()),
            StoreConfig::default().compact_after(2),
        );
        store.initialize().await.unwrap();

        for n in 0..3 {
            store.append(payload(n)).await.unwrap();
        }
        store.delete_by_id(RecordId::new(1)).await.unwrap();
        assert_eq!(store.stats().await.unwrap().tombstones, 1);
        store.delete_by_id(RecordId::new(2)).await.unwrap();
        assert_eq!(store.stats().await.unwrap().tombstones, 0);
        assert_eq!(store.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn timestamp_lookup() {
        let store = ready_store().await;
        let a = store.append(payload(1)).await.unwrap();
        let b = store.append(payload(2)).await.unwrap();

        let everything = store.list_by_timestamp(None, None).await.unwrap();
        assert_eq!(everything.len(), 2);

        let from_b = store
            .list_by_timestamp(Some(&b.timestamp), None)
            .await
            .unwrap();
        assert!(from_b.contains(&b));

        let before_a = store
            .list_by_timestamp(None, Some(&a.timestamp))
            .await
            .unwrap();
        assert!(before_a.is_empty());

        let inverted = store
            .list_by_timestamp(Some("2999-01-01T00:00:00.000Z"), Some("2000-01-01T00:00:00.000Z"))
            .await
            .unwrap();
        assert!(inverted.is_empty());
    }

    #[tokio::test]
    async fn get_by_id() {
        let store = ready_store().await;
        let a = store.append(payload(1)).await.unwrap();
        assert_eq!(store.get(a.id).await.unwrap(), Some(a));
        assert_eq!(store.get(RecordId::new(42)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn replay_restores_index_from_shared_backend() {
        let backend = InMemoryBackend::new();
        let first = RecordStore::with_backend(Box::new(backend.clone()), StoreConfig::default());
        first.initialize().await.unwrap();
        let a = first.append(payload(1)).await.unwrap();
        let b = first.append(payload(2)).await.unwrap();
        first.delete_by_id(a.id).await.unwrap();
        drop(first);

        let second = RecordStore::with_backend(Box::new(backend), StoreConfig::default());
        second.initialize().await.unwrap();
        assert_eq!(second.list_all().await.unwrap(), vec![b]);
        assert_eq!(second.stats().await.unwrap().next_id, 3);
    }

    #[tokio::test]
    async fn torn_tail_is_truncated_on_initialize() {
        let backend = InMemoryBackend::new();
        let first = RecordStore::with_backend(Box::new(backend.clone()), StoreConfig::default());
        first.initialize().await.unwrap();
        first.append(payload(1)).await.unwrap();
        drop(first);

        let good_len = backend.data().len();
        let mut torn = backend.data();
        torn.extend_from_slice(b"OBXJ\x01");
        let torn_backend = InMemoryBackend::with_data(torn);

        let store = RecordStore::with_backend(Box::new(torn_backend.clone()), StoreConfig::default());
        store.initialize().await.unwrap();
        assert_eq!(torn_backend.data().len(), good_len);
        assert_eq!(store.append(payload(2)).await.unwrap().id, RecordId::new(2));
        assert_eq!(store.len().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn corrupted_journal_fails_initialize_and_can_retry() {
        let backend = InMemoryBackend::with_data(vec![0x55; 40]);
        let store = RecordStore::with_backend(Box::new(backend.clone()), StoreConfig::default());

        let err = store.initialize().await.unwrap_err();
        assert!(matches!(err, CoreError::JournalCorruption { .. }));
        assert!(!store.is_ready());

        // The operator repairs the bytes; the same handle can initialize.
        let mut repaired = backend.clone();
        repaired.replace(b"").unwrap();
        store.initialize().await.unwrap();
        assert!(store.is_ready());
    }

    struct FlushGate {
        armed: std::sync::atomic::AtomicBool,
        entered: Mutex<std::sync::mpsc::Sender<()>>,
        release: Mutex<std::sync::mpsc::Receiver<()>>,
    }

    /// Blocks the first flush after arming until released.
    struct GatedFlush {
        inner: outbox_storage::InMemoryBackend,
        gate: Arc<FlushGate>,
    }

    impl StorageBackend for GatedFlush {
        fn read_at(&self, offset: u64, len: usize) -> outbox_storage::StorageResult<Vec<u8>> {
            self.inner.read_at(offset, len)
        }
        fn append(&mut self, data: &[u8]) -> outbox_storage::StorageResult<u64> {
            self.inner.append(data)
        }
        fn flush(&mut self) -> outbox_storage::StorageResult<()> {
            if self.gate.armed.swap(false, std::sync::atomic::Ordering::SeqCst) {
                let _ = self.gate.entered.lock().send(());
                let _ = self.gate.release.lock().recv();
            }
            self.inner.flush()
        }
        fn size(&self) -> outbox_storage::StorageResult<u64> {
            self.inner.size()
        }
        fn truncate(&mut self, new_size: u64) -> outbox_storage::StorageResult<()> {
            self.inner.truncate(new_size)
        }
        fn replace(&mut self, data: &[u8]) -> outbox_storage::StorageResult<()> {
            self.inner.replace(data)
        }
    }

    #[tokio::test]
    async fn reads_wait_off_the_runtime_while_a_write_syncs() {
        let (entered_tx, entered_rx) = std::sync::mpsc::channel();
        let (release_tx, release_rx) = std::sync::mpsc::channel();
        let gate = Arc::new(FlushGate {
            armed: std::sync::atomic::AtomicBool::new(false),
            entered: Mutex::new(entered_tx),
            release: Mutex::new(release_rx),
        });
        let backend = GatedFlush {
            inner: outbox_storage::InMemoryBackend::new(),
            gate: Arc::clone(&gate),
        };
        let store = RecordStore::with_backend(Box::new(backend), StoreConfig::default());
        store.initialize().await.unwrap();

        gate.armed.store(true, std::sync::atomic::Ordering::SeqCst);
        let writer = tokio::spawn({
            let store = store.clone();
            async move { store.append(payload(1)).await }
        });
        tokio::task::spawn_blocking(move || entered_rx.recv())
            .await
            .unwrap()
            .unwrap();

        // The single runtime thread must stay free to run the releaser.
        let releaser = tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            release_tx.send(()).unwrap();
        });
        let (listed, stats) = tokio::join!(store.list_all(), store.stats());

        let record = writer.await.unwrap().unwrap();
        releaser.await.unwrap();
        assert_eq!(listed.unwrap(), vec![record]);
        assert_eq!(stats.unwrap().live_records, 1);
    }
}
