//! Fault injection for storage.
//!
//! [`FaultyBackend`] wraps an in-memory backend and fails appends, flushes
//! or replaces on command. It can also simulate a crash part-way through
//! a write, leaving a torn frame behind.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use outbox_testkit::FaultyBackend;
//!
//! let backend = FaultyBackend::new();
//! let store = RecordStore::with_backend(Box::new(backend.clone()), StoreConfig::default());
//! store.initialize().await?;
//! backend.fail_appends(true);
//! assert!(store.append(payload).await.is_err());
//! ```

use outbox_storage::{InMemoryBackend, StorageBackend, StorageError, StorageResult};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug)]
struct Faults {
    fail_appends: AtomicBool,
    fail_flush: AtomicBool,
    fail_replace: AtomicBool,
    crash_after_bytes: AtomicUsize,
    bytes_written: AtomicUsize,
    crashed: AtomicBool,
}

impl Default for Faults {
    fn default() -> Self {
        Self {
            fail_appends: AtomicBool::new(false),
            fail_flush: AtomicBool::new(false),
            fail_replace: AtomicBool::new(false),
            crash_after_bytes: AtomicUsize::new(usize::MAX),
            bytes_written: AtomicUsize::new(0),
            crashed: AtomicBool::new(false),
        }
    }
}

/// A storage backend that fails on command.
///
/// Clones share both the bytes and the fault switches, so a test keeps one
/// clone as the control handle after giving another to the store.
#[derive(Debug, Clone, Default)]
pub struct FaultyBackend {
    inner: InMemoryBackend,
    faults: Arc<Faults>,
}

fn injected(what: &str) -> StorageError {
    StorageError::Io(std::io::Error::new(
        std::io::ErrorKind::Other,
        format!("injected fault: {what}"),
    ))
}

impl FaultyBackend {
    /// Creates an empty backend with no faults armed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend holding `data`.
    pub fn with_data(data: Vec<u8>) -> Self {
        Self {
            inner: InMemoryBackend::with_data(data),
            faults: Arc::default(),
        }
    }

    /// Makes every append fail without writing.
    pub fn fail_appends(&self, fail: bool) {
        self.faults.fail_appends.store(fail, Ordering::SeqCst);
    }

    /// Makes every flush fail.
    pub fn fail_flush(&self, fail: bool) {
        self.faults.fail_flush.store(fail, Ordering::SeqCst);
    }

    /// Makes every atomic replace fail, leaving the old bytes in place.
    pub fn fail_replace(&self, fail: bool) {
        self.faults.fail_replace.store(fail, Ordering::SeqCst);
    }

    /// Crashes once `bytes` more bytes have been appended. The write that
    /// crosses the limit is cut short.
    pub fn crash_after(&self, bytes: usize) {
        self.faults.bytes_written.store(0, Ordering::SeqCst);
        self.faults.crash_after_bytes.store(bytes, Ordering::SeqCst);
    }

    /// Disarms every fault.
    pub fn reset(&self) {
        self.fail_appends(false);
        self.fail_flush(false);
        self.fail_replace(false);
        self.faults
            .crash_after_bytes
            .store(usize::MAX, Ordering::SeqCst);
        self.faults.bytes_written.store(0, Ordering::SeqCst);
        self.faults.crashed.store(false, Ordering::SeqCst);
    }

    /// Returns whether a simulated crash happened.
    pub fn has_crashed(&self) -> bool {
        self.faults.crashed.load(Ordering::SeqCst)
    }

    /// Returns a copy of the stored bytes.
    pub fn bytes(&self) -> Vec<u8> {
        self.inner.data()
    }
}

impl StorageBackend for FaultyBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        self.inner.read_at(offset, len)
    }

    fn append(&mut self, bytes: &[u8]) -> StorageResult<u64> {
        if self.faults.fail_appends.load(Ordering::SeqCst) {
            return Err(injected("append"));
        }

        let written = self
            .faults
            .bytes_written
            .fetch_add(bytes.len(), Ordering::SeqCst);
        let limit = self.faults.crash_after_bytes.load(Ordering::SeqCst);

        if written >= limit {
            self.faults.crashed.store(true, Ordering::SeqCst);
            return Err(injected("crash before write"));
        }
        if written + bytes.len() > limit {
            self.faults.crashed.store(true, Ordering::SeqCst);
            let partial = limit - written;
            self.inner.append(&bytes[..partial])?;
            return Err(injected("crash during write"));
        }

        self.inner.append(bytes)
    }

    fn flush(&mut self) -> StorageResult<()> {
        if self.faults.fail_flush.load(Ordering::SeqCst) {
            return Err(injected("flush"));
        }
        self.inner.flush()
    }

    fn size(&self) -> StorageResult<u64> {
        self.inner.size()
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        self.inner.truncate(new_size)
    }

    fn replace(&mut self, bytes: &[u8]) -> StorageResult<()> {
        if self.faults.fail_replace.load(Ordering::SeqCst) {
            return Err(injected("replace"));
        }
        self.inner.replace(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn faults_are_shared_between_clones() {
        let handle = FaultyBackend::new();
        let mut backend = handle.clone();

        backend.append(b"abc").unwrap();
        handle.fail_appends(true);
        assert!(backend.append(b"def").is_err());
        handle.reset();
        backend.append(b"def").unwrap();
        assert_eq!(handle.bytes(), b"abcdef");
    }

    #[test]
    fn crash_cuts_write_short() {
        let handle = FaultyBackend::new();
        let mut backend = handle.clone();

        handle.crash_after(4);
        assert!(backend.append(b"abcdefgh").is_err());
        assert!(handle.has_crashed());
        assert_eq!(handle.bytes(), b"abcd");
        assert!(backend.append(b"x").is_err());
    }

    #[test]
    fn failing_flush_and_replace() {
        let handle = FaultyBackend::with_data(b"old".to_vec());
        let mut backend = handle.clone();

        handle.fail_flush(true);
        assert!(backend.flush().is_err());

        handle.fail_replace(true);
        assert!(backend.replace(b"new").is_err());
        assert_eq!(handle.bytes(), b"old");
    }
}
