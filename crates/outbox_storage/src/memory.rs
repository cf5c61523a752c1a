//! Heap-backed journal storage.

use crate::backend::StorageBackend;
use crate::error::{check_truncate, read_range, StorageResult};
use parking_lot::RwLock;
use std::sync::Arc;

/// A backend holding the journal in a shared byte buffer.
///
/// Cloning yields another handle onto the same buffer. Tests keep one
/// handle to watch or damage what a store writes through the other.
///
/// ```rust
/// use outbox_storage::{StorageBackend, InMemoryBackend};
///
/// let mut writer = InMemoryBackend::new();
/// let reader = writer.clone();
/// writer.append(b"frame").unwrap();
/// assert_eq!(reader.data(), b"frame");
/// ```
#[derive(Debug, Default, Clone)]
pub struct InMemoryBackend {
    buf: Arc<RwLock<Vec<u8>>>,
}

impl InMemoryBackend {
    /// Empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffer seeded with `data`, e.g. a journal assembled by hand.
    #[must_use]
    pub fn with_data(data: Vec<u8>) -> Self {
        Self {
            buf: Arc::new(RwLock::new(data)),
        }
    }

    /// Snapshot of the buffer.
    #[must_use]
    pub fn data(&self) -> Vec<u8> {
        self.buf.read().clone()
    }

    /// Overwrites the byte at `offset`; out-of-range offsets are ignored.
    pub fn poke(&self, offset: usize, byte: u8) {
        if let Some(slot) = self.buf.write().get_mut(offset) {
            *slot = byte;
        }
    }
}

impl StorageBackend for InMemoryBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let buf = self.buf.read();
        let range = read_range(offset, len, buf.len() as u64)?;
        Ok(buf[range].to_vec())
    }

    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        let mut buf = self.buf.write();
        let at = buf.len() as u64;
        buf.extend_from_slice(data);
        Ok(at)
    }

    fn flush(&mut self) -> StorageResult<()> {
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(self.buf.read().len() as u64)
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        let mut buf = self.buf.write();
        check_truncate(new_size, buf.len() as u64)?;
        buf.truncate(new_size as usize);
        Ok(())
    }

    fn replace(&mut self, data: &[u8]) -> StorageResult<()> {
        let mut buf = self.buf.write();
        buf.clear();
        buf.extend_from_slice(data);
        Ok(())
    }
}
