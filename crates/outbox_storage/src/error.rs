//! Storage errors.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result alias for backend operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Failure reported by a [`StorageBackend`](crate::StorageBackend).
#[derive(Debug, Error)]
pub enum StorageError {
    /// The underlying file operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A read asked for bytes the backend does not hold.
    #[error("read of {len} bytes at offset {offset} exceeds size {size}")]
    ReadPastEnd {
        /// Requested start.
        offset: u64,
        /// Requested length.
        len: usize,
        /// Size at the time of the read.
        size: u64,
    },

    /// A truncation asked to grow the backend.
    #[error("cannot truncate to {requested} bytes, size is {size}")]
    TruncatePastEnd {
        /// Requested size.
        requested: u64,
        /// Current size.
        size: u64,
    },

    /// The journal lock is held elsewhere.
    #[error("journal is locked by another process ({})", path.display())]
    Locked {
        /// Lock file that could not be acquired.
        path: PathBuf,
    },
}

/// Validates a read of `len` bytes at `offset` against `size` and returns
/// the byte range to copy.
pub(crate) fn read_range(offset: u64, len: usize, size: u64) -> StorageResult<std::ops::Range<usize>> {
    match offset.checked_add(len as u64) {
        Some(end) if end <= size => Ok(offset as usize..end as usize),
        _ => Err(StorageError::ReadPastEnd { offset, len, size }),
    }
}

/// Validates a truncation to `requested` bytes against `size`.
pub(crate) fn check_truncate(requested: u64, size: u64) -> StorageResult<()> {
    if requested > size {
        return Err(StorageError::TruncatePastEnd { requested, size });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranges() {
        assert_eq!(read_range(2, 3, 5).unwrap(), 2..5);
        assert_eq!(read_range(5, 0, 5).unwrap(), 5..5);
        assert!(matches!(
            read_range(4, 2, 5),
            Err(StorageError::ReadPastEnd { offset: 4, len: 2, size: 5 })
        ));
        assert!(read_range(u64::MAX, 1, 5).is_err());
    }

    #[test]
    fn truncation_never_grows() {
        assert!(check_truncate(3, 3).is_ok());
        assert!(matches!(
            check_truncate(4, 3),
            Err(StorageError::TruncatePastEnd { requested: 4, size: 3 })
        ));
    }
}
