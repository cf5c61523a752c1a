//! Error types for the record store.

use outbox_storage::StorageError;
use thiserror::Error;

/// Result type for store operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in record store operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The store has not been initialized yet.
    #[error("record store is not initialized")]
    NotReady,

    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// The journal contains a frame that cannot be interpreted.
    #[error("journal corruption at offset {offset}: {message}")]
    JournalCorruption {
        /// Offset of the offending frame.
        offset: u64,
        /// Description of the corruption.
        message: String,
    },

    /// Checksum mismatch detected.
    #[error("checksum mismatch at offset {offset}: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch {
        /// Offset of the offending frame.
        offset: u64,
        /// Stored checksum.
        expected: u32,
        /// Computed checksum.
        actual: u32,
    },

    /// A record could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(String),

    /// The blocking task running a storage operation died.
    #[error("storage task failed: {0}")]
    TaskFailed(String),
}

impl CoreError {
    /// Creates a corruption error.
    pub fn corruption(offset: u64, message: impl Into<String>) -> Self {
        Self::JournalCorruption {
            offset,
            message: message.into(),
        }
    }

    /// Returns true if the store was used before initialization.
    pub fn is_not_ready(&self) -> bool {
        matches!(self, CoreError::NotReady)
    }

    /// Returns true for failures of the backing store itself.
    pub fn is_storage(&self) -> bool {
        !self.is_not_ready()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        assert!(CoreError::NotReady.is_not_ready());
        assert!(!CoreError::NotReady.is_storage());
        assert!(CoreError::Storage(StorageError::TruncatePastEnd { requested: 2, size: 1 }).is_storage());
        assert!(CoreError::corruption(0, "bad magic").is_storage());
    }

    #[test]
    fn error_display() {
        let err = CoreError::ChecksumMismatch {
            offset: 42,
            expected: 0xdead_beef,
            actual: 1,
        };
        assert_eq!(
            err.to_string(),
            "checksum mismatch at offset 42: expected deadbeef, got 00000001"
        );
        assert_eq!(CoreError::NotReady.to_string(), "record store is not initialized");
    }
}
