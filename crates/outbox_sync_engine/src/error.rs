//! Error types for the sync engine.

use outbox_core::{CoreError, RecordId};
use std::time::Duration;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// No response was obtained from the remote endpoint.
///
/// Any of these aborts the current drain run; the record stays staged.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportFailure {
    /// Connection, DNS or TLS failure.
    #[error("endpoint unreachable: {0}")]
    Unreachable(String),

    /// The endpoint did not answer in time.
    #[error("no response within {0:?}")]
    Timeout(Duration),

    /// The request body could not be produced.
    #[error("could not encode request: {0}")]
    Encode(String),
}

/// Errors that can occur during sync operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// No response from the endpoint.
    #[error("transport failure: {0}")]
    Transport(#[from] TransportFailure),

    /// The endpoint answered with a non-success status.
    #[error("change {id} rejected with status {status}: {body}")]
    Rejected {
        /// Rejected record.
        id: RecordId,
        /// HTTP status code.
        status: u16,
        /// Response body, possibly empty.
        body: String,
    },

    /// The record store failed.
    #[error("store error: {0}")]
    Store(#[from] CoreError),

    /// The configured endpoint cannot be used.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),
}

impl SyncError {
    /// Returns true if this error ends a drain run.
    ///
    /// Rejections only affect the record they concern.
    pub fn aborts_run(&self) -> bool {
        !matches!(self, SyncError::Rejected { .. })
    }
}
