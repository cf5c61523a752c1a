//! # Outbox Core
//!
//! The durable staging area of the outbox queue.
//!
//! This crate provides:
//! - [`ChangeRecord`], the unit of replication
//! - a checksummed, append-only journal of record appends and deletions
//! - [`RecordStore`], an async handle to the journal with an in-memory
//!   index by id and by timestamp
//!
//! ## Lifecycle
//!
//! A store is constructed un-initialized and injected into producers and
//! the sync engine. Until [`RecordStore::initialize`] completes every
//! operation fails with [`CoreError::NotReady`].
//!
//! ```rust,ignore
//! let store = RecordStore::at_path("outbox.journal", StoreConfig::default());
//! store.initialize().await?;
//! let record = store.append(payload).await?;
//! ```
//!
//! ## Invariants
//!
//! - Record ids are strictly increasing and never reused
//! - A record is present iff it has not been deleted (accepted remotely)
//! - Payloads are opaque; the store never inspects them
//! - A failed append leaves journal and index unchanged

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod journal;
mod record;
mod store;

pub use config::StoreConfig;
pub use error::{CoreError, CoreResult};
pub use journal::{
    compute_crc32, Frame, FrameIter, FrameType, CRC_SIZE, HEADER_SIZE, JOURNAL_MAGIC,
    JOURNAL_VERSION,
};
pub use record::{ChangeRecord, PayloadMap, RecordId};
pub use store::{CompactionReport, RecordStore, StoreStats};

/// Crate version, reported by the CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
