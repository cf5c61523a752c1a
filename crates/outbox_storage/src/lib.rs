//! # Outbox Storage
//!
//! Byte-store backends underneath the outbox journal.
//!
//! Backends are **opaque byte stores**: they append, read back, flush and
//! atomically replace bytes. They know nothing about journal frames or
//! change records; `outbox_core` owns the format.
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - For tests and ephemeral queues
//! - [`FileBackend`] - Persistent, single-process (guarded by a lock file)
//!
//! ## Example
//!
//! ```rust
//! use outbox_storage::{StorageBackend, InMemoryBackend};
//!
//! let mut backend = InMemoryBackend::new();
//! let offset = backend.append(b"frame").unwrap();
//! assert_eq!(backend.read_at(offset, 5).unwrap(), b"frame");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
