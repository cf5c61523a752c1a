//! Append-only journal backing the record store.
//!
//! Every mutation of the store is one frame appended to the journal. On
//! initialize the journal is replayed into the in-memory index.
//!
//! ## Frame Format
//!
//! ```text
//! | magic "OBXJ" (4) | version (2) | type (1) | length (4) | payload (N) | crc32 (4) |
//! ```
//!
//! Integers are little-endian; the CRC covers every byte before it.
//!
//! ## Recovery Policy
//!
//! Tolerated (treated as a clean end of log, the tail is truncated away):
//! - fewer than [`HEADER_SIZE`] bytes left
//! - a header whose payload or CRC runs past the end
//!
//! Fatal (initialize fails):
//! - bad magic, unsupported version, unknown frame type
//! - CRC mismatch
//! - an undecodable payload

mod frame;
mod iter;

pub use frame::{compute_crc32, Frame, FrameType, CRC_SIZE, HEADER_SIZE, JOURNAL_MAGIC, JOURNAL_VERSION};
pub use iter::FrameIter;
