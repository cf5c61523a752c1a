//! # Outbox Testkit
//!
//! Test utilities for the outbox queue.
//!
//! This crate provides:
//! - A storage backend that fails on command
//! - Store fixtures (in-memory and temp-dir backed) and payload generators
//! - Endpoint stubs that count deliveries per record and hold responses
//!
//! ## Usage
//!
//! ```rust,ignore
//! use outbox_testkit::prelude::*;
//!
//! #[tokio::test]
//! async fn drains_everything() {
//!     let store = TestStore::memory().await;
//!     stage(&store, 3).await;
//!     // ... build an engine around `store.handle()`
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod endpoint;
pub mod faulty;
pub mod fixtures;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::endpoint::*;
    pub use crate::faulty::*;
    pub use crate::fixtures::*;
}

pub use endpoint::*;
pub use faulty::*;
pub use fixtures::*;
