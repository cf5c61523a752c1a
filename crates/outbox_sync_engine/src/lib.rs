//! # Outbox Sync Engine
//!
//! Drains the outbox record store against a remote endpoint.
//!
//! This crate provides:
//! - The drain state machine (idle → fetching → delivering → idle)
//! - A single-run guard that coalesces overlapping triggers
//! - Delivery transports (HTTP, loopback, scripted)
//! - Notification sinks
//! - A connectivity monitor driving automatic drains
//!
//! ## Delivery model
//!
//! Each drain run reads one snapshot of the staged records and attempts
//! them strictly in ascending id order:
//! 1. An accepted record (2xx) is removed from the store
//! 2. A rejected record (any other status) stays staged and the run continues
//! 3. A transport failure (no response) aborts the run
//!
//! ## Key Invariants
//!
//! - At most one run is active at a time
//! - A record is removed only after the endpoint accepted it
//! - Records are never reordered, within a run or across runs
//! - Drain failures are reported, never returned to the trigger's caller

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod connectivity;
mod error;
mod http;
mod notify;
#[cfg(feature = "reqwest")]
mod reqwest_client;
mod state;
mod transport;

pub use config::{CoalescePolicy, SyncConfig};
pub use connectivity::ConnectivityMonitor;
pub use error::{SyncError, SyncResult, TransportFailure};
pub use http::{
    parse_endpoint, HttpClient, HttpRequest, HttpTransport, LoopbackClient, LoopbackEndpoint,
};
pub use notify::{Notification, NotificationSink, NoopSink, RecordingSink, Severity, TracingSink};
#[cfg(feature = "reqwest")]
pub use reqwest_client::ReqwestClient;
pub use state::{DrainOutcome, DrainReport, Rejection, RunState, SyncEngine, SyncStats};
pub use transport::{DeliveryResponse, DeliveryTransport, Scripted, ScriptedTransport};
