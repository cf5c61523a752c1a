//! Sync command implementation.

use super::{open_store, ConsoleSink};
use outbox_sync_engine::{
    DrainOutcome, DrainReport, HttpTransport, ReqwestClient, SyncConfig, SyncEngine,
};
use serde::Serialize;
use std::path::Path;

/// Drain summary for output.
#[derive(Debug, Serialize)]
pub struct SyncSummary {
    /// `completed` or `aborted`.
    pub outcome: String,
    /// Abort reason, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Changes found in the queue.
    pub found: usize,
    /// Ids delivered and removed.
    pub delivered: Vec<u64>,
    /// Ids rejected by the endpoint.
    pub rejected: Vec<u64>,
    /// Elapsed milliseconds.
    pub elapsed_ms: u64,
}

impl From<&DrainReport> for SyncSummary {
    fn from(report: &DrainReport) -> Self {
        let (outcome, error) = match &report.outcome {
            DrainOutcome::Completed => ("completed", None),
            DrainOutcome::Aborted(e) => ("aborted", Some(e.to_string())),
            DrainOutcome::Coalesced => ("coalesced", None),
        };
        Self {
            outcome: outcome.to_string(),
            error,
            found: report.found,
            delivered: report.delivered.iter().map(|id| id.as_u64()).collect(),
            rejected: report.rejected.iter().map(|r| r.id.as_u64()).collect(),
            elapsed_ms: report.duration.as_millis() as u64,
        }
    }
}

/// Builds the HTTP transport for a sync configuration.
pub fn transport(
    config: &SyncConfig,
) -> Result<HttpTransport<ReqwestClient>, Box<dyn std::error::Error>> {
    let client = ReqwestClient::new(config.request_timeout)?;
    Ok(HttpTransport::from_config(config, client)?)
}

/// Runs the sync command.
pub async fn run(
    path: &Path,
    config: SyncConfig,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store(path).await?;
    let transport = transport(&config)?;

    let report = match format {
        "json" => SyncEngine::new(config, store, transport).drain().await,
        _ => SyncEngine::with_sink(config, store, transport, ConsoleSink)
            .drain()
            .await,
    };

    let summary = SyncSummary::from(&report);
    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&summary)?),
        _ => {
            println!();
            println!(
                "{} delivered, {} rejected, {} left in {} ms",
                summary.delivered.len(),
                summary.rejected.len(),
                summary.found.saturating_sub(summary.delivered.len()),
                summary.elapsed_ms
            );
        }
    }

    if report.is_aborted() {
        return Err(format!("sync stopped early: {}", summary.error.unwrap_or_default()).into());
    }
    Ok(())
}
