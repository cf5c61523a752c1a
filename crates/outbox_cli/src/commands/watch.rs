//! Watch command implementation.
//!
//! Probes the endpoint with a TCP connect at a fixed interval and feeds the
//! result into a connectivity monitor; the engine drains on every
//! offline→online transition.

use super::{open_store, ConsoleSink};
use outbox_sync_engine::{parse_endpoint, ConnectivityMonitor, SyncConfig, SyncEngine};
use std::path::Path;
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::{debug, info};
use url::Url;

/// `host:port` to probe for an endpoint, using the scheme's default port
/// when none is given.
pub fn probe_address(endpoint: &Url) -> Option<String> {
    let host = endpoint.host_str().filter(|h| !h.is_empty())?;
    let port = endpoint.port_or_known_default()?;
    Some(format!("{host}:{port}"))
}

async fn reachable(address: &str, timeout: Duration) -> bool {
    matches!(
        tokio::time::timeout(timeout, TcpStream::connect(address)).await,
        Ok(Ok(_))
    )
}

/// Runs the watch command until interrupted.
pub async fn run(
    path: &Path,
    config: SyncConfig,
    interval: Duration,
) -> Result<(), Box<dyn std::error::Error>> {
    let endpoint = parse_endpoint(&config.endpoint)?;
    let address = probe_address(&endpoint)
        .ok_or_else(|| format!("cannot probe endpoint {endpoint}"))?;
    let probe_timeout = interval.min(config.request_timeout);

    let store = open_store(path).await?;
    let transport = super::sync::transport(&config)?;
    let engine = SyncEngine::with_sink(config, store, transport, ConsoleSink);

    let monitor = ConnectivityMonitor::new(reachable(&address, probe_timeout).await);
    info!(%address, online = monitor.is_online(), "watching endpoint");
    let trigger_loop = engine.spawn(monitor.subscribe());

    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let online = reachable(&address, probe_timeout).await;
                debug!(%address, online, "probe");
                monitor.set_online(online);
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted, shutting down");
                break;
            }
        }
    }

    drop(monitor);
    trigger_loop.await?;
    Ok(())
}
