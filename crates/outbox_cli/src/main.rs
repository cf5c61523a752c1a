//! Outbox CLI
//!
//! Command-line tools for inspecting and draining an outbox journal.
//!
//! # Commands
//!
//! - `enqueue` - Stage a change
//! - `list` - Show staged changes
//! - `sync` - Drain the queue once
//! - `watch` - Drain whenever the endpoint becomes reachable
//! - `compact` - Rewrite the journal without delivered changes
//! - `dump-journal` - Dump journal frames for debugging

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Outbox queue tools.
#[derive(Parser)]
#[command(name = "outbox")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the journal file
    #[arg(global = true, short, long, default_value = "outbox.journal")]
    path: PathBuf,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stage a change for delivery
    Enqueue {
        /// Change payload as a JSON object
        payload: String,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show staged changes
    List {
        /// Only changes staged at or after this ISO-8601 time
        #[arg(long)]
        since: Option<String>,

        /// Only changes staged before this ISO-8601 time
        #[arg(long)]
        until: Option<String>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Deliver staged changes once
    Sync {
        #[command(flatten)]
        remote: RemoteArgs,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Keep running and deliver whenever the endpoint becomes reachable
    Watch {
        #[command(flatten)]
        remote: RemoteArgs,

        /// Seconds between reachability probes
        #[arg(long, default_value = "5")]
        probe_interval: u64,
    },

    /// Rewrite the journal without delivered changes
    Compact,

    /// Dump journal frames for debugging
    DumpJournal {
        /// Maximum number of frames to dump
        #[arg(short, long)]
        limit: Option<usize>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

/// Where and how to deliver.
#[derive(clap::Args)]
struct RemoteArgs {
    /// Endpoint receiving one POST per change
    #[arg(short, long, env = "OUTBOX_ENDPOINT")]
    endpoint: String,

    /// Seconds to wait for each response
    #[arg(short, long, default_value = "30")]
    timeout: u64,

    /// Bearer token
    #[arg(long, env = "OUTBOX_TOKEN")]
    token: Option<String>,
}

impl RemoteArgs {
    fn into_config(self) -> outbox_sync_engine::SyncConfig {
        let mut config = outbox_sync_engine::SyncConfig::new(self.endpoint)
            .with_timeout(std::time::Duration::from_secs(self.timeout));
        if let Some(token) = self.token {
            config = config.with_auth_token(token);
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let default = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Enqueue { payload, format } => {
            commands::enqueue::run(&cli.path, &payload, &format).await?;
        }
        Commands::List {
            since,
            until,
            format,
        } => {
            commands::list::run(&cli.path, since.as_deref(), until.as_deref(), &format).await?;
        }
        Commands::Sync { remote, format } => {
            commands::sync::run(&cli.path, remote.into_config(), &format).await?;
        }
        Commands::Watch {
            remote,
            probe_interval,
        } => {
            let interval = std::time::Duration::from_secs(probe_interval.max(1));
            commands::watch::run(&cli.path, remote.into_config(), interval).await?;
        }
        Commands::Compact => {
            commands::compact::run(&cli.path).await?;
        }
        Commands::DumpJournal { limit, format } => {
            commands::dump_journal::run(&cli.path, limit, &format)?;
        }
        Commands::Version => {
            println!("Outbox CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("Outbox Core v{}", outbox_core::VERSION);
        }
    }

    Ok(())
}
