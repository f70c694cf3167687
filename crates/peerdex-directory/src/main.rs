//! Peerdex directory server.
//!
//! Keeps the file index for a Peerdex network. Peers connect, announce what
//! they hold, and ask who holds what; file contents never pass through here.

use anyhow::Context;
use clap::Parser;
use peerdex_directory::observability::{init_logging, LogFormat};
use peerdex_directory::{ConfigOverrides, DirectoryConfig};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Peerdex directory server
#[derive(Parser, Debug)]
#[command(name = "peerdex-directory")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Control-plane listen address
    #[arg(long)]
    listen: Option<SocketAddr>,

    /// Seconds of silence after which a peer is expired
    #[arg(long)]
    peer_timeout: Option<u64>,

    /// Seconds between expiry sweeps
    #[arg(long)]
    sweep_interval: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level, LogFormat::from_json_flag(args.log_json));

    let overrides = ConfigOverrides {
        listen_addr: args.listen,
        peer_timeout: args.peer_timeout.map(Duration::from_secs),
        sweep_interval: args.sweep_interval.map(Duration::from_secs),
    };
    let config = DirectoryConfig::resolve(args.config.as_deref(), &overrides)
        .context("loading configuration")?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        listen = %config.listen_addr,
        peer_timeout_secs = config.peer_timeout.as_secs(),
        sweep_interval_secs = config.sweep_interval.as_secs(),
        "Starting Peerdex directory"
    );

    peerdex_directory::serve(config).await?;
    Ok(())
}
