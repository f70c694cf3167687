//! Peerdex CLI - run a directory server or an interactive peer.

use clap::{Parser, Subcommand};
use peerdex_directory::observability::{init_logging, LogFormat};
use std::net::SocketAddr;
use std::path::PathBuf;

mod commands;
mod shell;

/// Peerdex - hybrid peer-to-peer file sharing
#[derive(Parser, Debug)]
#[command(name = "peerdex")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the directory server
    Directory {
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
    },

    /// Join the network as a peer and read commands from stdin
    Peer {
        /// Path to a YAML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Name announced to the directory
        #[arg(short, long)]
        name: Option<String>,
        /// Data-plane port (0 picks a free one)
        #[arg(short, long)]
        port: Option<u16>,
        /// Directory address
        #[arg(short, long)]
        directory: Option<String>,
        /// Local repository (default: ./repository/<name>)
        #[arg(short, long)]
        repo: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    init_logging(log_level, LogFormat::from_json_flag(cli.log_json));

    let result = match cli.command {
        Commands::Directory {
            config,
            listen,
            peer_timeout,
            sweep_interval,
        } => {
            commands::directory(commands::DirectoryArgs {
                config,
                listen,
                peer_timeout,
                sweep_interval,
            })
            .await
        }
        Commands::Peer {
            config,
            name,
            port,
            directory,
            repo,
        } => {
            commands::peer(commands::PeerArgs {
                config,
                name,
                port,
                directory,
                repo,
            })
            .await
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
