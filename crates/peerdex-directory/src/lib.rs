//! # Peerdex Directory
//!
//! The centralized half of Peerdex: a TCP server that keeps track of which
//! peer provides which file, while the bytes themselves move directly
//! between peers.
//!
//! ## Architecture
//!
//! ```text
//! peer ──frames──▶ DirectoryServer ──spawn──▶ connection task
//!                        │                        │
//!                        │                    Session (state machine)
//!                        │                        │
//!                        └──── sweeper ──────▶ Registry (one lock)
//! ```
//!
//! - [`server`] accepts connections and tracks the live ones
//! - [`session`] turns each decoded request into one registry call and one
//!   reply
//! - [`sweep`] expires peers that stopped refreshing
//! - [`config`] holds listen address, timeout, and sweep interval
//! - [`observability`] sets up structured logging for the binaries
//!
//! ## Quick Start
//!
//! ```bash
//! cargo run --bin peerdex-directory -- --listen 127.0.0.1:5000
//! ```

pub mod config;
mod error;
pub mod observability;
pub mod server;
pub mod session;
pub mod sweep;

pub use config::{ConfigOverrides, DirectoryConfig};
pub use error::{ConfigError, DirectoryError, Result, SessionError};
pub use server::{ConnectionInfo, DirectoryServer, ShutdownHandle};
pub use session::{Session, SessionState};

use peerdex_registry::Registry;
use std::sync::Arc;

/// Runs a directory server until Ctrl-C, then shuts it down.
///
/// # Errors
///
/// Returns an error if the listener cannot be bound or the signal handler
/// cannot be installed.
pub async fn serve(config: DirectoryConfig) -> Result<()> {
    let server = DirectoryServer::bind(config, Arc::new(Registry::new())).await?;
    let shutdown = server.shutdown_handle();
    let running = tokio::spawn(server.run());

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown requested");
    shutdown.shutdown();

    match running.await {
        Ok(result) => result,
        Err(e) => {
            tracing::warn!(error = %e, "Directory task ended abnormally");
            Ok(())
        }
    }
}
