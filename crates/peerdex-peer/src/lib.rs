//! # Peerdex Peer
//!
//! Everything a peer runs besides its user interface.
//!
//! - [`PeerClient`] talks to the directory: HELLO, PUBLISH, UPDATE, FETCH,
//!   DISCOVER, PING, BYE. Its [`fetch`](PeerClient::fetch) drives the
//!   multi-provider download.
//! - [`TransferListener`] serves GET requests from other peers.
//! - [`download`] is the requesting side of one transfer.
//! - [`LocalStore`] abstracts the repository; [`FsStore`] is the on-disk
//!   one, [`Catalog`] adds names published under an alias.
//! - [`PeerNode`] wires the pieces together.
//!
//! ## Example
//!
//! ```rust,no_run
//! use peerdex_peer::{FetchOutcome, PeerConfig, PeerNode};
//!
//! # async fn example() -> peerdex_peer::Result<()> {
//! let node = PeerNode::start(&PeerConfig::new("alice")).await?;
//! match node.client().fetch("report.pdf").await? {
//!     FetchOutcome::AlreadyLocal => println!("already here"),
//!     FetchOutcome::Downloaded { provider, bytes } => {
//!         println!("{bytes} bytes from {provider}");
//!     }
//! }
//! node.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod client;
pub mod config;
mod error;
pub mod listener;
pub mod node;
pub mod store;
pub mod transfer;

pub use catalog::Catalog;
pub use client::{FetchOutcome, PeerClient};
pub use config::{PeerConfig, DEFAULT_CHUNK_SIZE};
pub use error::{ConfigError, FailedAttempt, PeerError, Result};
pub use listener::TransferListener;
pub use node::PeerNode;
pub use store::{FsStore, LocalStore, MemoryStore};
pub use transfer::{download, resolve_provider};
