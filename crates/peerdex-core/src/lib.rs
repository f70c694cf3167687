//! # Peerdex Core
//!
//! Core types shared by every Peerdex crate.
//!
//! - [`PeerId`], the `host:port` identity that keys a peer in the directory
//! - [`Timestamp`] and the [`Clock`] abstraction used for liveness expiry
//! - [`Error`], raised when an identity cannot be parsed
//!
//! ## Example
//!
//! ```rust
//! use peerdex_core::PeerId;
//!
//! let id: PeerId = "alice:5001".parse().unwrap();
//! assert_eq!(id.port(), 5001);
//! assert_eq!(id.to_string(), "alice:5001");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod id;
pub mod timestamp;

pub use error::{Error, Result};
pub use id::PeerId;
pub use timestamp::{Clock, ManualClock, SystemClock, Timestamp};
