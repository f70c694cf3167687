//! # Peerdex Registry
//!
//! The directory's in-memory index: which peers are alive and which of them
//! provide which files.
//!
//! Two maps are kept in step under one lock:
//!
//! - peer records, keyed by [`PeerId`](peerdex_core::PeerId), each holding
//!   the set of filenames that peer announced
//! - file entries, keyed by filename, each holding its providers
//!
//! Every identity listed as a provider has a live peer record, and every
//! peer record's file set matches the entries that list it. All state is
//! soft: peers that stop refreshing are removed by [`Registry::sweep`].
//!
//! ## Example
//!
//! ```rust
//! use peerdex_registry::Registry;
//!
//! let registry = Registry::new();
//! let alice = "alice:5001".parse().unwrap();
//! registry.register_peer(&alice, 5001);
//! registry.register_file("doc.txt", &alice).unwrap();
//! assert_eq!(registry.lookup_providers("doc.txt"), vec![alice]);
//! ```

#![forbid(unsafe_code)]

mod error;
mod record;
mod registry;

pub use error::{RegistryError, Result};
pub use record::{PeerSnapshot, Provider, RegistryStats, SyncSummary};
pub use registry::Registry;
