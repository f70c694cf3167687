//! Error types for registry operations.

use peerdex_core::PeerId;
use thiserror::Error;

/// Errors that can occur during registry operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// The identity has no peer record.
    #[error("unknown peer: {0}")]
    UnknownPeer(PeerId),
}

/// A specialized Result type for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;
