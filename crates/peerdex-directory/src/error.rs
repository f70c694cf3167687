//! Directory error types.

use peerdex_protocol::MessageKind;
use peerdex_registry::RegistryError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        /// File that was being read.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The configuration file is not valid YAML for this schema.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// A value is out of range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Errors from running the directory server.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// Bad configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Socket error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A specialized Result type for directory operations.
pub type Result<T> = std::result::Result<T, DirectoryError>;

/// Why a request could not be served. Each variant maps to an ERROR code.
#[derive(Debug, Error)]
pub enum SessionError {
    /// A request other than HELLO arrived before registration.
    #[error("send HELLO before {0}")]
    Unregistered(MessageKind),

    /// The registry rejected the operation.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// HELLO carried a name that does not form a valid identity.
    #[error(transparent)]
    InvalidIdentity(#[from] peerdex_core::Error),

    /// The message is not a directory request.
    #[error("{0} is not accepted by the directory")]
    Unexpected(MessageKind),
}

impl SessionError {
    /// Returns the ERROR code sent to the peer.
    #[must_use]
    pub fn code(&self) -> &'static str {
        use peerdex_protocol::codes;
        match self {
            Self::Unregistered(_) => codes::UNREGISTERED,
            Self::Registry(RegistryError::UnknownPeer(_)) => codes::UNKNOWN_PEER,
            Self::InvalidIdentity(_) => codes::INVALID,
            Self::Unexpected(_) => codes::UNEXPECTED,
        }
    }
}
