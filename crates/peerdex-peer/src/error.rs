//! Peer error types.

use peerdex_core::PeerId;
use peerdex_protocol::ProtocolError;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// One failed download attempt during provider fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedAttempt {
    /// The provider that was tried.
    pub provider: PeerId,
    /// Why it failed.
    pub reason: String,
}

impl fmt::Display for FailedAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.provider, self.reason)
    }
}

/// Errors that can occur on the peer side.
#[derive(Debug, Error)]
pub enum PeerError {
    /// Could not reach a directory or provider.
    #[error("cannot connect to {addr}: {source}")]
    Connection {
        /// Address or identity that was dialed.
        addr: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The directory closed the control connection.
    #[error("directory closed the connection")]
    Disconnected,

    /// Framing or decoding failure.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Local filesystem failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An identity could not be built or parsed.
    #[error(transparent)]
    Identity(#[from] peerdex_core::Error),

    /// A name that cannot be stored in or announced from the repository.
    #[error("invalid file name {name:?}: {reason}")]
    InvalidName {
        /// The rejected name.
        name: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// Publishing a file that is not in the local repository.
    #[error("{0} is not in the local repository")]
    LocalFileMissing(String),

    /// The directory knows no provider for the file, other than ourselves.
    #[error("no providers for {0}")]
    NoProviders(String),

    /// Every candidate provider was tried and failed.
    #[error("all {} providers failed for {filename}", .attempts.len())]
    AllProvidersFailed {
        /// The requested file.
        filename: String,
        /// One entry per provider tried, in order.
        attempts: Vec<FailedAttempt>,
    },

    /// The provider does not have the file.
    #[error("provider does not have {0}")]
    NotFound(String),

    /// The provider or directory answered with an ERROR.
    #[error("rejected with {code}: {description}")]
    Rejected {
        /// Error code from the reply.
        code: String,
        /// Human-readable description from the reply.
        description: String,
    },

    /// A reply of the wrong kind, or for the wrong file.
    #[error("unexpected reply: {0}")]
    UnexpectedReply(String),

    /// The provider closed the stream before sending every byte.
    #[error("incomplete transfer: expected {expected} bytes, received {received}")]
    IncompleteTransfer {
        /// Byte count announced in the DATA header.
        expected: u64,
        /// Bytes actually received.
        received: u64,
    },

    /// Bad peer configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Errors raised while loading or validating peer configuration.
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

impl PeerError {
    pub(crate) fn connection(addr: impl fmt::Display, source: std::io::Error) -> Self {
        Self::Connection {
            addr: addr.to_string(),
            source,
        }
    }

    pub(crate) fn unexpected(reply: &peerdex_protocol::Message) -> Self {
        Self::UnexpectedReply(reply.kind().to_string())
    }
}

/// A specialized Result type for peer operations.
pub type Result<T> = std::result::Result<T, PeerError>;
