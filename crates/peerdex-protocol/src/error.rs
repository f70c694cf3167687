//! Protocol error types.

use thiserror::Error;

/// Errors that can occur while encoding, decoding, or framing messages.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The message text does not follow the grammar.
    #[error("malformed message: {0}")]
    Malformed(String),

    /// A field value cannot be represented on the wire.
    #[error("invalid {field}: {reason}")]
    InvalidField {
        /// The offending field.
        field: &'static str,
        /// Why it cannot be encoded.
        reason: &'static str,
    },

    /// A frame exceeds the size limit.
    #[error("frame too large: {size} bytes (max {max})")]
    TooLarge {
        /// The announced size.
        size: usize,
        /// The maximum allowed size.
        max: usize,
    },

    /// The stream ended in the middle of a frame.
    #[error("connection closed mid-frame")]
    Truncated,

    /// I/O error on the underlying stream.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProtocolError {
    /// Returns true if the stream can no longer be used after this error.
    ///
    /// A malformed message inside a well-formed frame leaves the stream in
    /// sync; everything else does not.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Malformed(_) | Self::InvalidField { .. })
    }
}

/// A specialized Result type for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;
