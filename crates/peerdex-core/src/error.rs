//! Error types for Peerdex core operations.

use thiserror::Error;

/// The error type for core operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// A peer identity string could not be parsed.
    #[error("invalid peer identity '{value}': {reason}")]
    InvalidIdentity {
        /// The rejected input.
        value: String,
        /// Why it was rejected.
        reason: &'static str,
    },
}

/// A specialized Result type for core operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Creates a new invalid identity error.
    #[must_use]
    pub fn invalid_identity(value: impl Into<String>, reason: &'static str) -> Self {
        Self::InvalidIdentity {
            value: value.into(),
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn error_invalid_identity_display() {
        let err = Error::invalid_identity("nope", "missing port");
        assert_eq!(err.to_string(), "invalid peer identity 'nope': missing port");
    }
}
