//! Error codes carried in `ERROR` replies.

/// The request could not be decoded.
pub const INVALID: &str = "INVALID";

/// The connection has not sent a valid HELLO yet.
pub const UNREGISTERED: &str = "UNREGISTERED";

/// The named peer is not registered with the directory.
pub const UNKNOWN_PEER: &str = "UNKNOWN_PEER";

/// The requested file is not available on this peer.
pub const NOT_FOUND: &str = "NOT_FOUND";

/// The message is valid but not accepted on this endpoint.
pub const UNEXPECTED: &str = "UNEXPECTED";
