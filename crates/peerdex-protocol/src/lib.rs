//! # Peerdex Protocol
//!
//! Wire protocol for the Peerdex directory and peer-to-peer transfers.
//!
//! Control messages are short UTF-8 texts: a keyword, a space, and a
//! payload whose fields are separated by spaces or, where a field may
//! itself contain spaces, by [`FIELD_SEPARATOR`]. On a socket each message
//! travels as one length-prefixed frame (see [`frame`]). A `DATA` header is
//! followed directly by the raw file bytes it announces.
//!
//! ```rust
//! use peerdex_protocol::Message;
//!
//! let msg = Message::Fetch { filename: "holiday photos.zip".into() };
//! assert_eq!(msg.encode(), "FETCH holiday photos.zip");
//! assert_eq!(Message::decode(&msg.encode()).unwrap(), msg);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod codes;
mod error;
pub mod frame;
mod message;

pub use error::{ProtocolError, Result};
pub use frame::{encode_frame, read_frame, read_message, write_message};
pub use message::{check_filename, ListingEntry, Message, MessageKind};

/// Separator between fields that may contain spaces.
pub const FIELD_SEPARATOR: &str = "|||";

/// Maximum size of a single control frame in bytes (1 MiB).
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;
