//! Per-connection request handling.
//!
//! A [`Session`] is a small state machine. It starts [`Unregistered`], binds
//! an identity on HELLO, and ends [`Closed`] after BYE. Every request it
//! handles produces exactly one reply.
//!
//! [`Unregistered`]: SessionState::Unregistered
//! [`Closed`]: SessionState::Closed

use crate::SessionError;
use peerdex_core::PeerId;
use peerdex_protocol::{codes, ListingEntry, Message, MessageKind, ProtocolError};
use peerdex_registry::Registry;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// No valid HELLO yet.
    Unregistered,
    /// Bound to an identity by HELLO.
    Registered(PeerId),
    /// The peer said BYE; no further requests are read.
    Closed,
}

/// Request handler for one control connection.
#[derive(Debug)]
pub struct Session {
    registry: Arc<Registry>,
    state: SessionState,
}

impl Session {
    /// Creates an unregistered session.
    #[must_use]
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            state: SessionState::Unregistered,
        }
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Returns the identity bound by HELLO, if any.
    #[must_use]
    pub fn identity(&self) -> Option<&PeerId> {
        match &self.state {
            SessionState::Registered(id) => Some(id),
            _ => None,
        }
    }

    /// Returns true once the peer has left.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state == SessionState::Closed
    }

    /// Handles one decoded request and returns the reply to send.
    pub fn handle(&mut self, message: Message) -> Message {
        let kind = message.kind();
        let reply = match self.dispatch(message) {
            Ok(reply) => reply,
            Err(e) => {
                debug!(kind = %kind, error = %e, "Request rejected");
                Message::error(e.code(), e.to_string())
            }
        };

        // A reply built from registry contents can still fail to encode,
        // e.g. a scoped listing of names containing spaces.
        match reply.validate() {
            Ok(()) => reply,
            Err(e) => {
                warn!(kind = %kind, error = %e, "Reply cannot be encoded");
                Message::error(codes::INVALID, format!("reply cannot be encoded: {e}"))
            }
        }
    }

    /// Builds the reply for a frame that did not decode.
    #[must_use]
    pub fn reject_malformed(&self, error: &ProtocolError) -> Message {
        debug!(peer = ?self.identity(), error = %error, "Malformed request");
        Message::error(codes::INVALID, error.to_string().replace(['\n', '\r'], " "))
    }

    fn dispatch(&mut self, message: Message) -> Result<Message, SessionError> {
        if let Message::Hello { name, port } = message {
            return self.hello(name, port);
        }

        let bound = match &self.state {
            SessionState::Registered(id) => id.clone(),
            _ => return Err(SessionError::Unregistered(message.kind())),
        };

        match message {
            Message::Publish { filename, peer } => {
                self.registry.register_file(&filename, &peer)?;
                info!(peer = %peer, file = %filename, "File published");
                Ok(Message::ok("published"))
            }
            Message::Update { peer, files } => {
                let summary = self.registry.sync_files(&peer, files)?;
                info!(
                    peer = %peer,
                    added = summary.added,
                    removed = summary.removed,
                    "File list synchronized"
                );
                Ok(Message::ok("synchronized"))
            }
            Message::Fetch { filename } => {
                let providers = self.registry.lookup_providers(&filename);
                debug!(file = %filename, providers = providers.len(), "Lookup");
                Ok(Message::providers(&providers))
            }
            Message::Ping { peer } => {
                let target = peer.unwrap_or(bound);
                if !self.registry.touch(&target) {
                    debug!(peer = %target, "Ping for unknown peer");
                }
                Ok(Message::Alive)
            }
            Message::Discover { peer: Some(peer) } => Ok(Message::Result {
                items: self.registry.list_files(&peer),
            }),
            Message::Discover { peer: None } => {
                let entries = self
                    .registry
                    .list_all_files()
                    .into_iter()
                    .map(|(filename, providers)| ListingEntry {
                        filename,
                        providers,
                    })
                    .collect();
                Ok(Message::Listing { entries })
            }
            Message::Bye => {
                self.registry.deregister_peer(&bound);
                info!(peer = %bound, "Peer left");
                self.state = SessionState::Closed;
                Ok(Message::ok("bye"))
            }
            other => Err(SessionError::Unexpected(other.kind())),
        }
    }

    fn hello(&mut self, name: String, port: u16) -> Result<Message, SessionError> {
        if self.is_closed() {
            return Err(SessionError::Unexpected(MessageKind::Hello));
        }
        let id = PeerId::new(name, port)?;
        self.registry.register_peer(&id, port);
        self.state = SessionState::Registered(id);
        Ok(Message::ok("registered"))
    }
}
