//! Registry records and the snapshot views handed to callers.

use peerdex_core::{PeerId, Timestamp};
use std::collections::BTreeSet;

/// A registered peer.
#[derive(Debug, Clone)]
pub(crate) struct PeerRecord {
    pub port: u16,
    pub last_seen: Timestamp,
    pub files: BTreeSet<String>,
}

impl PeerRecord {
    pub fn new(port: u16, now: Timestamp) -> Self {
        Self {
            port,
            last_seen: now,
            files: BTreeSet::new(),
        }
    }
}

/// One provider of a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provider {
    /// The providing peer.
    pub peer: PeerId,
    /// When the peer last announced the file.
    pub announced_at: Timestamp,
}

/// The providers of one filename, in announcement order.
#[derive(Debug, Clone, Default)]
pub(crate) struct FileEntry {
    pub providers: Vec<Provider>,
}

impl FileEntry {
    /// Adds `peer` or refreshes its timestamp. Returns true if it was new.
    pub fn upsert(&mut self, peer: &PeerId, now: Timestamp) -> bool {
        if let Some(existing) = self.providers.iter_mut().find(|p| &p.peer == peer) {
            existing.announced_at = now;
            false
        } else {
            self.providers.push(Provider {
                peer: peer.clone(),
                announced_at: now,
            });
            true
        }
    }

    /// Removes `peer`. Returns true if it was present.
    pub fn remove(&mut self, peer: &PeerId) -> bool {
        let before = self.providers.len();
        self.providers.retain(|p| &p.peer != peer);
        self.providers.len() != before
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

/// A copy of one peer record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerSnapshot {
    /// The peer's identity.
    pub id: PeerId,
    /// Data-plane listening port.
    pub port: u16,
    /// Last HELLO, PUBLISH, UPDATE, or PING.
    pub last_seen: Timestamp,
    /// Announced filenames, sorted.
    pub files: Vec<String>,
}

/// What a [`Registry::sync_files`](crate::Registry::sync_files) call changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncSummary {
    /// Files newly announced.
    pub added: usize,
    /// Files no longer announced.
    pub removed: usize,
}

/// Registry size counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryStats {
    /// Registered peers.
    pub peers: usize,
    /// Distinct filenames with at least one provider.
    pub files: usize,
    /// Total (file, provider) pairs.
    pub providers: usize,
}
