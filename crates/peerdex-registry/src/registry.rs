//! The peer/file registry.

use parking_lot::Mutex;
use peerdex_core::{Clock, PeerId, SystemClock, Timestamp};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::record::{FileEntry, PeerRecord};
use crate::{PeerSnapshot, Provider, RegistryError, RegistryStats, Result, SyncSummary};

#[derive(Debug, Default)]
struct RegistryState {
    peers: HashMap<PeerId, PeerRecord>,
    files: HashMap<String, FileEntry>,
}

impl RegistryState {
    /// Drops `peer` from one file entry and from the peer's own file set.
    fn remove_provider(&mut self, filename: &str, peer: &PeerId) -> bool {
        let mut removed = false;
        if let Some(entry) = self.files.get_mut(filename) {
            removed = entry.remove(peer);
            if entry.is_empty() {
                self.files.remove(filename);
                info!(file = %filename, "File removed from index");
            }
        }
        if let Some(record) = self.peers.get_mut(peer) {
            record.files.remove(filename);
        }
        removed
    }

    fn add_provider(&mut self, filename: &str, peer: &PeerId, now: Timestamp) -> bool {
        let added = self
            .files
            .entry(filename.to_string())
            .or_default()
            .upsert(peer, now);
        if let Some(record) = self.peers.get_mut(peer) {
            record.files.insert(filename.to_string());
        }
        added
    }

    fn deregister(&mut self, peer: &PeerId) -> bool {
        let Some(record) = self.peers.get(peer) else {
            return false;
        };
        let files: Vec<String> = record.files.iter().cloned().collect();
        for filename in &files {
            self.remove_provider(filename, peer);
        }
        self.peers.remove(peer);
        info!(peer = %peer, files = files.len(), "Peer deregistered");
        true
    }
}

/// The directory's peer and file index.
///
/// Thread-safe; every operation takes the same lock, so readers never see
/// a peer's file set out of step with the file entries.
pub struct Registry {
    state: Mutex<RegistryState>,
    clock: Arc<dyn Clock>,
}

impl Registry {
    /// Creates an empty registry on the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Creates an empty registry that reads time from `clock`.
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(RegistryState::default()),
            clock,
        }
    }

    /// Registers a peer, or refreshes it if already known.
    ///
    /// Returns true on first registration.
    pub fn register_peer(&self, peer: &PeerId, port: u16) -> bool {
        let now = self.clock.now();
        let mut state = self.state.lock();
        if let Some(record) = state.peers.get_mut(peer) {
            record.last_seen = now;
            record.port = port;
            debug!(peer = %peer, port, "Peer refreshed");
            false
        } else {
            state.peers.insert(peer.clone(), PeerRecord::new(port, now));
            info!(peer = %peer, port, "New peer registered");
            true
        }
    }

    /// Removes a peer and withdraws it from every file it provided.
    ///
    /// Returns false if the peer was not registered.
    pub fn deregister_peer(&self, peer: &PeerId) -> bool {
        self.state.lock().deregister(peer)
    }

    /// Records that `peer` provides `filename`.
    ///
    /// Re-announcing refreshes the provider timestamp rather than adding a
    /// second entry. Also counts as a liveness refresh.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownPeer`] if `peer` is not registered.
    pub fn register_file(&self, filename: &str, peer: &PeerId) -> Result<()> {
        let now = self.clock.now();
        let mut state = self.state.lock();
        let record = state
            .peers
            .get_mut(peer)
            .ok_or_else(|| RegistryError::UnknownPeer(peer.clone()))?;
        record.last_seen = now;

        if state.add_provider(filename, peer, now) {
            info!(file = %filename, peer = %peer, "File registered");
        } else {
            debug!(file = %filename, peer = %peer, "File re-announced");
        }
        Ok(())
    }

    /// Replaces the set of files `peer` provides.
    ///
    /// Files not yet announced are added; files missing from `files` are
    /// withdrawn exactly as on deregistration. Counts as a liveness refresh.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownPeer`] if `peer` is not registered.
    pub fn sync_files<I, S>(&self, peer: &PeerId, files: I) -> Result<SyncSummary>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let wanted: BTreeSet<String> = files.into_iter().map(Into::into).collect();
        let now = self.clock.now();
        let mut state = self.state.lock();

        let Some(record) = state.peers.get_mut(peer) else {
            warn!(peer = %peer, "Cannot sync files: peer not registered");
            return Err(RegistryError::UnknownPeer(peer.clone()));
        };
        record.last_seen = now;
        let current = record.files.clone();

        let mut summary = SyncSummary::default();
        for filename in wanted.difference(&current) {
            state.add_provider(filename, peer, now);
            summary.added += 1;
        }
        for filename in current.difference(&wanted) {
            state.remove_provider(filename, peer);
            summary.removed += 1;
        }

        info!(
            peer = %peer,
            added = summary.added,
            removed = summary.removed,
            "Synced peer files"
        );
        Ok(summary)
    }

    /// Returns the identities providing `filename`, in announcement order.
    ///
    /// An empty list means no provider is known.
    #[must_use]
    pub fn lookup_providers(&self, filename: &str) -> Vec<PeerId> {
        let state = self.state.lock();
        let providers: Vec<PeerId> = state
            .files
            .get(filename)
            .map(|entry| entry.providers.iter().map(|p| p.peer.clone()).collect())
            .unwrap_or_default();
        debug!(file = %filename, providers = providers.len(), "Lookup");
        providers
    }

    /// Returns the providers of `filename` with their announcement times.
    #[must_use]
    pub fn providers(&self, filename: &str) -> Vec<Provider> {
        self.state
            .lock()
            .files
            .get(filename)
            .map(|entry| entry.providers.clone())
            .unwrap_or_default()
    }

    /// Returns every indexed file with its providers.
    #[must_use]
    pub fn list_all_files(&self) -> BTreeMap<String, Vec<PeerId>> {
        self.state
            .lock()
            .files
            .iter()
            .map(|(name, entry)| {
                let peers = entry.providers.iter().map(|p| p.peer.clone()).collect();
                (name.clone(), peers)
            })
            .collect()
    }

    /// Returns the files announced by `peer`, sorted. Empty if unknown.
    #[must_use]
    pub fn list_files(&self, peer: &PeerId) -> Vec<String> {
        self.state
            .lock()
            .peers
            .get(peer)
            .map(|record| record.files.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Refreshes the liveness of `peer`.
    ///
    /// Returns false if the peer is not registered.
    pub fn touch(&self, peer: &PeerId) -> bool {
        let now = self.clock.now();
        match self.state.lock().peers.get_mut(peer) {
            Some(record) => {
                record.last_seen = now;
                true
            }
            None => false,
        }
    }

    /// Removes every peer not seen for longer than `timeout`.
    ///
    /// Returns the number of peers removed.
    pub fn sweep(&self, timeout: Duration) -> usize {
        let now = self.clock.now();
        let mut state = self.state.lock();
        let expired: Vec<PeerId> = state
            .peers
            .iter()
            .filter(|(_, record)| now.duration_since(record.last_seen) > timeout)
            .map(|(id, _)| id.clone())
            .collect();

        for peer in &expired {
            state.deregister(peer);
        }
        if !expired.is_empty() {
            info!(removed = expired.len(), "Expired inactive peers");
        }
        expired.len()
    }

    /// Returns a copy of one peer record.
    #[must_use]
    pub fn peer(&self, peer: &PeerId) -> Option<PeerSnapshot> {
        self.state
            .lock()
            .peers
            .get(peer)
            .map(|record| snapshot(peer, record))
    }

    /// Returns copies of all peer records, sorted by identity.
    #[must_use]
    pub fn peers(&self) -> Vec<PeerSnapshot> {
        let state = self.state.lock();
        let mut peers: Vec<PeerSnapshot> = state
            .peers
            .iter()
            .map(|(id, record)| snapshot(id, record))
            .collect();
        peers.sort_by(|a, b| a.id.cmp(&b.id));
        peers
    }

    /// Returns size counters.
    #[must_use]
    pub fn stats(&self) -> RegistryStats {
        let state = self.state.lock();
        RegistryStats {
            peers: state.peers.len(),
            files: state.files.len(),
            providers: state.files.values().map(|e| e.providers.len()).sum(),
        }
    }

    #[cfg(test)]
    fn assert_consistent(&self) {
        let state = self.state.lock();
        for (filename, entry) in &state.files {
            assert!(!entry.is_empty(), "empty entry for {filename}");
            let mut seen = BTreeSet::new();
            for provider in &entry.providers {
                assert!(seen.insert(&provider.peer), "duplicate provider");
                let record = state
                    .peers
                    .get(&provider.peer)
                    .unwrap_or_else(|| panic!("dangling provider {}", provider.peer));
                assert!(record.files.contains(filename));
            }
        }
        for (peer, record) in &state.peers {
            for filename in &record.files {
                let entry = state.files.get(filename).expect("missing entry");
                assert!(entry.providers.iter().any(|p| &p.peer == peer));
            }
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stats = self.stats();
        f.debug_struct("Registry")
            .field("peers", &stats.peers)
            .field("files", &stats.files)
            .field("providers", &stats.providers)
            .finish()
    }
}

fn snapshot(id: &PeerId, record: &PeerRecord) -> PeerSnapshot {
    PeerSnapshot {
        id: id.clone(),
        port: record.port,
        last_seen: record.last_seen,
        files: record.files.iter().cloned().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use peerdex_core::ManualClock;
    use pretty_assertions::assert_eq;

    fn peer(s: &str) -> PeerId {
        s.parse().unwrap()
    }

    fn manual() -> (Arc<ManualClock>, Registry) {
        let clock = Arc::new(ManualClock::new(Timestamp::from_secs(1_000_000)));
        let registry = Registry::with_clock(clock.clone());
        (clock, registry)
    }

    #[test]
    fn test_register_peer_is_idempotent() {
        let (clock, registry) = manual();
        let a = peer("a:5001");

        assert!(registry.register_peer(&a, 5001));
        clock.advance(Duration::from_secs(10));
        assert!(!registry.register_peer(&a, 6001));

        let snapshot = registry.peer(&a).unwrap();
        assert_eq!(snapshot.port, 6001);
        assert_eq!(snapshot.last_seen, Timestamp::from_secs(1_000_010));
        assert!(snapshot.files.is_empty());
    }

    #[test]
    fn test_register_file_requires_peer() {
        let registry = Registry::new();
        let a = peer("a:5001");
        assert_eq!(
            registry.register_file("doc.txt", &a),
            Err(RegistryError::UnknownPeer(a.clone()))
        );
        assert!(registry.lookup_providers("doc.txt").is_empty());
        registry.assert_consistent();
    }

    #[test]
    fn test_register_file_twice_keeps_one_entry() {
        let (clock, registry) = manual();
        let a = peer("a:5001");
        registry.register_peer(&a, 5001);

        registry.register_file("f", &a).unwrap();
        clock.advance(Duration::from_secs(30));
        registry.register_file("f", &a).unwrap();

        let providers = registry.providers("f");
        assert_eq!(providers.len(), 1);
        assert_eq!(providers[0].announced_at, Timestamp::from_secs(1_000_030));
        registry.assert_consistent();
    }

    #[test]
    fn test_deregister_removes_every_reference() {
        let registry = Registry::new();
        let a = peer("a:5001");
        let b = peer("b:5002");
        registry.register_peer(&a, 5001);
        registry.register_peer(&b, 5002);
        registry.register_file("shared.txt", &a).unwrap();
        registry.register_file("shared.txt", &b).unwrap();
        registry.register_file("only-a.txt", &a).unwrap();

        assert!(registry.deregister_peer(&a));

        assert_eq!(registry.lookup_providers("shared.txt"), vec![b.clone()]);
        assert!(!registry.list_all_files().contains_key("only-a.txt"));
        for providers in registry.list_all_files().values() {
            assert!(!providers.contains(&a));
        }
        assert!(registry.peer(&a).is_none());
        registry.assert_consistent();
    }

    #[test]
    fn test_deregister_unknown_peer() {
        let registry = Registry::new();
        assert!(!registry.deregister_peer(&peer("ghost:1")));
    }

    #[test]
    fn test_sync_files_diff() {
        let registry = Registry::new();
        let a = peer("a:5001");
        registry.register_peer(&a, 5001);
        registry.register_file("old.txt", &a).unwrap();
        registry.register_file("kept.txt", &a).unwrap();

        let summary = registry
            .sync_files(&a, ["kept.txt", "new one.txt"])
            .unwrap();
        assert_eq!(summary, SyncSummary { added: 1, removed: 1 });
        assert_eq!(registry.list_files(&a), vec!["kept.txt", "new one.txt"]);
        assert!(registry.lookup_providers("old.txt").is_empty());
        registry.assert_consistent();

        let summary = registry.sync_files(&a, Vec::<String>::new()).unwrap();
        assert_eq!(summary.removed, 2);
        assert_eq!(registry.stats().files, 0);
        registry.assert_consistent();
    }

    #[test]
    fn test_sync_files_unknown_peer() {
        let registry = Registry::new();
        let a = peer("a:5001");
        assert_eq!(
            registry.sync_files(&a, ["x"]),
            Err(RegistryError::UnknownPeer(a))
        );
        assert_eq!(registry.stats(), RegistryStats::default());
    }

    #[test]
    fn test_touch() {
        let (clock, registry) = manual();
        let a = peer("a:5001");
        assert!(!registry.touch(&a));
        registry.register_peer(&a, 5001);
        clock.advance(Duration::from_secs(5));
        assert!(registry.touch(&a));
        assert_eq!(
            registry.peer(&a).unwrap().last_seen,
            Timestamp::from_secs(1_000_005)
        );
    }

    #[test]
    fn test_sweep_boundary() {
        let (clock, registry) = manual();
        let timeout = Duration::from_secs(300);
        let a = peer("a:5001");
        registry.register_peer(&a, 5001);
        registry.register_file("doc.txt", &a).unwrap();

        clock.advance(timeout - Duration::from_secs(1));
        assert_eq!(registry.sweep(timeout), 0);
        assert_eq!(registry.lookup_providers("doc.txt"), vec![a.clone()]);

        clock.advance(Duration::from_secs(2));
        assert_eq!(registry.sweep(timeout), 1);
        assert!(registry.peer(&a).is_none());
        assert!(registry.lookup_providers("doc.txt").is_empty());
        assert!(registry.list_all_files().is_empty());
        registry.assert_consistent();
    }

    #[test]
    fn test_sweep_spares_refreshed_peers() {
        let (clock, registry) = manual();
        let timeout = Duration::from_secs(300);
        let a = peer("a:5001");
        let b = peer("b:5002");
        registry.register_peer(&a, 5001);
        registry.register_peer(&b, 5002);

        clock.advance(Duration::from_secs(200));
        registry.touch(&b);
        clock.advance(Duration::from_secs(200));

        assert_eq!(registry.sweep(timeout), 1);
        assert!(registry.peer(&a).is_none());
        assert!(registry.peer(&b).is_some());
    }

    #[test]
    fn test_snapshots_are_copies() {
        let registry = Registry::new();
        let a = peer("a:5001");
        registry.register_peer(&a, 5001);
        registry.register_file("doc.txt", &a).unwrap();

        let mut listing = registry.list_all_files();
        listing.clear();
        let mut files = registry.list_files(&a);
        files.push("fake".into());

        assert_eq!(registry.list_all_files().len(), 1);
        assert_eq!(registry.list_files(&a), vec!["doc.txt"]);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Register(u8),
        Deregister(u8),
        Publish(u8, u8),
        Sync(u8, Vec<u8>),
        Sweep(u8),
    }

    fn op() -> impl proptest::strategy::Strategy<Value = Op> {
        use proptest::prelude::*;
        prop_oneof![
            (0u8..4).prop_map(Op::Register),
            (0u8..4).prop_map(Op::Deregister),
            (0u8..4, 0u8..6).prop_map(|(p, f)| Op::Publish(p, f)),
            (0u8..4, proptest::collection::vec(0u8..6, 0..4)).prop_map(|(p, fs)| Op::Sync(p, fs)),
            (0u8..30).prop_map(Op::Sweep),
        ]
    }

    proptest::proptest! {
        #[test]
        fn test_random_operations_keep_invariants(ops in proptest::collection::vec(op(), 1..60)) {
            let (clock, registry) = manual();
            let id = |p: u8| peer(&format!("peer{p}:{}", 6000 + u16::from(p)));
            for op in ops {
                match op {
                    Op::Register(p) => {
                        registry.register_peer(&id(p), 6000);
                    }
                    Op::Deregister(p) => {
                        registry.deregister_peer(&id(p));
                    }
                    Op::Publish(p, f) => {
                        let _ = registry.register_file(&format!("file{f}"), &id(p));
                    }
                    Op::Sync(p, fs) => {
                        let _ = registry.sync_files(&id(p), fs.iter().map(|f| format!("file{f}")));
                    }
                    Op::Sweep(secs) => {
                        clock.advance(Duration::from_secs(u64::from(secs)));
                        registry.sweep(Duration::from_secs(20));
                    }
                }
                registry.assert_consistent();
            }
        }
    }

    #[test]
    fn test_concurrent_mutation_stays_consistent() {
        let registry = Arc::new(Registry::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    let me = peer(&format!("p{i}:{}", 5000 + i));
                    for round in 0..50 {
                        registry.register_peer(&me, 5000);
                        registry.register_file(&format!("f{}", round % 5), &me).unwrap();
                        if round % 7 == 0 {
                            registry.sync_files(&me, ["f0", "shared"]).unwrap();
                        }
                        if round % 11 == 0 {
                            registry.deregister_peer(&me);
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        registry.assert_consistent();
    }
}
