#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use peerdex_core::{ManualClock, PeerId, Timestamp};
use peerdex_registry::Registry;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Arbitrary)]
enum Op {
    Register(u8),
    Deregister(u8),
    Publish(u8, u8),
    Sync(u8, Vec<u8>),
    Touch(u8),
    Advance(u16),
    Sweep(u16),
}

fn peer(n: u8) -> PeerId {
    PeerId::new(format!("p{}", n % 8), 5000 + u16::from(n % 8)).expect("valid id")
}

fn file(n: u8) -> String {
    format!("f{}", n % 16)
}

fuzz_target!(|ops: Vec<Op>| {
    let clock = Arc::new(ManualClock::new(Timestamp::from_secs(1_000)));
    let registry = Registry::with_clock(clock.clone());

    for op in ops {
        match op {
            Op::Register(p) => {
                registry.register_peer(&peer(p), 1);
            }
            Op::Deregister(p) => {
                registry.deregister_peer(&peer(p));
            }
            Op::Publish(p, f) => {
                let _ = registry.register_file(&file(f), &peer(p));
            }
            Op::Sync(p, files) => {
                let _ = registry.sync_files(&peer(p), files.into_iter().map(file));
            }
            Op::Touch(p) => {
                registry.touch(&peer(p));
            }
            Op::Advance(secs) => clock.advance(Duration::from_secs(u64::from(secs))),
            Op::Sweep(secs) => {
                registry.sweep(Duration::from_secs(u64::from(secs)));
            }
        }

        // Every provider must be a live peer that lists the file.
        for (name, providers) in registry.list_all_files() {
            assert!(!providers.is_empty());
            for provider in providers {
                assert!(registry.list_files(&provider).contains(&name));
            }
        }
        for snapshot in registry.peers() {
            for name in &snapshot.files {
                assert!(registry.lookup_providers(name).contains(&snapshot.id));
            }
        }
    }
});
