//! Property tests for the message codec.

use peerdex_core::PeerId;
use peerdex_protocol::{ListingEntry, Message};
use proptest::prelude::*;

fn filename() -> impl Strategy<Value = String> {
    // Printable names with spaces and inner pipes, never blank.
    "[a-zA-Z0-9_.-]([a-zA-Z0-9 _.:|-]{0,30}[a-zA-Z0-9_.-])?"
        .prop_filter("no field separator", |s| !s.contains("|||"))
}

fn peer_id() -> impl Strategy<Value = PeerId> {
    ("[a-z][a-z0-9.-]{0,15}", 1u16..).prop_map(|(host, port)| PeerId::new(host, port).unwrap())
}

fn message() -> impl Strategy<Value = Message> {
    prop_oneof![
        ("[a-z][a-z0-9_]{0,15}", any::<u16>()).prop_map(|(name, port)| Message::Hello { name, port }),
        (filename(), peer_id()).prop_map(|(filename, peer)| Message::Publish { filename, peer }),
        (peer_id(), prop::collection::vec(filename(), 0..5))
            .prop_map(|(peer, files)| Message::Update { peer, files }),
        filename().prop_map(|filename| Message::Fetch { filename }),
        prop::collection::vec(peer_id(), 0..5).prop_map(|ids| Message::providers(&ids)),
        prop::collection::vec((filename(), prop::collection::vec(peer_id(), 1..4)), 0..4).prop_map(
            |entries| Message::Listing {
                entries: entries
                    .into_iter()
                    .map(|(filename, providers)| ListingEntry {
                        filename,
                        providers,
                    })
                    .collect(),
            }
        ),
        proptest::option::of(peer_id()).prop_map(|peer| Message::Ping { peer }),
        proptest::option::of(peer_id()).prop_map(|peer| Message::Discover { peer }),
        (filename(), peer_id()).prop_map(|(filename, requester)| Message::Get {
            filename,
            requester
        }),
        (filename(), any::<u64>()).prop_map(|(filename, size)| Message::Data { filename, size }),
    ]
}

proptest! {
    #[test]
    fn decode_inverts_encode(message in message()) {
        prop_assert!(message.validate().is_ok());
        let decoded = Message::decode(&message.encode()).unwrap();
        prop_assert_eq!(decoded, message);
    }

    #[test]
    fn decode_never_panics(text in "\\PC{0,64}") {
        let _ = Message::decode(&text);
    }

    #[test]
    fn decoded_messages_always_validate(text in "[A-Z]{3,8} [a-z:|0-9 \n]{0,40}") {
        if let Ok(message) = Message::decode(&text) {
            prop_assert!(message.validate().is_ok(), "{:?} decoded from {:?}", message, text);
        }
    }
}
