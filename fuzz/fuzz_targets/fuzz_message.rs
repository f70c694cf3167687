#![no_main]

use libfuzzer_sys::fuzz_target;
use peerdex_protocol::Message;

fuzz_target!(|data: &[u8]| {
    let Ok(message) = Message::decode_bytes(data) else {
        return;
    };

    // Anything that decodes is valid and must survive a re-encode.
    assert!(message.validate().is_ok(), "decoded an invalid message");
    let encoded = message.encode();
    let decoded = Message::decode(&encoded).expect("re-encoded message must decode");
    assert_eq!(decoded, message);
});
