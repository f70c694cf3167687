#![no_main]

use libfuzzer_sys::fuzz_target;
use peerdex_protocol::read_message;

fuzz_target!(|data: &[u8]| {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("runtime");

    runtime.block_on(async {
        let mut reader = data;
        loop {
            match read_message(&mut reader).await {
                Ok(Some(_)) => {}
                Ok(None) => break,
                Err(e) if e.is_fatal() => break,
                Err(_) => {}
            }
        }
    });
});
