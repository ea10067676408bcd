//! Fuzz target for Frame::from_bytes.
//!
//! Parsing arbitrary bytes must either yield a frame or an error, never
//! panic.

#![no_main]

use libfuzzer_sys::fuzz_target;
use smmp_protocol::Frame;

fuzz_target!(|data: &[u8]| {
    if let Ok(frame) = Frame::from_bytes(data) {
        // Anything that parsed must survive a re-encode.
        let bytes = frame.to_bytes().unwrap();
        let roundtrip = Frame::from_bytes(&bytes).unwrap();
        assert_eq!(frame, roundtrip);
    }
});
