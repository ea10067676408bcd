//! Fuzz target for AckEnvelope::from_bytes.

#![no_main]

use libfuzzer_sys::fuzz_target;
use smmp_protocol::AckEnvelope;

fuzz_target!(|data: &[u8]| {
    if let Ok(ack) = AckEnvelope::from_bytes(data) {
        let bytes = ack.to_bytes().unwrap();
        let roundtrip = AckEnvelope::from_bytes(&bytes).unwrap();
        assert_eq!(ack, roundtrip);
    }
});
