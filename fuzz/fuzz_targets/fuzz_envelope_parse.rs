//! Fuzz target for Envelope::from_bytes.
//!
//! Arbitrary bytes must parse or fail cleanly, and any envelope that
//! parses must respect the wire size limits and re-encode identically.

#![no_main]

use libfuzzer_sys::fuzz_target;
use smmp_protocol::limits::{MAX_CERTIFICATE_SIZE, MAX_PAYLOAD_SIZE, MAX_SIGNATURE_SIZE};
use smmp_protocol::Envelope;

fuzz_target!(|data: &[u8]| {
    if let Ok(envelope) = Envelope::from_bytes(data) {
        assert!(envelope.payload.len() <= MAX_PAYLOAD_SIZE);
        assert!(envelope.certificate.len() <= MAX_CERTIFICATE_SIZE);
        assert!(envelope.signature.len() <= MAX_SIGNATURE_SIZE);

        let bytes = envelope.to_bytes().unwrap();
        let roundtrip = Envelope::from_bytes(&bytes).unwrap();
        assert_eq!(envelope, roundtrip);
    }
});
