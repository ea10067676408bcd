//! Fuzz target for AES-CBC decryption.
//!
//! Decrypting arbitrary bytes with a real session key must reject bad
//! input with an error, never panic.

#![no_main]

use libfuzzer_sys::fuzz_target;
use smmp_crypto::{decrypt, derive_session_key, generate_keypair};

fuzz_target!(|data: &[u8]| {
    let (my_secret, _) = generate_keypair();
    let (_, their_public) = generate_keypair();
    let session = derive_session_key(&their_public, &my_secret).unwrap();

    let _ = decrypt(&session, data);
});
