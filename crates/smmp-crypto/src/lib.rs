//! # smmp-crypto
//!
//! Cryptographic primitives for the SMMP client:
//!
//! - **ECDSA** (P-384) signatures over a SHA-512 digest
//! - **ECDH + HKDF-SHA512** session key and IV derivation
//! - **AES-256-CBC** with PKCS#7 padding for payload encryption
//!
//! All operations are stateless functions over keys and byte buffers.
//! Both peers derive the identical AES key and IV from the same key pair
//! combination, so neither is ever transmitted.
//!
//! ## Security
//!
//! Derived key material uses `zeroize` for cleanup on drop. Private keys
//! are the `p384` crate's `SecretKey` type, which zeroizes internally.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod agreement;
pub mod cipher;
pub mod error;
pub mod signing;

pub use agreement::{derive_session_key, SessionKey};
pub use cipher::{decrypt, decrypt_message, encrypt, encrypt_message};
pub use error::{CryptoError, Result};
pub use signing::{sign, verify};

// Re-exported so dependent crates agree on one curve implementation.
pub use p384::{PublicKey, SecretKey};

use rand::rngs::OsRng;

/// Generate a fresh P-384 key pair.
pub fn generate_keypair() -> (SecretKey, PublicKey) {
    let secret = SecretKey::random(&mut OsRng);
    let public = secret.public_key();
    (secret, public)
}
