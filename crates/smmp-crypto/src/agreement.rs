//! ECDH key agreement and HKDF session key derivation.
//!
//! A P-384 Diffie-Hellman exchange yields a 48-byte shared secret. The
//! first 32 bytes are the input key material and the remaining 16 bytes the
//! salt for HKDF-SHA512, which expands to a 32-byte AES key and a 16-byte
//! IV. The HKDF info string is a protocol-version constant shared by both
//! peers, so the two sides derive identical key material without ever
//! transmitting it.

use hkdf::Hkdf;
use p384::ecdh::diffie_hellman;
use p384::{PublicKey, SecretKey};
use sha2::Sha512;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::{CryptoError, Result};

/// Size of the derived AES key in bytes (256 bits).
pub const SESSION_KEY_SIZE: usize = 32;

/// Size of the derived IV in bytes (128 bits).
pub const SESSION_IV_SIZE: usize = 16;

/// HKDF info string; a protocol-version constant shared by both peers.
const HKDF_INFO: &[u8] = b"SMMPv1";

/// AES key and IV derived from an ECDH exchange.
///
/// Zeroized on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SessionKey {
    key: [u8; SESSION_KEY_SIZE],
    iv: [u8; SESSION_IV_SIZE],
}

impl SessionKey {
    /// The AES-256 key.
    pub fn key(&self) -> &[u8; SESSION_KEY_SIZE] {
        &self.key
    }

    /// The CBC initialization vector.
    pub fn iv(&self) -> &[u8; SESSION_IV_SIZE] {
        &self.iv
    }
}

impl std::fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SessionKey([REDACTED])")
    }
}

/// Derive the shared session key for a peer.
///
/// Symmetric: `derive_session_key(their_public, my_private)` on one side
/// equals `derive_session_key(my_public, their_private)` on the other.
///
/// # Errors
///
/// Returns [`CryptoError::KeyDerivation`] if HKDF expansion fails.
pub fn derive_session_key(their_public: &PublicKey, my_private: &SecretKey) -> Result<SessionKey> {
    let shared = diffie_hellman(my_private.to_nonzero_scalar(), their_public.as_affine());
    let secret = shared.raw_secret_bytes();

    // 48-byte shared secret: 32 bytes ikm, 16 bytes salt.
    let (ikm, salt) = secret.split_at(SESSION_KEY_SIZE);

    let hkdf = Hkdf::<Sha512>::new(Some(salt), ikm);
    let mut okm = [0u8; SESSION_KEY_SIZE + SESSION_IV_SIZE];
    hkdf.expand(HKDF_INFO, &mut okm)
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;

    let mut key = [0u8; SESSION_KEY_SIZE];
    let mut iv = [0u8; SESSION_IV_SIZE];
    key.copy_from_slice(&okm[..SESSION_KEY_SIZE]);
    iv.copy_from_slice(&okm[SESSION_KEY_SIZE..]);
    okm.zeroize();

    Ok(SessionKey { key, iv })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generate_keypair;

    #[test]
    fn both_sides_derive_the_same_session_key() {
        let (a_secret, a_public) = generate_keypair();
        let (b_secret, b_public) = generate_keypair();

        let a_side = derive_session_key(&b_public, &a_secret).unwrap();
        let b_side = derive_session_key(&a_public, &b_secret).unwrap();

        assert_eq!(a_side.key(), b_side.key());
        assert_eq!(a_side.iv(), b_side.iv());
    }

    #[test]
    fn different_peers_derive_different_keys() {
        let (a_secret, _) = generate_keypair();
        let (_, b_public) = generate_keypair();
        let (_, c_public) = generate_keypair();

        let with_b = derive_session_key(&b_public, &a_secret).unwrap();
        let with_c = derive_session_key(&c_public, &a_secret).unwrap();

        assert_ne!(with_b.key(), with_c.key());
    }

    #[test]
    fn session_key_debug_is_redacted() {
        let (a_secret, _) = generate_keypair();
        let (_, b_public) = generate_keypair();
        let session = derive_session_key(&b_public, &a_secret).unwrap();
        assert_eq!(format!("{:?}", session), "SessionKey([REDACTED])");
    }
}
