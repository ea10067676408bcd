//! AES-256-CBC payload encryption.
//!
//! The key and IV come from [`derive_session_key`](crate::derive_session_key);
//! padding is PKCS#7. CBC provides no integrity on its own; the protocol
//! signs every payload separately, and decryption happens only after the
//! sender's signature and certificate have been verified.

use aes::cipher::block_padding::Pkcs7;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use p384::{PublicKey, SecretKey};

use crate::agreement::{derive_session_key, SessionKey};
use crate::{CryptoError, Result};

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// Encrypt `plaintext` with a derived session key.
pub fn encrypt(session: &SessionKey, plaintext: &[u8]) -> Vec<u8> {
    Aes256CbcEnc::new(session.key().into(), session.iv().into())
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext)
}

/// Decrypt `ciphertext` with a derived session key.
///
/// # Errors
///
/// Returns [`CryptoError::Decryption`] when the ciphertext length is not a
/// whole number of blocks or the padding is invalid (wrong key material or
/// corrupted data).
pub fn decrypt(session: &SessionKey, ciphertext: &[u8]) -> Result<Vec<u8>> {
    Aes256CbcDec::new(session.key().into(), session.iv().into())
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| CryptoError::Decryption)
}

/// Encrypt a message for a peer: derive the shared session key, then
/// AES-CBC encrypt.
pub fn encrypt_message(
    their_public: &PublicKey,
    my_private: &SecretKey,
    plaintext: &[u8],
) -> Result<Vec<u8>> {
    let session = derive_session_key(their_public, my_private)?;
    Ok(encrypt(&session, plaintext))
}

/// Decrypt a message from a peer: derive the shared session key, then
/// AES-CBC decrypt.
///
/// # Errors
///
/// Returns [`CryptoError::Decryption`] for ciphertext that was not produced
/// with the matching key pair combination.
pub fn decrypt_message(
    their_public: &PublicKey,
    my_private: &SecretKey,
    ciphertext: &[u8],
) -> Result<Vec<u8>> {
    let session = derive_session_key(their_public, my_private)?;
    decrypt(&session, ciphertext)
}


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::generate_keypair;
    use proptest::prelude::*;

    proptest! {
        // Keep the case count low: each case runs a P-384 scalar multiply.
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn roundtrip_preserves_arbitrary_payloads(payload: Vec<u8>) {
            let (a_secret, a_public) = generate_keypair();
            let (b_secret, b_public) = generate_keypair();

            let ciphertext = encrypt_message(&b_public, &a_secret, &payload).unwrap();
            let plaintext = decrypt_message(&a_public, &b_secret, &ciphertext).unwrap();
            prop_assert_eq!(plaintext, payload);
        }

        #[test]
        fn ciphertext_is_block_aligned(payload: Vec<u8>) {
            let (a_secret, _) = generate_keypair();
            let (_, b_public) = generate_keypair();

            let ciphertext = encrypt_message(&b_public, &a_secret, &payload).unwrap();
            prop_assert_eq!(ciphertext.len() % 16, 0);
            prop_assert!(ciphertext.len() > payload.len());
        }
    }
}
