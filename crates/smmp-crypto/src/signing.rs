//! ECDSA signing and verification.
//!
//! Signatures are ECDSA over P-384 with a SHA-512 message digest (the
//! protocol's `SHA512withECDSA` suite) and are exchanged in DER encoding.

use p384::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use p384::ecdsa::{Signature, SigningKey, VerifyingKey};
use p384::{PublicKey, SecretKey};
use sha2::{Digest, Sha512};

use crate::{CryptoError, Result};

/// Sign `data` with the given private key.
///
/// The data is digested with SHA-512 before signing. Returns the signature
/// in DER encoding.
///
/// # Errors
///
/// Returns [`CryptoError::Signing`] if signature generation fails.
pub fn sign(private_key: &SecretKey, data: &[u8]) -> Result<Vec<u8>> {
    let signing_key = SigningKey::from(private_key);
    let digest = Sha512::digest(data);
    let signature: Signature = signing_key
        .sign_prehash(&digest)
        .map_err(|e| CryptoError::Signing(e.to_string()))?;
    Ok(signature.to_der().as_bytes().to_vec())
}

/// Verify a DER-encoded signature over `data` with the given public key.
///
/// Returns `false` for malformed signatures as well as for valid-looking
/// signatures that do not verify. A forged signature must never be
/// distinguishable from a corrupt one to the caller.
pub fn verify(public_key: &PublicKey, data: &[u8], signature: &[u8]) -> bool {
    let Ok(signature) = Signature::from_der(signature) else {
        return false;
    };
    let verifying_key = VerifyingKey::from(public_key);
    let digest = Sha512::digest(data);
    verifying_key.verify_prehash(&digest, &signature).is_ok()
}
