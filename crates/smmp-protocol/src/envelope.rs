//! The signed, optionally encrypted application envelope.
//!
//! Construction order on send: encrypt (when requested), then sign, so the
//! signature covers the payload exactly as transmitted. Opening order on
//! receipt: establish certificate trust, verify the signature over the
//! transmitted bytes, and only then decrypt. Ciphertext whose signature
//! does not verify is never fed to the cipher.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use smmp_crypto::{decrypt_message, encrypt_message, sign, verify, PublicKey};
use smmp_pki::{LocalIdentity, TrustStore};

use crate::limits::{
    check_size, MAX_CERTIFICATE_SIZE, MAX_FRAME_SIZE, MAX_PAYLOAD_SIZE, MAX_SIGNATURE_SIZE,
};
use crate::{ProtocolError, Result};

/// A signed, optionally encrypted application message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Unique id of this logical message (UUID string).
    pub message_id: String,
    /// Whether `payload` is AES-CBC ciphertext.
    pub is_encrypted: bool,
    /// Whether each destination must return a signed acknowledgement.
    pub requires_ack: bool,
    /// DER ECDSA signature over `payload` as transmitted.
    pub signature: Vec<u8>,
    /// The sender's DER certificate.
    pub certificate: Vec<u8>,
    /// Ciphertext when `is_encrypted`, plaintext otherwise.
    pub payload: Vec<u8>,
}

impl Envelope {
    /// Serialize the envelope for embedding in a frame.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| ProtocolError::Serialization(e.to_string()))
    }

    /// Deserialize an envelope from frame content, enforcing field size
    /// limits.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        check_size(bytes.len(), MAX_FRAME_SIZE)?;
        let envelope: Self =
            bincode::deserialize(bytes).map_err(|e| ProtocolError::Serialization(e.to_string()))?;
        check_size(envelope.payload.len(), MAX_PAYLOAD_SIZE)?;
        check_size(envelope.certificate.len(), MAX_CERTIFICATE_SIZE)?;
        check_size(envelope.signature.len(), MAX_SIGNATURE_SIZE)?;
        Ok(envelope)
    }
}

/// Build a signed envelope for `payload`.
///
/// When `encrypt_for` names a peer key, the payload is encrypted with the
/// derived session key first and the signature is computed over the
/// ciphertext. A fresh UUID message id is generated.
///
/// # Errors
///
/// Propagates [`CryptoError`](smmp_crypto::CryptoError) from encryption or
/// signing; rejects payloads above [`MAX_PAYLOAD_SIZE`].
pub fn build_envelope(
    payload: &[u8],
    identity: &LocalIdentity,
    encrypt_for: Option<&PublicKey>,
    requires_ack: bool,
) -> Result<Envelope> {
    check_size(payload.len(), MAX_PAYLOAD_SIZE)?;

    let (wire_payload, is_encrypted) = match encrypt_for {
        Some(peer_key) => (
            encrypt_message(peer_key, identity.private_key(), payload)?,
            true,
        ),
        None => (payload.to_vec(), false),
    };

    let signature = sign(identity.private_key(), &wire_payload)?;

    Ok(Envelope {
        message_id: Uuid::new_v4().to_string(),
        is_encrypted,
        requires_ack,
        signature,
        certificate: identity.certificate_der().to_vec(),
        payload: wire_payload,
    })
}

/// Validate a received envelope and recover its plaintext payload.
///
/// Steps, in order:
/// 1. the embedded certificate must chain to a trust anchor *and* belong to
///    the claimed sender ([`TrustStore::verify_sender`]);
/// 2. the signature must verify over the payload as transmitted;
/// 3. if the envelope is encrypted, the payload is decrypted against the
///    sender's key and the local private key.
pub fn open_envelope(
    envelope: &Envelope,
    sender: &str,
    trust_store: &TrustStore,
    identity: &LocalIdentity,
) -> Result<Vec<u8>> {
    let sender_key = verify_envelope(envelope, sender, trust_store)?;

    if envelope.is_encrypted {
        Ok(decrypt_message(
            &sender_key,
            identity.private_key(),
            &envelope.payload,
        )?)
    } else {
        Ok(envelope.payload.clone())
    }
}

/// Validate a subject-cast envelope.
///
/// Identical to [`open_envelope`] except that subject-cast never supports
/// encryption: an envelope with the encrypted flag set is rejected before
/// any certificate or signature work. With no decryption step there is
/// nothing to unlock, so no local identity is needed; an anonymous
/// listener holding only a trust store can verify subject-cast traffic.
pub fn open_subject_envelope(
    envelope: &Envelope,
    sender: &str,
    trust_store: &TrustStore,
) -> Result<Vec<u8>> {
    if envelope.is_encrypted {
        return Err(ProtocolError::EncryptedSubjectCast);
    }
    verify_envelope(envelope, sender, trust_store)?;
    Ok(envelope.payload.clone())
}

/// Trust and signature checks shared by the open functions. Returns the
/// sender's resolved key for the decryption step.
fn verify_envelope(
    envelope: &Envelope,
    sender: &str,
    trust_store: &TrustStore,
) -> Result<PublicKey> {
    if !trust_store.verify_sender(&envelope.certificate, sender)? {
        return Err(ProtocolError::UntrustedSender(sender.to_owned()));
    }

    let sender_key = trust_store.resolve_public_key(sender)?;
    if !verify(&sender_key, &envelope.payload, &envelope.signature) {
        return Err(ProtocolError::InvalidSignature);
    }
    Ok(sender_key)
}
