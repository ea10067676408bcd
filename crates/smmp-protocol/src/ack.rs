//! Signed acknowledgements.
//!
//! An ack carries no payload: the signature covers the raw bytes of the
//! acknowledged message id, which binds the ack to exactly one message and
//! one signer.

use serde::{Deserialize, Serialize};

use smmp_crypto::sign;
use smmp_pki::{LocalIdentity, TrustStore};

use crate::limits::{check_size, MAX_CERTIFICATE_SIZE, MAX_FRAME_SIZE, MAX_SIGNATURE_SIZE};
use crate::{ProtocolError, Result};

/// A signed acknowledgement of a single message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AckEnvelope {
    /// Id of the message being acknowledged.
    pub message_id: String,
    /// DER ECDSA signature over the UTF-8 bytes of `message_id`.
    pub signature: Vec<u8>,
    /// The acknowledger's DER certificate.
    pub certificate: Vec<u8>,
}

impl AckEnvelope {
    /// Serialize the ack for embedding in a frame.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| ProtocolError::Serialization(e.to_string()))
    }

    /// Deserialize an ack from frame content.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        check_size(bytes.len(), MAX_FRAME_SIZE)?;
        let ack: Self =
            bincode::deserialize(bytes).map_err(|e| ProtocolError::Serialization(e.to_string()))?;
        check_size(ack.certificate.len(), MAX_CERTIFICATE_SIZE)?;
        check_size(ack.signature.len(), MAX_SIGNATURE_SIZE)?;
        Ok(ack)
    }
}

/// Build a signed acknowledgement for `message_id`.
pub fn build_ack(message_id: &str, identity: &LocalIdentity) -> Result<AckEnvelope> {
    let signature = sign(identity.private_key(), message_id.as_bytes())?;
    Ok(AckEnvelope {
        message_id: message_id.to_owned(),
        signature,
        certificate: identity.certificate_der().to_vec(),
    })
}

/// Validate a received acknowledgement and return the acknowledged message
/// id.
///
/// The embedded certificate must belong to the claimed sender and the
/// signature must verify over the message id bytes.
pub fn open_ack(ack: &AckEnvelope, sender: &str, trust_store: &TrustStore) -> Result<String> {
    if !trust_store.verify_sender(&ack.certificate, sender)? {
        return Err(ProtocolError::UntrustedSender(sender.to_owned()));
    }

    let sender_key = trust_store.resolve_public_key(sender)?;
    if !smmp_crypto::verify(&sender_key, ack.message_id.as_bytes(), &ack.signature) {
        return Err(ProtocolError::InvalidSignature);
    }

    Ok(ack.message_id.clone())
}
