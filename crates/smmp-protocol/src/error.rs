//! Error types for protocol operations.

use thiserror::Error;

/// Errors that can occur while building or opening wire structures.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Cryptographic operation failed.
    #[error("Crypto error: {0}")]
    Crypto(#[from] smmp_crypto::CryptoError),

    /// Trust or identity operation failed.
    #[error("PKI error: {0}")]
    Pki(#[from] smmp_pki::PkiError),

    /// The sender's certificate is untrusted or does not belong to the
    /// claimed sender.
    #[error("Untrusted sender: {0}")]
    UntrustedSender(String),

    /// The envelope signature does not verify over the transmitted payload.
    #[error("Invalid signature")]
    InvalidSignature,

    /// A subject-cast envelope claimed to be encrypted; subject-cast never
    /// supports encryption.
    #[error("Encrypted subject-cast message")]
    EncryptedSubjectCast,

    /// Input exceeds a wire size limit.
    #[error("Oversized input: {size} bytes exceeds maximum {max}")]
    Oversized {
        /// Actual size in bytes.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;
