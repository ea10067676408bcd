//! Error types for cryptographic operations.

use thiserror::Error;

/// Errors that can occur during cryptographic operations.
#[derive(Error, Debug)]
pub enum CryptoError {
    /// Signature generation failed.
    #[error("Signature generation failed: {0}")]
    Signing(String),

    /// Key derivation failed.
    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),

    /// Decryption failed (wrong key material or corrupted ciphertext).
    #[error("Decryption failed: invalid ciphertext or key")]
    Decryption,
}

/// Result type for cryptographic operations.
pub type Result<T> = std::result::Result<T, CryptoError>;
