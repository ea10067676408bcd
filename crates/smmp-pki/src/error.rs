//! Error types for identity and trust operations.

use thiserror::Error;

/// Errors that can occur during identity and trust operations.
#[derive(Error, Debug)]
pub enum PkiError {
    /// A certificate could not be parsed or is structurally unusable.
    #[error("Invalid certificate: {0}")]
    InvalidCertificate(String),

    /// A private key could not be parsed or does not match the certificate.
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// No certificate is known for the given MRN.
    #[error("Unknown peer: no certificate for {0}")]
    UnknownPeer(String),

    /// A certificate does not chain to a trust anchor.
    #[error("Untrusted certificate for {0}")]
    UntrustedCertificate(String),

    /// Reading or writing key material failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for identity and trust operations.
pub type Result<T> = std::result::Result<T, PkiError>;
