//! The agent's own identity: private key, public key, and certificate.

use std::path::Path;

use p384::pkcs8::DecodePrivateKey;
use p384::{PublicKey, SecretKey};

use crate::certificate;
use crate::{PkiError, Result};

/// The local agent's key material, immutable once loaded.
///
/// The certificate is kept in DER encoding because that is what travels in
/// every envelope this agent signs.
#[derive(Clone)]
pub struct LocalIdentity {
    private_key: SecretKey,
    public_key: PublicKey,
    certificate: Vec<u8>,
    mrn: String,
}

impl LocalIdentity {
    /// Build an identity from a private key and a DER certificate.
    ///
    /// # Errors
    ///
    /// Returns [`PkiError::InvalidKey`] if the certificate's public key does
    /// not belong to `private_key`, or [`PkiError::InvalidCertificate`] if
    /// the certificate cannot be parsed or carries no MRN.
    pub fn new(private_key: SecretKey, certificate: Vec<u8>) -> Result<Self> {
        let cert_key = certificate::extract_public_key(&certificate)?;
        let public_key = private_key.public_key();
        if cert_key != public_key {
            return Err(PkiError::InvalidKey(
                "certificate public key does not match private key".into(),
            ));
        }
        let mrn = certificate::extract_mrn(&certificate)?;
        Ok(Self {
            private_key,
            public_key,
            certificate,
            mrn,
        })
    }

    /// Load an identity from a PKCS#8 private key file and a certificate
    /// file. Both files may be DER or PEM encoded.
    pub fn load(key_path: impl AsRef<Path>, cert_path: impl AsRef<Path>) -> Result<Self> {
        let key_bytes = std::fs::read(key_path)?;
        let private_key = if looks_like_pem(&key_bytes) {
            let pem = String::from_utf8(key_bytes)
                .map_err(|_| PkiError::InvalidKey("key PEM is not valid UTF-8".into()))?;
            SecretKey::from_pkcs8_pem(&pem).map_err(|e| PkiError::InvalidKey(e.to_string()))?
        } else {
            SecretKey::from_pkcs8_der(&key_bytes).map_err(|e| PkiError::InvalidKey(e.to_string()))?
        };

        let certificate = read_certificate_der(cert_path.as_ref())?;
        Self::new(private_key, certificate)
    }

    /// The private key, for signing and key agreement.
    pub fn private_key(&self) -> &SecretKey {
        &self.private_key
    }

    /// The public key matching [`Self::private_key`].
    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// The DER-encoded certificate embedded in outgoing envelopes.
    pub fn certificate_der(&self) -> &[u8] {
        &self.certificate
    }

    /// The MRN this identity's certificate was issued to.
    pub fn mrn(&self) -> &str {
        &self.mrn
    }
}

impl std::fmt::Debug for LocalIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalIdentity")
            .field("mrn", &self.mrn)
            .finish_non_exhaustive()
    }
}

fn looks_like_pem(bytes: &[u8]) -> bool {
    bytes.starts_with(b"-----")
}

/// Read a certificate file, converting PEM to DER when needed.
pub(crate) fn read_certificate_der(path: &Path) -> Result<Vec<u8>> {
    let bytes = std::fs::read(path)?;
    if looks_like_pem(&bytes) {
        let (_, pem) = x509_parser::pem::parse_x509_pem(&bytes)
            .map_err(|e| PkiError::InvalidCertificate(e.to_string()))?;
        Ok(pem.contents)
    } else {
        Ok(bytes)
    }
}
