//! DER certificate helpers.
//!
//! Thin wrappers around `x509-parser` for the fields the trust layer needs:
//! the MRN carried in the subject Common Name, the subject public key, and
//! the signature check used for chain validation.

use p384::ecdsa::signature::hazmat::PrehashVerifier;
use p384::ecdsa::{Signature, VerifyingKey};
use p384::PublicKey;
use sha2::{Digest, Sha256, Sha384, Sha512};
use x509_parser::oid_registry::{
    OID_SIG_ECDSA_WITH_SHA256, OID_SIG_ECDSA_WITH_SHA384, OID_SIG_ECDSA_WITH_SHA512,
};
use x509_parser::prelude::*;

use crate::{PkiError, Result};

/// Parse a DER certificate, rejecting trailing bytes.
pub(crate) fn parse(der: &[u8]) -> Result<X509Certificate<'_>> {
    let (rem, cert) = X509Certificate::from_der(der)
        .map_err(|e| PkiError::InvalidCertificate(e.to_string()))?;
    if !rem.is_empty() {
        return Err(PkiError::InvalidCertificate(format!(
            "{} trailing bytes after certificate",
            rem.len()
        )));
    }
    Ok(cert)
}

/// Extract the MRN (subject Common Name) from a DER certificate.
pub fn extract_mrn(der: &[u8]) -> Result<String> {
    let cert = parse(der)?;
    mrn_of(&cert)
}

/// Extract the P-384 public key from a DER certificate.
pub fn extract_public_key(der: &[u8]) -> Result<PublicKey> {
    let cert = parse(der)?;
    public_key_of(&cert)
}

pub(crate) fn mrn_of(cert: &X509Certificate<'_>) -> Result<String> {
    cert.subject()
        .iter_common_name()
        .next()
        .and_then(|cn| cn.as_str().ok())
        .map(str::to_owned)
        .ok_or_else(|| PkiError::InvalidCertificate("no Common Name in subject".into()))
}

pub(crate) fn public_key_of(cert: &X509Certificate<'_>) -> Result<PublicKey> {
    let spki: &[u8] = &cert.public_key().subject_public_key.data;
    PublicKey::from_sec1_bytes(spki)
        .map_err(|e| PkiError::InvalidCertificate(format!("unsupported public key: {e}")))
}

/// Verify that `cert` was signed by the holder of `issuer_key`.
///
/// Supports the ECDSA-with-SHA-256/384/512 signature algorithms; anything
/// else fails closed.
pub(crate) fn verify_signed_by(cert: &X509Certificate<'_>, issuer_key: &PublicKey) -> bool {
    let oid = &cert.signature_algorithm.algorithm;
    let tbs = cert.tbs_certificate.as_ref();
    let digest: Vec<u8> = if *oid == OID_SIG_ECDSA_WITH_SHA256 {
        Sha256::digest(tbs).to_vec()
    } else if *oid == OID_SIG_ECDSA_WITH_SHA384 {
        Sha384::digest(tbs).to_vec()
    } else if *oid == OID_SIG_ECDSA_WITH_SHA512 {
        Sha512::digest(tbs).to_vec()
    } else {
        return false;
    };

    let sig_der: &[u8] = &cert.signature_value.data;
    let Ok(signature) = Signature::from_der(sig_der) else {
        return false;
    };
    VerifyingKey::from(issuer_key)
        .verify_prehash(&digest, &signature)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TestCa;

    #[test]
    fn extracts_mrn_and_public_key() {
        let ca = TestCa::new();
        let peer = ca.issue("urn:mrn:mcp:device:test:alpha");

        assert_eq!(
            extract_mrn(peer.certificate_der()).unwrap(),
            "urn:mrn:mcp:device:test:alpha"
        );
        assert_eq!(
            extract_public_key(peer.certificate_der()).unwrap(),
            *peer.public_key()
        );
    }

    #[test]
    fn rejects_garbage_der() {
        assert!(matches!(
            extract_mrn(b"definitely not DER"),
            Err(PkiError::InvalidCertificate(_))
        ));
    }

    #[test]
    fn signature_check_binds_issuer() {
        let ca = TestCa::new();
        let other_ca = TestCa::new();
        let peer = ca.issue("urn:mrn:mcp:device:test:alpha");

        let cert = parse(peer.certificate_der()).unwrap();
        assert!(verify_signed_by(&cert, &ca.public_key()));
        assert!(!verify_signed_by(&cert, &other_ca.public_key()));
    }
}
