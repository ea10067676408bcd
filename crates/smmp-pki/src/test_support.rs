//! Helpers for minting throwaway CAs and peer identities in tests.
//!
//! Only available with the `test-support` feature; dependent crates enable
//! it from their dev-dependencies.

use p384::pkcs8::DecodePrivateKey;
use p384::{PublicKey, SecretKey};
use rcgen::{BasicConstraints, CertificateParams, DnType, IsCa, KeyPair, PKCS_ECDSA_P384_SHA384};

use crate::certificate::extract_public_key;
use crate::identity::LocalIdentity;

/// A throwaway certificate authority for tests.
pub struct TestCa {
    cert: rcgen::Certificate,
    key: KeyPair,
}

impl TestCa {
    /// Mint a fresh self-signed CA.
    pub fn new() -> Self {
        let key = KeyPair::generate_for(&PKCS_ECDSA_P384_SHA384).expect("generate CA key");
        let mut params = CertificateParams::default();
        params
            .distinguished_name
            .push(DnType::CommonName, "urn:mrn:mcp:ca:test");
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        let cert = params.self_signed(&key).expect("self-sign CA certificate");
        Self { cert, key }
    }

    /// The CA certificate in DER encoding, for use as a trust anchor.
    pub fn certificate_der(&self) -> Vec<u8> {
        self.cert.der().to_vec()
    }

    /// The CA's public key.
    pub fn public_key(&self) -> PublicKey {
        extract_public_key(self.cert.der()).expect("CA certificate public key")
    }

    /// Issue a peer identity with the given MRN as its Common Name.
    pub fn issue(&self, mrn: &str) -> LocalIdentity {
        let key = KeyPair::generate_for(&PKCS_ECDSA_P384_SHA384).expect("generate peer key");
        let mut params = CertificateParams::default();
        params.distinguished_name.push(DnType::CommonName, mrn);
        let cert = params
            .signed_by(&key, &self.cert, &self.key)
            .expect("sign peer certificate");
        let secret =
            SecretKey::from_pkcs8_der(&key.serialize_der()).expect("convert peer private key");
        LocalIdentity::new(secret, cert.der().to_vec()).expect("build peer identity")
    }
}

impl Default for TestCa {
    fn default() -> Self {
        Self::new()
    }
}
