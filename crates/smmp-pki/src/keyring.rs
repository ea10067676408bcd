//! MRN keyring and certificate trust store.
//!
//! The trust store owns three sets of certificates:
//!
//! - **trust anchors**: the CA certificates everything must chain to,
//!   loaded once and never mutated;
//! - **keyring**: certificates of known peers keyed by MRN, used to resolve
//!   a peer's public key for encryption and signature checks;
//! - **learned**: certificates that have passed chain validation at least
//!   once. Trust-on-first-verified-use: a newly validated certificate is
//!   persisted to the learned directory and future lookups skip the chain
//!   walk. Nothing is ever evicted automatically.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use p384::PublicKey;
use tracing::{debug, warn};

use crate::certificate;
use crate::identity::read_certificate_der;
use crate::{PkiError, Result};

struct Anchor {
    subject_raw: Vec<u8>,
    public_key: PublicKey,
}

/// Certificate keyring and trust-anchor store.
pub struct TrustStore {
    anchors: Vec<Anchor>,
    keyring: RwLock<HashMap<String, Vec<u8>>>,
    learned: RwLock<HashMap<String, Vec<u8>>>,
    persist_dir: Option<PathBuf>,
}

impl TrustStore {
    /// Build a trust store from DER-encoded trust-anchor certificates.
    pub fn new(anchor_ders: impl IntoIterator<Item = Vec<u8>>) -> Result<Self> {
        let mut anchors = Vec::new();
        for der in anchor_ders {
            let cert = certificate::parse(&der)?;
            anchors.push(Anchor {
                subject_raw: cert.subject().as_raw().to_vec(),
                public_key: certificate::public_key_of(&cert)?,
            });
        }
        Ok(Self {
            anchors,
            keyring: RwLock::new(HashMap::new()),
            learned: RwLock::new(HashMap::new()),
            persist_dir: None,
        })
    }

    /// Load trust anchors and keyring certificates from directories of
    /// DER or PEM files. Keyring entries are keyed by the MRN in each
    /// certificate's subject.
    pub fn load(anchor_dir: impl AsRef<Path>, keyring_dir: impl AsRef<Path>) -> Result<Self> {
        let store = Self::new(read_cert_dir(anchor_dir.as_ref())?)?;
        for der in read_cert_dir(keyring_dir.as_ref())? {
            store.add_peer_certificate(der)?;
        }
        Ok(store)
    }

    /// Enable trust-on-first-use persistence in `dir`, loading any
    /// certificates learned by earlier runs.
    pub fn with_persistence(mut self, dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        {
            let mut learned = self.learned.write().expect("learned set poisoned");
            for der in read_cert_dir(&dir)? {
                let mrn = certificate::extract_mrn(&der)?;
                learned.insert(mrn, der);
            }
        }
        self.persist_dir = Some(dir);
        Ok(self)
    }

    /// Add a peer certificate to the keyring, keyed by its MRN.
    ///
    /// The certificate is not chain-validated here; validation happens on
    /// every [`Self::resolve_public_key`] for keyring entries.
    pub fn add_peer_certificate(&self, der: Vec<u8>) -> Result<String> {
        let mrn = certificate::extract_mrn(&der)?;
        self.keyring
            .write()
            .expect("keyring poisoned")
            .insert(mrn.clone(), der);
        Ok(mrn)
    }

    /// Resolve a peer's verified public key.
    ///
    /// Keyring certificates are chain-validated on every lookup; learned
    /// certificates were validated when first seen and are returned
    /// directly.
    ///
    /// # Errors
    ///
    /// [`PkiError::UnknownPeer`] when no certificate is known for `mrn`,
    /// [`PkiError::UntrustedCertificate`] when the keyring certificate does
    /// not chain to a trust anchor.
    pub fn resolve_public_key(&self, mrn: &str) -> Result<PublicKey> {
        if let Some(der) = self.keyring.read().expect("keyring poisoned").get(mrn) {
            let cert = certificate::parse(der)?;
            if !self.chains_to_anchor(&cert) {
                return Err(PkiError::UntrustedCertificate(mrn.to_owned()));
            }
            return certificate::public_key_of(&cert);
        }

        if let Some(der) = self.learned.read().expect("learned set poisoned").get(mrn) {
            return certificate::extract_public_key(der);
        }

        Err(PkiError::UnknownPeer(mrn.to_owned()))
    }

    /// Validate a certificate chain and learn the certificate on success.
    ///
    /// Returns `Ok(true)` when the certificate chains to a trust anchor; if
    /// it was not already in the learned set it is recorded (and persisted
    /// when a persistence directory is configured). Returns `Ok(false)` on
    /// chain-validation failure without mutating any state.
    pub fn verify_and_learn(&self, der: &[u8]) -> Result<bool> {
        let cert = certificate::parse(der)?;
        if !self.chains_to_anchor(&cert) {
            return Ok(false);
        }

        let mrn = certificate::mrn_of(&cert)?;
        let newly_learned = {
            let mut learned = self.learned.write().expect("learned set poisoned");
            if learned.contains_key(&mrn) {
                false
            } else {
                learned.insert(mrn.clone(), der.to_vec());
                true
            }
        };

        if newly_learned {
            debug!(%mrn, "learned newly trusted certificate");
            if let Some(dir) = &self.persist_dir {
                let path = dir.join(format!("{}.der", hex::encode(mrn.as_bytes())));
                if let Err(e) = std::fs::write(&path, der) {
                    warn!(%mrn, error = %e, "failed to persist learned certificate");
                }
            }
        }
        Ok(true)
    }

    /// Check that a presented certificate is trusted *and* belongs to the
    /// peer it claims to come from.
    ///
    /// A certificate that chains to an anchor but whose public key differs
    /// from the key resolved for `claimed_mrn` is an identity substitution
    /// and is rejected.
    pub fn verify_sender(&self, der: &[u8], claimed_mrn: &str) -> Result<bool> {
        if !self.verify_and_learn(der)? {
            return Ok(false);
        }
        let presented = certificate::extract_public_key(der)?;
        match self.resolve_public_key(claimed_mrn) {
            Ok(expected) => Ok(presented == expected),
            Err(PkiError::UnknownPeer(_)) | Err(PkiError::UntrustedCertificate(_)) => {
                warn!(mrn = claimed_mrn, "cannot resolve key for claimed sender");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// One-hop chain validation: the certificate must be inside its
    /// validity window and signed by an anchor whose subject matches the
    /// certificate's issuer.
    fn chains_to_anchor(&self, cert: &x509_parser::prelude::X509Certificate<'_>) -> bool {
        if !cert.validity().is_valid() {
            return false;
        }
        let issuer_raw = cert.issuer().as_raw();
        self.anchors
            .iter()
            .filter(|anchor| anchor.subject_raw == issuer_raw)
            .any(|anchor| certificate::verify_signed_by(cert, &anchor.public_key))
    }
}

impl std::fmt::Debug for TrustStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrustStore")
            .field("anchors", &self.anchors.len())
            .field(
                "keyring",
                &self.keyring.read().expect("keyring poisoned").len(),
            )
            .field(
                "learned",
                &self.learned.read().expect("learned set poisoned").len(),
            )
            .finish()
    }
}

fn read_cert_dir(dir: &Path) -> Result<Vec<Vec<u8>>> {
    let mut certs = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_cert = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| matches!(e, "der" | "pem" | "crt" | "cer"));
        if is_cert {
            certs.push(read_certificate_der(&path)?);
        }
    }
    Ok(certs)
}
