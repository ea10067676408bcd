//! # smmp-pki
//!
//! Identity and certificate trust for the SMMP client.
//!
//! This crate provides:
//! - **LocalIdentity**: the agent's own EC private key, public key, and
//!   X.509 certificate, loaded once at startup and immutable afterwards
//! - **TrustStore**: MRN → certificate keyring lookups, certificate chain
//!   validation against a trust-anchor set, and trust-on-first-verified-use
//!   persistence of newly trusted certificates
//!
//! An MRN (Maritime Resource Name) is a peer's globally unique identity
//! string, carried in the Common Name of its certificate.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod certificate;
pub mod error;
pub mod identity;
pub mod keyring;

#[cfg(feature = "test-support")]
pub mod test_support;

pub use error::{PkiError, Result};
pub use identity::LocalIdentity;
pub use keyring::TrustStore;
