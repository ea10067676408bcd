//! # smmp-protocol
//!
//! Wire formats for the SMMP client:
//!
//! - **Envelope**: the signed (optionally encrypted) application message
//! - **AckEnvelope**: the lighter signed acknowledgement
//! - **Frame**: the outer `{kind, content}` wrapper handed to the transport
//!
//! Envelopes are value objects, immutable after construction. The signature
//! always covers the payload exactly as it travels on the wire: encryption
//! happens before signing, and on receipt the signature is verified over the
//! transmitted bytes before any decryption is attempted.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod ack;
pub mod envelope;
pub mod error;
pub mod frame;
pub mod limits;

pub use ack::{build_ack, open_ack, AckEnvelope};
pub use envelope::{build_envelope, open_envelope, open_subject_envelope, Envelope};
pub use error::{ProtocolError, Result};
pub use frame::{Frame, FrameKind};
