//! Client-level error types.

use thiserror::Error;

use crate::transport::TransportError;

/// Errors surfaced by the client layer.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Envelope or frame handling failed.
    #[error(transparent)]
    Protocol(#[from] smmp_protocol::ProtocolError),

    /// Certificate or key material could not be resolved.
    #[error(transparent)]
    Pki(#[from] smmp_pki::PkiError),

    /// The underlying MMTP transport refused or failed a send.
    #[error("transport: {0}")]
    Transport(#[from] TransportError),

    /// A multi-destination send was attempted with no destinations.
    #[error("no destinations given")]
    NoDestinations,

    /// A delivery handle was dropped by the tracker before resolving.
    ///
    /// This happens when the owning connection is shut down while a
    /// delivery is still in flight.
    #[error("delivery tracking ended before an outcome was reached")]
    TrackingAborted,
}

/// Convenience result alias for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
