//! The seam between the client layer and an MMTP edge-router session.
//!
//! The client never talks to the network directly. Everything it sends
//! goes through [`MmtpTransport`], which an integration implements over
//! its actual router connection. Tests substitute a recording mock.

use async_trait::async_trait;
use thiserror::Error;

/// Errors an MMTP transport can report.
#[derive(Debug, Error)]
pub enum TransportError {
    /// No session with an edge router is currently established.
    #[error("not connected to an edge router")]
    NotConnected,

    /// The router rejected or failed to forward the frame.
    #[error("send failed: {0}")]
    Send(String),
}

/// An established MMTP session with an edge router.
///
/// Implementations forward opaque frame bytes; they do not interpret
/// them. All methods take `&self` so a transport can be shared behind an
/// `Arc` between the send path and the retransmission tasks.
#[async_trait]
pub trait MmtpTransport: Send + Sync {
    /// Forward a frame to each named MRN.
    async fn send_direct(
        &self,
        destinations: &[String],
        frame: Vec<u8>,
    ) -> std::result::Result<(), TransportError>;

    /// Forward a frame to every subscriber of `subject`.
    async fn publish(
        &self,
        subject: &str,
        frame: Vec<u8>,
    ) -> std::result::Result<(), TransportError>;

    /// Register interest in a subject with the router.
    async fn register(&self, subject: &str) -> std::result::Result<(), TransportError>;

    /// Withdraw interest in a subject.
    async fn unregister(&self, subject: &str) -> std::result::Result<(), TransportError>;
}
