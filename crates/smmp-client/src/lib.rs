//! Client-side reliability and trust layer for SMMP.
//!
//! SMMP rides on MMTP edge routers, which forward frames best-effort and
//! know nothing about message identity or delivery guarantees. This
//! crate supplies both halves of what the routers leave out:
//!
//! - a trust layer: every outbound message is signed with the local MCP
//!   identity, optionally encrypted for its single recipient, and every
//!   inbound message is verified against a certificate trust store
//!   before the application sees it;
//! - a reliability layer: acknowledged sends are retransmitted on an
//!   exponential backoff schedule until every destination returns a
//!   signed ack or the schedule expires, with duplicate deliveries
//!   suppressed on the receiving side.
//!
//! [`SmmpConnection`] is the entry point for identified agents;
//! [`AnonymousConnection`] is the subscribe-only session for listeners
//! without one. Both are generic over [`MmtpTransport`], the seam to an
//! actual router session.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod anonymous;
pub mod config;
pub mod connection;
pub mod dispatch;
pub mod error;
pub mod observer;
pub mod registry;
pub mod subscriptions;
pub mod transport;

mod tracker;

pub use anonymous::{AnonymousConnection, SubjectHandler};
pub use config::{ClientConfig, RetryPolicy};
pub use connection::SmmpConnection;
pub use dispatch::SmmpHandler;
pub use error::{ClientError, Result};
pub use observer::{DeliveryHandle, DeliveryObserver, DeliveryOutcome};
pub use registry::ConnectionRegistry;
pub use subscriptions::SubscriptionSet;
pub use transport::{MmtpTransport, TransportError};

pub use smmp_pki::{LocalIdentity, TrustStore};
