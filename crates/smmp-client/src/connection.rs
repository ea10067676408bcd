//! The authenticated SMMP connection.
//!
//! One `SmmpConnection` binds a local identity, a trust store and an
//! MMTP transport into the full client surface: signed (and optionally
//! encrypted) direct sends, subject-cast publishing, acknowledgement
//! tracking with retransmission, and the inbound verification path.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info};

use smmp_pki::{LocalIdentity, TrustStore};
use smmp_protocol::{build_envelope, Frame, FrameKind};

use crate::config::ClientConfig;
use crate::dispatch::{DeliveryDispatcher, SmmpHandler};
use crate::error::{ClientError, Result};
use crate::observer::{handle_pair, DeliveryHandle, DeliveryObserver};
use crate::subscriptions::SubscriptionSet;
use crate::tracker::{AckTracker, Destinations};
use crate::transport::MmtpTransport;

/// An authenticated client session.
///
/// Encryption is available for single-destination sends only: the
/// session key is derived pairwise from the recipient's certificate, so
/// multi-destination and subject-cast messages go out signed plaintext.
pub struct SmmpConnection {
    identity: Arc<LocalIdentity>,
    trust: Arc<TrustStore>,
    transport: Arc<dyn MmtpTransport>,
    tracker: Arc<AckTracker>,
    dispatcher: DeliveryDispatcher,
    subscriptions: SubscriptionSet,
    default_ttl: Duration,
}

impl SmmpConnection {
    /// Build a connection over an established transport.
    pub fn new(
        identity: LocalIdentity,
        trust: TrustStore,
        transport: Arc<dyn MmtpTransport>,
        handler: Arc<dyn SmmpHandler>,
        config: ClientConfig,
    ) -> Arc<Self> {
        let identity = Arc::new(identity);
        let trust = Arc::new(trust);
        let tracker = Arc::new(AckTracker::new(
            Arc::clone(&transport),
            config.retry.clone(),
        ));
        let dispatcher = DeliveryDispatcher::new(
            Arc::clone(&identity),
            Arc::clone(&trust),
            Arc::clone(&transport),
            Arc::clone(&tracker),
            handler,
            config.dedup_capacity,
        );
        info!(mrn = identity.mrn(), "smmp connection established");
        Arc::new(Self {
            identity,
            trust,
            transport,
            tracker,
            dispatcher,
            subscriptions: SubscriptionSet::new(),
            default_ttl: config.default_ttl,
        })
    }

    /// The MRN this connection authenticates as.
    pub fn mrn(&self) -> &str {
        self.identity.mrn()
    }

    /// The trust store backing inbound verification.
    pub fn trust_store(&self) -> &TrustStore {
        &self.trust
    }

    /// Send a signed message to one destination without tracking.
    ///
    /// With `encrypt` set, the payload is encrypted for the destination's
    /// certificate before signing.
    pub async fn send(&self, destination: &str, payload: &[u8], encrypt: bool) -> Result<String> {
        let (message_id, frame) = self.direct_frame(destination, payload, encrypt, false)?;
        self.transport
            .send_direct(&[destination.to_owned()], frame)
            .await?;
        debug!(message_id, destination, "sent");
        Ok(message_id)
    }

    /// Send a signed message to one destination, retransmitting until the
    /// destination acks, the delivery's time-to-live passes, or the
    /// backoff schedule runs out.
    ///
    /// `ttl` falls back to the configured default when `None`. A
    /// transport failure on the initial send is returned as an error and
    /// nothing is tracked.
    pub async fn send_tracked(
        &self,
        destination: &str,
        payload: &[u8],
        encrypt: bool,
        ttl: Option<Duration>,
        observer: Arc<dyn DeliveryObserver>,
    ) -> Result<String> {
        let (message_id, frame) = self.direct_frame(destination, payload, encrypt, true)?;
        self.transport
            .send_direct(&[destination.to_owned()], frame.clone())
            .await?;
        self.tracker.track(
            &message_id,
            frame,
            Destinations::Single(destination.to_owned()),
            self.deadline(ttl),
            observer,
        );
        debug!(message_id, destination, "sent with ack tracking");
        Ok(message_id)
    }

    /// Like [`send_tracked`](Self::send_tracked), resolving through an
    /// awaitable handle instead of an observer.
    pub async fn send_with_handle(
        &self,
        destination: &str,
        payload: &[u8],
        encrypt: bool,
        ttl: Option<Duration>,
    ) -> Result<(String, DeliveryHandle)> {
        let (observer, handle) = handle_pair();
        let message_id = self
            .send_tracked(destination, payload, encrypt, ttl, observer)
            .await?;
        Ok((message_id, handle))
    }

    /// Send a signed message to several destinations, tracking each ack
    /// independently. Completes when every destination has acked.
    pub async fn send_multi_tracked(
        &self,
        destinations: &[String],
        payload: &[u8],
        ttl: Option<Duration>,
        observer: Arc<dyn DeliveryObserver>,
    ) -> Result<String> {
        if destinations.is_empty() {
            return Err(ClientError::NoDestinations);
        }
        let envelope = build_envelope(payload, &self.identity, None, true)?;
        let message_id = envelope.message_id.clone();
        let frame = Frame::new(FrameKind::ApplicationMessage, envelope.to_bytes()?).to_bytes()?;

        self.transport.send_direct(destinations, frame.clone()).await?;
        self.tracker.track(
            &message_id,
            frame,
            Destinations::Multi {
                remaining: destinations.iter().cloned().collect(),
                acknowledged: Vec::new(),
            },
            self.deadline(ttl),
            observer,
        );
        debug!(message_id, count = destinations.len(), "sent to destination group");
        Ok(message_id)
    }

    /// Publish a signed message to a subject without tracking.
    pub async fn publish(&self, subject: &str, payload: &[u8]) -> Result<String> {
        let envelope = build_envelope(payload, &self.identity, None, false)?;
        let message_id = envelope.message_id.clone();
        let frame = Frame::new(FrameKind::ApplicationMessage, envelope.to_bytes()?).to_bytes()?;
        self.transport.publish(subject, frame).await?;
        debug!(message_id, subject, "published");
        Ok(message_id)
    }

    /// Publish a signed message to a subject with ack collection.
    ///
    /// The subscriber set is unknown, so the delivery never fully
    /// completes; the observer sees each ack as it arrives and, at
    /// schedule expiry, an outcome listing everyone who acked.
    pub async fn publish_tracked(
        &self,
        subject: &str,
        payload: &[u8],
        ttl: Option<Duration>,
        observer: Arc<dyn DeliveryObserver>,
    ) -> Result<String> {
        let envelope = build_envelope(payload, &self.identity, None, true)?;
        let message_id = envelope.message_id.clone();
        let frame = Frame::new(FrameKind::ApplicationMessage, envelope.to_bytes()?).to_bytes()?;

        self.transport.publish(subject, frame.clone()).await?;
        self.tracker.track(
            &message_id,
            frame,
            Destinations::Subject {
                subject: subject.to_owned(),
                acknowledged: Vec::new(),
            },
            self.deadline(ttl),
            observer,
        );
        debug!(message_id, subject, "published with ack collection");
        Ok(message_id)
    }

    /// Register for a subject. A no-op if already subscribed.
    pub async fn subscribe(&self, subject: &str) -> Result<()> {
        if !self.subscriptions.insert(subject) {
            return Ok(());
        }
        if let Err(e) = self.transport.register(subject).await {
            self.subscriptions.remove(subject);
            return Err(e.into());
        }
        info!(subject, "subscribed");
        Ok(())
    }

    /// Withdraw a subject registration. A no-op if not subscribed.
    pub async fn unsubscribe(&self, subject: &str) -> Result<()> {
        if !self.subscriptions.remove(subject) {
            return Ok(());
        }
        self.transport.unregister(subject).await?;
        info!(subject, "unsubscribed");
        Ok(())
    }

    /// The connection's current subject registrations.
    pub fn subscriptions(&self) -> &SubscriptionSet {
        &self.subscriptions
    }

    /// Feed a frame that arrived addressed to this client.
    ///
    /// `sender` is the source MRN as reported by the router.
    pub async fn handle_direct_frame(&self, sender: &str, bytes: &[u8]) -> Result<()> {
        self.dispatcher.handle_direct(sender, bytes).await
    }

    /// Feed a frame that arrived via a subject subscription.
    pub async fn handle_subject_frame(
        &self,
        subject: &str,
        sender: &str,
        bytes: &[u8],
    ) -> Result<()> {
        self.dispatcher.handle_subject(subject, sender, bytes).await
    }

    /// Number of tracked deliveries still awaiting resolution.
    pub fn pending_deliveries(&self) -> usize {
        self.tracker.pending()
    }

    /// Abort all pending deliveries and their retransmission tasks.
    ///
    /// Pending [`DeliveryHandle`]s resolve to an error; observers get no
    /// further callbacks.
    pub fn shutdown(&self) {
        info!(mrn = self.identity.mrn(), "smmp connection shut down");
        self.tracker.shutdown();
    }

    fn deadline(&self, ttl: Option<Duration>) -> Instant {
        Instant::now() + ttl.unwrap_or(self.default_ttl)
    }

    fn direct_frame(
        &self,
        destination: &str,
        payload: &[u8],
        encrypt: bool,
        requires_ack: bool,
    ) -> Result<(String, Vec<u8>)> {
        let peer_key = if encrypt {
            Some(self.trust.resolve_public_key(destination)?)
        } else {
            None
        };
        let envelope = build_envelope(payload, &self.identity, peer_key.as_ref(), requires_ack)?;
        let message_id = envelope.message_id.clone();
        let frame = Frame::new(FrameKind::ApplicationMessage, envelope.to_bytes()?).to_bytes()?;
        Ok((message_id, frame))
    }
}
