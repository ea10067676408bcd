//! The anonymous subject listener.
//!
//! A subscribe-only session for agents that hold no maritime identity:
//! subject-cast traffic is chain-validated and signature-checked against
//! a trust store, but nothing can be signed, so the listener never sends
//! messages or acknowledgements.

use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use smmp_pki::TrustStore;
use smmp_protocol::{open_subject_envelope, Envelope, Frame, FrameKind};

use crate::config::ClientConfig;
use crate::dispatch::SeenIds;
use crate::error::Result;
use crate::subscriptions::SubscriptionSet;
use crate::transport::MmtpTransport;

/// Application callback for verified subject-cast deliveries.
///
/// The receive-only counterpart of [`SmmpHandler`](crate::SmmpHandler),
/// for listeners that never see direct traffic.
pub trait SubjectHandler: Send + Sync {
    /// A subject-cast message was delivered and verified.
    fn on_subject_message(&self, subject: &str, sender: &str, message_id: &str, payload: Vec<u8>);
}

/// A subscribe-only client session without a local identity.
///
/// Verifies inbound subject-casts against the trust store alone. Senders
/// that request an acknowledgement never get one from here; their
/// retransmission schedule runs to expiry as with any silent subscriber.
pub struct AnonymousConnection {
    trust: Arc<TrustStore>,
    transport: Arc<dyn MmtpTransport>,
    handler: Arc<dyn SubjectHandler>,
    subscriptions: SubscriptionSet,
    seen: Mutex<SeenIds>,
}

impl AnonymousConnection {
    /// Build an anonymous listener over an established transport.
    ///
    /// Of the configuration only the duplicate suppression window
    /// applies; there are no tracked sends to retry or expire.
    pub fn new(
        trust: TrustStore,
        transport: Arc<dyn MmtpTransport>,
        handler: Arc<dyn SubjectHandler>,
        config: ClientConfig,
    ) -> Arc<Self> {
        info!("anonymous smmp listener established");
        Arc::new(Self {
            trust: Arc::new(trust),
            transport,
            handler,
            subscriptions: SubscriptionSet::new(),
            seen: Mutex::new(SeenIds::new(config.dedup_capacity)),
        })
    }

    /// The trust store backing inbound verification.
    pub fn trust_store(&self) -> &TrustStore {
        &self.trust
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

    /// The listener's current subject registrations.
    pub fn subscriptions(&self) -> &SubscriptionSet {
        &self.subscriptions
    }

    /// Feed a frame that arrived via a subject subscription.
    ///
    /// Frames that fail validation are dropped with a warning on top of
    /// the error the caller gets.
    pub async fn handle_subject_frame(
        &self,
        subject: &str,
        sender: &str,
        bytes: &[u8],
    ) -> Result<()> {
        let result = self.dispatch(subject, sender, bytes);
        if let Err(e) = &result {
            warn!(subject, sender, error = %e, "inbound subject-cast frame dropped");
        }
        result
    }

    fn dispatch(&self, subject: &str, sender: &str, bytes: &[u8]) -> Result<()> {
        let frame = Frame::from_bytes(bytes)?;
        match frame.kind {
            FrameKind::ApplicationMessage => {
                let envelope = Envelope::from_bytes(&frame.content)?;
                let payload = open_subject_envelope(&envelope, sender, &self.trust)?;
                if envelope.requires_ack {
                    debug!(
                        message_id = %envelope.message_id,
                        sender,
                        "cannot acknowledge without an identity"
                    );
                }
                let fresh = self
                    .seen
                    .lock()
                    .expect("dedup window poisoned")
                    .insert(&envelope.message_id);
                if !fresh {
                    debug!(message_id = %envelope.message_id, sender, "duplicate delivery suppressed");
                    return Ok(());
                }
                self.handler
                    .on_subject_message(subject, sender, &envelope.message_id, payload);
                Ok(())
            }
            other => {
                warn!(subject, sender, kind = %other, "unexpected subject-cast frame kind");
                Ok(())
            }
        }
    }
}
