//! Inbound frame handling.
//!
//! A frame from the router is classified, its envelope opened against the
//! trust store, acknowledged when the sender asked for it, and finally
//! deduplicated before reaching the application. Acks go out before the
//! duplicate check so a sender whose previous ack was lost still gets
//! one for the retransmission.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use smmp_pki::{LocalIdentity, TrustStore};
use smmp_protocol::{
    build_ack, open_ack, open_envelope, open_subject_envelope, AckEnvelope, Envelope, Frame,
    FrameKind,
};

use crate::error::Result;
use crate::tracker::AckTracker;
use crate::transport::MmtpTransport;

/// Application callbacks for delivered messages.
///
/// `on_subject_message` defaults to forwarding to `on_message`, for
/// handlers that do not care which path a message arrived on.
pub trait SmmpHandler: Send + Sync {
    /// A direct message was delivered and verified.
    fn on_message(&self, sender: &str, message_id: &str, payload: Vec<u8>);

    /// A subject-cast message was delivered and verified.
    fn on_subject_message(&self, subject: &str, sender: &str, message_id: &str, payload: Vec<u8>) {
        let _ = subject;
        self.on_message(sender, message_id, payload);
    }
}

/// Bounded first-in-first-out window of already-delivered message ids.
pub(crate) struct SeenIds {
    order: VecDeque<String>,
    set: HashSet<String>,
    capacity: usize,
}

impl SeenIds {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            order: VecDeque::with_capacity(capacity),
            set: HashSet::with_capacity(capacity),
            capacity,
        }
    }

    /// Record `id`; returns false when it was already present.
    pub(crate) fn insert(&mut self, id: &str) -> bool {
        if self.set.contains(id) {
            return false;
        }
        if self.capacity > 0 && self.order.len() == self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.set.remove(&evicted);
            }
        }
        self.order.push_back(id.to_owned());
        self.set.insert(id.to_owned());
        true
    }
}

pub(crate) struct DeliveryDispatcher {
    identity: Arc<LocalIdentity>,
    trust: Arc<TrustStore>,
    transport: Arc<dyn MmtpTransport>,
    tracker: Arc<AckTracker>,
    handler: Arc<dyn SmmpHandler>,
    seen: Mutex<SeenIds>,
}

impl DeliveryDispatcher {
    pub(crate) fn new(
        identity: Arc<LocalIdentity>,
        trust: Arc<TrustStore>,
        transport: Arc<dyn MmtpTransport>,
        tracker: Arc<AckTracker>,
        handler: Arc<dyn SmmpHandler>,
        dedup_capacity: usize,
    ) -> Self {
        Self {
            identity,
            trust,
            transport,
            tracker,
            handler,
            seen: Mutex::new(SeenIds::new(dedup_capacity)),
        }
    }

    /// Handle a frame addressed directly to us.
    ///
    /// A frame that fails validation is dropped with a warning here, on
    /// top of the error the caller gets; a hostile frame stays visible
    /// whatever the transport glue does with the result.
    pub(crate) async fn handle_direct(&self, sender: &str, bytes: &[u8]) -> Result<()> {
        let result = self.direct_inner(sender, bytes).await;
        if let Err(e) = &result {
            warn!(sender, error = %e, "inbound frame dropped");
        }
        result
    }

    async fn direct_inner(&self, sender: &str, bytes: &[u8]) -> Result<()> {
        let frame = Frame::from_bytes(bytes)?;
        match frame.kind {
            FrameKind::ApplicationMessage => {
                let envelope = Envelope::from_bytes(&frame.content)?;
                let payload = open_envelope(&envelope, sender, &self.trust, &self.identity)?;
                self.deliver(&envelope, sender, payload, None).await;
                Ok(())
            }
            FrameKind::Ack => {
                let ack = AckEnvelope::from_bytes(&frame.content)?;
                let message_id = open_ack(&ack, sender, &self.trust)?;
                self.tracker.acknowledge(&message_id, sender);
                Ok(())
            }
            other => {
                warn!(sender, kind = %other, "unexpected inbound frame kind");
                Ok(())
            }
        }
    }

    /// Handle a frame that arrived via a subject subscription.
    pub(crate) async fn handle_subject(
        &self,
        subject: &str,
        sender: &str,
        bytes: &[u8],
    ) -> Result<()> {
        let result = self.subject_inner(subject, sender, bytes).await;
        if let Err(e) = &result {
            warn!(subject, sender, error = %e, "inbound subject-cast frame dropped");
        }
        result
    }

    async fn subject_inner(&self, subject: &str, sender: &str, bytes: &[u8]) -> Result<()> {
        let frame = Frame::from_bytes(bytes)?;
        match frame.kind {
            FrameKind::ApplicationMessage => {
                let envelope = Envelope::from_bytes(&frame.content)?;
                let payload = open_subject_envelope(&envelope, sender, &self.trust)?;
                self.deliver(&envelope, sender, payload, Some(subject)).await;
                Ok(())
            }
            other => {
                warn!(subject, sender, kind = %other, "unexpected subject-cast frame kind");
                Ok(())
            }
        }
    }

    async fn deliver(
        &self,
        envelope: &Envelope,
        sender: &str,
        payload: Vec<u8>,
        subject: Option<&str>,
    ) {
        if envelope.requires_ack {
            self.send_ack(&envelope.message_id, sender).await;
        }

        let fresh = self
            .seen
            .lock()
            .expect("dedup window poisoned")
            .insert(&envelope.message_id);
        if !fresh {
            debug!(message_id = %envelope.message_id, sender, "duplicate delivery suppressed");
            return;
        }

        match subject {
            Some(subject) => {
                self.handler
                    .on_subject_message(subject, sender, &envelope.message_id, payload)
            }
            None => self.handler.on_message(sender, &envelope.message_id, payload),
        }
    }

    /// Sign and return an ack for `message_id` to `sender`. Failures are
    /// logged; the sender's retransmission schedule covers lost acks.
    async fn send_ack(&self, message_id: &str, sender: &str) {
        let frame = match build_ack(message_id, &self.identity)
            .and_then(|ack| ack.to_bytes())
            .map(|content| Frame::new(FrameKind::Ack, content))
            .and_then(|frame| frame.to_bytes())
        {
            Ok(frame) => frame,
            Err(e) => {
                warn!(message_id, error = %e, "failed to build ack");
                return;
            }
        };
        if let Err(e) = self
            .transport
            .send_direct(&[sender.to_owned()], frame)
            .await
        {
            warn!(message_id, sender, error = %e, "failed to send ack");
        }
    }
}
