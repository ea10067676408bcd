//! Delivery progress notification.

use std::sync::{Arc, Mutex};

use tokio::sync::oneshot;

use crate::error::{ClientError, Result};

/// How a tracked delivery ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Every destination returned a signed acknowledgement.
    AllAcked {
        /// The destinations that acknowledged, in arrival order.
        acknowledged: Vec<String>,
    },
    /// The retransmission schedule ran out before all acks arrived.
    ///
    /// Subject-cast deliveries always end here: the set of subscribers is
    /// unknown, so they can never be declared fully acknowledged.
    Expired {
        /// Destinations that acknowledged before expiry.
        acknowledged: Vec<String>,
        /// Destinations that never acknowledged. Empty for subject-cast.
        unacknowledged: Vec<String>,
    },
}

/// Callbacks for the lifecycle of one tracked delivery.
///
/// `on_ack` fires once per newly acknowledging destination; the default
/// does nothing. `on_complete` fires exactly once.
pub trait DeliveryObserver: Send + Sync {
    /// A destination acknowledged the message.
    fn on_ack(&self, message_id: &str, acker: &str) {
        let _ = (message_id, acker);
    }

    /// The delivery resolved, either fully acknowledged or expired.
    fn on_complete(&self, message_id: &str, outcome: DeliveryOutcome);
}

/// A future-style view of one delivery's outcome.
///
/// Obtained from the `*_with_handle` send methods; `wait` resolves when
/// the delivery completes or expires.
#[derive(Debug)]
pub struct DeliveryHandle {
    rx: oneshot::Receiver<DeliveryOutcome>,
}

impl DeliveryHandle {
    /// Wait for the delivery to resolve.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::TrackingAborted`] if the connection shut
    /// down while the delivery was still pending.
    pub async fn wait(self) -> Result<DeliveryOutcome> {
        self.rx.await.map_err(|_| ClientError::TrackingAborted)
    }
}

/// Observer that resolves a [`DeliveryHandle`].
struct HandleObserver {
    tx: Mutex<Option<oneshot::Sender<DeliveryOutcome>>>,
}

impl DeliveryObserver for HandleObserver {
    fn on_complete(&self, _message_id: &str, outcome: DeliveryOutcome) {
        if let Some(tx) = self.tx.lock().expect("handle sender poisoned").take() {
            let _ = tx.send(outcome);
        }
    }
}

/// Build an observer wired to a fresh handle.
pub(crate) fn handle_pair() -> (Arc<dyn DeliveryObserver>, DeliveryHandle) {
    let (tx, rx) = oneshot::channel();
    let observer = Arc::new(HandleObserver {
        tx: Mutex::new(Some(tx)),
    });
    (observer, DeliveryHandle { rx })
}
