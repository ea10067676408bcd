//! Acknowledgement tracking and retransmission.
//!
//! Every acknowledged send registers an entry here. A per-entry task
//! sleeps through the backoff schedule and retransmits the original frame
//! to whoever has not acknowledged yet; incoming acks retire destinations
//! and, once the last one arrives, the entry. The entry expires when its
//! deadline passes or the doubled delay would exceed the ceiling,
//! whichever comes first.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::RetryPolicy;
use crate::observer::{DeliveryObserver, DeliveryOutcome};
use crate::transport::MmtpTransport;

/// Where a tracked frame was sent and who still owes an ack.
#[derive(Debug, Clone)]
pub(crate) enum Destinations {
    /// One direct destination.
    Single(String),
    /// Several direct destinations, acked independently.
    Multi {
        remaining: HashSet<String>,
        acknowledged: Vec<String>,
    },
    /// A subject-cast. The subscriber set is unknown, so the entry only
    /// resolves at expiry, reporting whoever acked along the way.
    Subject {
        subject: String,
        acknowledged: Vec<String>,
    },
}

struct TrackedMessage {
    frame: Vec<u8>,
    destinations: Destinations,
    expires_at: Instant,
    observer: Arc<dyn DeliveryObserver>,
    retry_task: Option<JoinHandle<()>>,
}

/// What `acknowledge` decided while holding the table lock.
enum AckStep {
    Unknown,
    Duplicate,
    Partial(Arc<dyn DeliveryObserver>),
    Final,
}

pub(crate) struct AckTracker {
    transport: Arc<dyn MmtpTransport>,
    policy: RetryPolicy,
    table: Arc<Mutex<HashMap<String, TrackedMessage>>>,
}

impl AckTracker {
    pub(crate) fn new(transport: Arc<dyn MmtpTransport>, policy: RetryPolicy) -> Self {
        Self {
            transport,
            policy,
            table: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Start tracking a frame that was already handed to the transport.
    pub(crate) fn track(
        &self,
        message_id: &str,
        frame: Vec<u8>,
        destinations: Destinations,
        expires_at: Instant,
        observer: Arc<dyn DeliveryObserver>,
    ) {
        {
            let mut table = self.table.lock().expect("ack table poisoned");
            table.insert(
                message_id.to_owned(),
                TrackedMessage {
                    frame,
                    destinations,
                    expires_at,
                    observer,
                    retry_task: None,
                },
            );
        }

        let task = tokio::spawn(retry_loop(
            Arc::clone(&self.table),
            Arc::clone(&self.transport),
            self.policy.clone(),
            message_id.to_owned(),
        ));

        let mut table = self.table.lock().expect("ack table poisoned");
        match table.get_mut(message_id) {
            Some(entry) => entry.retry_task = Some(task),
            // Entry already retired between insert and spawn.
            None => task.abort(),
        }
    }

    /// Record a verified ack from `acker`.
    ///
    /// Acks for unknown or already-completed messages, and repeat acks
    /// from the same destination, are no-ops.
    pub(crate) fn acknowledge(&self, message_id: &str, acker: &str) {
        let (step, removed) = {
            let mut table = self.table.lock().expect("ack table poisoned");
            let step = match table.get_mut(message_id) {
                None => AckStep::Unknown,
                Some(entry) => match &mut entry.destinations {
                    Destinations::Single(dest) => {
                        if dest == acker {
                            AckStep::Final
                        } else {
                            AckStep::Unknown
                        }
                    }
                    Destinations::Multi {
                        remaining,
                        acknowledged,
                    } => {
                        if remaining.remove(acker) {
                            acknowledged.push(acker.to_owned());
                            if remaining.is_empty() {
                                AckStep::Final
                            } else {
                                AckStep::Partial(Arc::clone(&entry.observer))
                            }
                        } else {
                            AckStep::Duplicate
                        }
                    }
                    Destinations::Subject { acknowledged, .. } => {
                        if acknowledged.iter().any(|a| a == acker) {
                            AckStep::Duplicate
                        } else {
                            acknowledged.push(acker.to_owned());
                            AckStep::Partial(Arc::clone(&entry.observer))
                        }
                    }
                },
            };
            let removed = if matches!(step, AckStep::Final) {
                table.remove(message_id)
            } else {
                None
            };
            (step, removed)
        };

        match step {
            AckStep::Unknown => {
                debug!(message_id, acker, "ack for unknown message or destination");
            }
            AckStep::Duplicate => {
                debug!(message_id, acker, "duplicate ack ignored");
            }
            AckStep::Partial(observer) => {
                debug!(message_id, acker, "destination acknowledged");
                observer.on_ack(message_id, acker);
            }
            AckStep::Final => {
                let Some(entry) = removed else { return };
                if let Some(task) = entry.retry_task {
                    task.abort();
                }
                let acknowledged = match entry.destinations {
                    Destinations::Single(dest) => vec![dest],
                    Destinations::Multi { acknowledged, .. } => acknowledged,
                    // Subject entries never take the final path.
                    Destinations::Subject { acknowledged, .. } => acknowledged,
                };
                debug!(message_id, "delivery fully acknowledged");
                entry.observer.on_ack(message_id, acker);
                entry
                    .observer
                    .on_complete(message_id, DeliveryOutcome::AllAcked { acknowledged });
            }
        }
    }

    /// Number of deliveries still awaiting resolution.
    pub(crate) fn pending(&self) -> usize {
        self.table.lock().expect("ack table poisoned").len()
    }

    /// Drop all pending entries and stop their retransmission tasks.
    ///
    /// Observers are not notified; handles resolve to an abort error.
    pub(crate) fn shutdown(&self) {
        let mut table = self.table.lock().expect("ack table poisoned");
        for (message_id, entry) in table.drain() {
            debug!(message_id, "delivery tracking aborted by shutdown");
            if let Some(task) = entry.retry_task {
                task.abort();
            }
        }
    }
}

/// What one retry tick decided to retransmit.
enum Resend {
    Direct(Vec<String>, Vec<u8>),
    Publish(String, Vec<u8>),
}

async fn retry_loop(
    table: Arc<Mutex<HashMap<String, TrackedMessage>>>,
    transport: Arc<dyn MmtpTransport>,
    policy: RetryPolicy,
    message_id: String,
) {
    let mut delay = policy.initial_delay;
    loop {
        tokio::time::sleep(delay).await;

        let resend = {
            let table = table.lock().expect("ack table poisoned");
            let Some(entry) = table.get(&message_id) else {
                // Retired while we slept.
                return;
            };
            if Instant::now() >= entry.expires_at {
                break;
            }
            match &entry.destinations {
                Destinations::Single(dest) => {
                    Resend::Direct(vec![dest.clone()], entry.frame.clone())
                }
                Destinations::Multi { remaining, .. } => {
                    Resend::Direct(remaining.iter().cloned().collect(), entry.frame.clone())
                }
                Destinations::Subject { subject, .. } => {
                    Resend::Publish(subject.clone(), entry.frame.clone())
                }
            }
        };

        // A failed retransmission is logged and absorbed; the schedule
        // keeps running and the next tick tries again.
        let sent = match resend {
            Resend::Direct(destinations, frame) => {
                debug!(message_id, count = destinations.len(), "retransmitting");
                transport.send_direct(&destinations, frame).await
            }
            Resend::Publish(subject, frame) => {
                debug!(message_id, subject, "retransmitting subject-cast");
                transport.publish(&subject, frame).await
            }
        };
        if let Err(e) = sent {
            warn!(message_id, error = %e, "retransmission failed");
        }

        delay = policy.next_delay(delay);
        if delay > policy.max_delay {
            break;
        }
    }

    let entry = table
        .lock()
        .expect("ack table poisoned")
        .remove(&message_id);
    let Some(entry) = entry else { return };

    let (acknowledged, unacknowledged) = match entry.destinations {
        Destinations::Single(dest) => (Vec::new(), vec![dest]),
        Destinations::Multi {
            remaining,
            acknowledged,
        } => {
            let mut unacked: Vec<String> = remaining.into_iter().collect();
            unacked.sort();
            (acknowledged, unacked)
        }
        Destinations::Subject { acknowledged, .. } => (acknowledged, Vec::new()),
    };
    debug!(message_id, "delivery expired");
    entry.observer.on_complete(
        &message_id,
        DeliveryOutcome::Expired {
            acknowledged,
            unacknowledged,
        },
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::transport::TransportError;

    struct CountingTransport {
        sends: AtomicUsize,
        publishes: AtomicUsize,
    }

    impl CountingTransport {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                sends: AtomicUsize::new(0),
                publishes: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl MmtpTransport for CountingTransport {
        async fn send_direct(
            &self,
            _destinations: &[String],
            _frame: Vec<u8>,
        ) -> std::result::Result<(), TransportError> {
            self.sends.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn publish(
            &self,
            _subject: &str,
            _frame: Vec<u8>,
        ) -> std::result::Result<(), TransportError> {
            self.publishes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn register(&self, _subject: &str) -> std::result::Result<(), TransportError> {
            Ok(())
        }

        async fn unregister(&self, _subject: &str) -> std::result::Result<(), TransportError> {
            Ok(())
        }
    }

    struct RecordingObserver {
        acks: Mutex<Vec<String>>,
        outcome: Mutex<Option<DeliveryOutcome>>,
    }

    impl RecordingObserver {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                acks: Mutex::new(Vec::new()),
                outcome: Mutex::new(None),
            })
        }

        fn outcome(&self) -> Option<DeliveryOutcome> {
            self.outcome.lock().unwrap().clone()
        }
    }

    impl DeliveryObserver for RecordingObserver {
        fn on_ack(&self, _message_id: &str, acker: &str) {
            self.acks.lock().unwrap().push(acker.to_owned());
        }

        fn on_complete(&self, _message_id: &str, outcome: DeliveryOutcome) {
            *self.outcome.lock().unwrap() = Some(outcome);
        }
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            initial_delay: Duration::from_millis(20),
            max_delay: Duration::from_millis(160),
            multiplier: 2,
        }
    }

    fn far_deadline() -> Instant {
        Instant::now() + Duration::from_secs(60)
    }

    #[tokio::test]
    async fn single_destination_completes_on_ack() {
        let transport = CountingTransport::new();
        let tracker = AckTracker::new(transport.clone(), fast_policy());
        let observer = RecordingObserver::new();

        tracker.track(
            "m1",
            vec![1, 2, 3],
            Destinations::Single("dest-a".to_owned()),
            far_deadline(),
            observer.clone(),
        );
        tracker.acknowledge("m1", "dest-a");

        assert_eq!(tracker.pending(), 0);
        assert_eq!(
            observer.outcome(),
            Some(DeliveryOutcome::AllAcked {
                acknowledged: vec!["dest-a".to_owned()],
            })
        );
    }

    #[tokio::test]
    async fn ack_from_wrong_destination_is_ignored() {
        let transport = CountingTransport::new();
        let tracker = AckTracker::new(transport, fast_policy());
        let observer = RecordingObserver::new();

        tracker.track(
            "m1",
            vec![0],
            Destinations::Single("dest-a".to_owned()),
            far_deadline(),
            observer.clone(),
        );
        tracker.acknowledge("m1", "dest-b");
        tracker.acknowledge("unknown", "dest-a");

        assert_eq!(tracker.pending(), 1);
        assert!(observer.outcome().is_none());
        tracker.shutdown();
    }

    #[tokio::test]
    async fn multi_destination_completes_in_any_order() {
        let transport = CountingTransport::new();
        let tracker = AckTracker::new(transport, fast_policy());
        let observer = RecordingObserver::new();

        let remaining: HashSet<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
        tracker.track(
            "m1",
            vec![0],
            Destinations::Multi {
                remaining,
                acknowledged: Vec::new(),
            },
            far_deadline(),
            observer.clone(),
        );

        tracker.acknowledge("m1", "c");
        tracker.acknowledge("m1", "c");
        tracker.acknowledge("m1", "a");
        assert!(observer.outcome().is_none());
        tracker.acknowledge("m1", "b");

        match observer.outcome() {
            Some(DeliveryOutcome::AllAcked { acknowledged }) => {
                assert_eq!(acknowledged, vec!["c", "a", "b"]);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(observer.acks.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn unacked_delivery_retransmits_then_expires() {
        let transport = CountingTransport::new();
        let tracker = AckTracker::new(transport.clone(), fast_policy());
        let observer = RecordingObserver::new();

        tracker.track(
            "m1",
            vec![0],
            Destinations::Single("dest-a".to_owned()),
            far_deadline(),
            observer.clone(),
        );

        // Schedule: 20, 40, 80, 160 ms, then expiry after the 160 ms tick.
        tokio::time::sleep(Duration::from_millis(500)).await;

        assert_eq!(transport.sends.load(Ordering::SeqCst), 4);
        assert_eq!(tracker.pending(), 0);
        match observer.outcome() {
            Some(DeliveryOutcome::Expired {
                acknowledged,
                unacknowledged,
            }) => {
                assert!(acknowledged.is_empty());
                assert_eq!(unacknowledged, vec!["dest-a".to_owned()]);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[tokio::test]
    async fn subject_cast_only_resolves_at_expiry() {
        let transport = CountingTransport::new();
        let tracker = AckTracker::new(transport.clone(), fast_policy());
        let observer = RecordingObserver::new();

        tracker.track(
            "m1",
            vec![0],
            Destinations::Subject {
                subject: "weather".to_owned(),
                acknowledged: Vec::new(),
            },
            far_deadline(),
            observer.clone(),
        );
        tracker.acknowledge("m1", "listener-1");
        tracker.acknowledge("m1", "listener-2");
        tracker.acknowledge("m1", "listener-1");
        assert!(observer.outcome().is_none());

        tokio::time::sleep(Duration::from_millis(500)).await;

        assert!(transport.publishes.load(Ordering::SeqCst) >= 1);
        match observer.outcome() {
            Some(DeliveryOutcome::Expired {
                acknowledged,
                unacknowledged,
            }) => {
                assert_eq!(acknowledged, vec!["listener-1", "listener-2"]);
                assert!(unacknowledged.is_empty());
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[tokio::test]
    async fn deadline_cuts_the_schedule_short() {
        let transport = CountingTransport::new();
        let tracker = AckTracker::new(transport.clone(), fast_policy());
        let observer = RecordingObserver::new();

        // Expires between the first and second retry check: one resend at
        // 20 ms, then the 40 ms tick sees the deadline and stops.
        tracker.track(
            "m1",
            vec![0],
            Destinations::Single("dest-a".to_owned()),
            Instant::now() + Duration::from_millis(50),
            observer.clone(),
        );

        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(transport.sends.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.pending(), 0);
        assert!(matches!(
            observer.outcome(),
            Some(DeliveryOutcome::Expired { .. })
        ));
    }

    #[tokio::test]
    async fn default_ttl_ratio_allows_every_scheduled_resend() {
        let transport = CountingTransport::new();
        // The production defaults scaled to milliseconds, deadline
        // included: the last resend lands at 1270 ms, inside the
        // 1320 ms time-to-live.
        let policy = RetryPolicy {
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(1200),
            multiplier: 2,
        };
        let span = policy.schedule_span();
        let ttl = crate::config::DEFAULT_TTL / 500;
        assert!(ttl > span);
        let tracker = AckTracker::new(transport.clone(), policy);
        let observer = RecordingObserver::new();

        tracker.track(
            "m1",
            vec![0],
            Destinations::Single("dest-a".to_owned()),
            Instant::now() + ttl,
            observer.clone(),
        );

        tokio::time::sleep(span + Duration::from_millis(300)).await;

        assert_eq!(transport.sends.load(Ordering::SeqCst), 7);
        assert_eq!(tracker.pending(), 0);
        assert!(matches!(
            observer.outcome(),
            Some(DeliveryOutcome::Expired { .. })
        ));
    }

    #[tokio::test]
    async fn shutdown_stops_retransmission() {
        let transport = CountingTransport::new();
        let tracker = AckTracker::new(transport.clone(), fast_policy());
        let observer = RecordingObserver::new();

        tracker.track(
            "m1",
            vec![0],
            Destinations::Single("dest-a".to_owned()),
            far_deadline(),
            observer.clone(),
        );
        tracker.shutdown();

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(transport.sends.load(Ordering::SeqCst), 0);
        assert!(observer.outcome().is_none());
    }
}
