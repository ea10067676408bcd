//! Local view of which subjects the connection is registered for.

use std::collections::HashSet;
use std::sync::Mutex;

/// The set of subjects this connection has registered with its router.
///
/// Kept client-side so subscribe and unsubscribe can skip redundant
/// router round trips.
#[derive(Debug, Default)]
pub struct SubscriptionSet {
    inner: Mutex<HashSet<String>>,
}

impl SubscriptionSet {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Record a subscription; returns false if it was already present.
    pub(crate) fn insert(&self, subject: &str) -> bool {
        self.inner
            .lock()
            .expect("subscription set poisoned")
            .insert(subject.to_owned())
    }

    /// Drop a subscription; returns false if it was not present.
    pub(crate) fn remove(&self, subject: &str) -> bool {
        self.inner
            .lock()
            .expect("subscription set poisoned")
            .remove(subject)
    }

    /// Whether `subject` is currently subscribed.
    pub fn contains(&self, subject: &str) -> bool {
        self.inner
            .lock()
            .expect("subscription set poisoned")
            .contains(subject)
    }

    /// Snapshot of the current subjects, sorted.
    pub fn snapshot(&self) -> Vec<String> {
        let mut subjects: Vec<String> = self
            .inner
            .lock()
            .expect("subscription set poisoned")
            .iter()
            .cloned()
            .collect();
        subjects.sort();
        subjects
    }
}
