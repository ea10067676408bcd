//! Registry of live connections, keyed by local MRN.
//!
//! A process that authenticates as several identities at once (a fleet
//! gateway, for instance) parks its connections here so shutdown can be
//! driven from one place.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::connection::SmmpConnection;

/// Holds one connection per local MRN.
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: Mutex<HashMap<String, Arc<SmmpConnection>>>,
}

impl ConnectionRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection under its own MRN, replacing and shutting down
    /// any previous connection for that identity.
    pub fn insert(&self, connection: Arc<SmmpConnection>) {
        let mrn = connection.mrn().to_owned();
        let previous = self
            .connections
            .lock()
            .expect("registry poisoned")
            .insert(mrn.clone(), connection);
        if let Some(previous) = previous {
            debug!(mrn, "replacing existing connection");
            previous.shutdown();
        }
    }

    /// Look up the connection for `mrn`.
    pub fn get(&self, mrn: &str) -> Option<Arc<SmmpConnection>> {
        self.connections
            .lock()
            .expect("registry poisoned")
            .get(mrn)
            .cloned()
    }

    /// Remove and shut down the connection for `mrn`.
    pub fn shutdown(&self, mrn: &str) -> bool {
        let removed = self
            .connections
            .lock()
            .expect("registry poisoned")
            .remove(mrn);
        match removed {
            Some(connection) => {
                connection.shutdown();
                true
            }
            None => false,
        }
    }

    /// Shut down every registered connection.
    pub fn shutdown_all(&self) {
        let connections: Vec<_> = {
            let mut map = self.connections.lock().expect("registry poisoned");
            map.drain().map(|(_, c)| c).collect()
        };
        for connection in connections {
            connection.shutdown();
        }
    }

    /// MRNs with a live connection, sorted.
    pub fn identities(&self) -> Vec<String> {
        let mut mrns: Vec<String> = self
            .connections
            .lock()
            .expect("registry poisoned")
            .keys()
            .cloned()
            .collect();
        mrns.sort();
        mrns
    }
}
