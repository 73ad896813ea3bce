//! The set of open connections.

use std::collections::HashMap;
use std::sync::Arc;

use pvue_core::ConnectionId;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::connection::ClientConnection;

/// Open connections indexed by ID.
pub struct ConnectionSet {
    connections: RwLock<HashMap<ConnectionId, Arc<ClientConnection>>>,
}

impl ConnectionSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Add a connection.
    pub async fn add(&self, connection: Arc<ClientConnection>) {
        let mut conns = self.connections.write().await;
        let _ = conns.insert(connection.id.clone(), connection);
    }

    /// Remove a connection by ID. Returns `false` if it was already gone.
    pub async fn remove(&self, connection_id: &ConnectionId) -> bool {
        let mut conns = self.connections.write().await;
        conns.remove(connection_id).is_some()
    }

    /// Number of open connections.
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Request every connection to close. Returns how many were signalled.
    ///
    /// Connections remove themselves once their receive loop ends.
    pub async fn close_all(&self) -> usize {
        let conns = self.connections.read().await;
        for conn in conns.values() {
            debug!(connection_id = %conn.id, "closing connection");
            conn.close();
        }
        if !conns.is_empty() {
            info!(count = conns.len(), "closing open connections");
        }
        conns.len()
    }
}

impl Default for ConnectionSet {
    fn default() -> Self {
        Self::new()
    }
}
