//! Per-connection state.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use pvue_core::ConnectionId;
use pvue_rpc::CallContext;
use tokio_util::sync::CancellationToken;

/// One accepted WebSocket connection.
pub struct ClientConnection {
    /// Unique connection ID.
    pub id: ConnectionId,
    /// Remote peer address.
    pub remote_addr: Option<SocketAddr>,
    /// When this connection was established.
    pub connected_at: Instant,
    /// Cancelled when the connection must close.
    token: CancellationToken,
    /// When the peer last sent any frame.
    last_seen: Mutex<Instant>,
}

impl ClientConnection {
    /// Create a connection whose lifetime is bounded by `token`.
    pub fn new(id: ConnectionId, remote_addr: Option<SocketAddr>, token: CancellationToken) -> Self {
        let now = Instant::now();
        Self {
            id,
            remote_addr,
            connected_at: now,
            token,
            last_seen: Mutex::new(now),
        }
    }

    /// Ask the receive loop to close this connection.
    pub fn close(&self) {
        self.token.cancel();
    }

    /// Whether a close was requested.
    pub fn is_closing(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once a close is requested.
    pub async fn closing(&self) {
        self.token.cancelled().await;
    }

    /// Record inbound activity.
    pub fn mark_alive(&self) {
        *self.last_seen.lock() = Instant::now();
    }

    /// Time since the peer last sent anything.
    pub fn last_seen_elapsed(&self) -> Duration {
        self.last_seen.lock().elapsed()
    }

    /// Connection age.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }

    /// Context passed to handlers for calls on this connection.
    pub fn call_context(&self) -> CallContext {
        CallContext::new(self.id.clone(), self.remote_addr)
    }
}
