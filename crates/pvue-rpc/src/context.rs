//! Per-call context handed to every handler.

use std::net::SocketAddr;

use pvue_core::ConnectionId;

/// Identifies the connection a call arrived on.
#[derive(Clone, Debug)]
pub struct CallContext {
    /// Connection the request was read from.
    pub connection_id: ConnectionId,
    /// Remote peer address, when known.
    pub peer: Option<SocketAddr>,
}

impl CallContext {
    /// Context for a call on `connection_id` from `peer`.
    pub fn new(connection_id: ConnectionId, peer: Option<SocketAddr>) -> Self {
        Self {
            connection_id,
            peer,
        }
    }

    /// Context not bound to any network peer (tests, in-process calls).
    pub fn detached() -> Self {
        Self::new(ConnectionId::new(), None)
    }
}
