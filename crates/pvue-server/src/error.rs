//! Server lifecycle errors.

/// Errors returned by [`DispatchServer::start`](crate::DispatchServer::start).
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The listener could not be bound (port in use, permission denied).
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address that was requested.
        addr: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// `start` was called on a server that is already starting or running.
    #[error("server is already running")]
    AlreadyRunning,

    /// The accept loop failed after binding.
    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),
}
