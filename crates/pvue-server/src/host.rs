//! Desktop-window host interface.
//!
//! The window (browser engine, native shell) is an external collaborator.
//! The server only needs three things from it: give it the handler table,
//! point it at a URL, and close it.

use std::sync::Arc;

use parking_lot::Mutex;
use pvue_rpc::HandlerRegistry;
use tracing::info;

/// Failure reported by a window host.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// The host could not open or navigate a window.
    #[error("window host failed: {0}")]
    Failed(String),
    /// The operation needs a window that has not been opened.
    #[error("no window is open")]
    NotOpen,
}

/// Interface to whatever renders the frontend.
#[cfg_attr(test, mockall::automock)]
pub trait WindowHost: Send + Sync {
    /// Hand the registry to the host. Called before the server starts.
    fn expose(&self, registry: Arc<HandlerRegistry>);

    /// Open or navigate the window to `url`.
    fn load_url(&self, url: &str) -> Result<(), HostError>;

    /// Close the window.
    fn close(&self) -> Result<(), HostError>;
}

/// Host without a window: logs the URL for the user to open manually.
#[derive(Debug, Default)]
pub struct LogOnlyHost {
    url: Mutex<Option<String>>,
    handler_count: Mutex<usize>,
}

impl LogOnlyHost {
    /// A host with nothing loaded.
    pub fn new() -> Self {
        Self::default()
    }

    /// URL passed to the last `load_url`, until `close`.
    pub fn current_url(&self) -> Option<String> {
        self.url.lock().clone()
    }

    /// Handlers visible at `expose` time.
    pub fn handler_count(&self) -> usize {
        *self.handler_count.lock()
    }
}

impl WindowHost for LogOnlyHost {
    fn expose(&self, registry: Arc<HandlerRegistry>) {
        let names = registry.handler_names();
        info!(handlers = ?names, "handlers exposed to frontend");
        *self.handler_count.lock() = names.len();
    }

    fn load_url(&self, url: &str) -> Result<(), HostError> {
        if url.is_empty() {
            return Err(HostError::Failed("empty url".into()));
        }
        info!(url, "open the frontend in a browser");
        *self.url.lock() = Some(url.to_owned());
        Ok(())
    }

    fn close(&self) -> Result<(), HostError> {
        self.url.lock().take().map(|_| ()).ok_or(HostError::NotOpen)
    }
}

/// Expose `registry` to `host` and load `url`.
pub fn open_frontend(
    host: &dyn WindowHost,
    registry: &Arc<HandlerRegistry>,
    url: &str,
) -> Result<(), HostError> {
    host.expose(registry.clone());
    host.load_url(url)
}

#[cfg(test)]
mod tests {
    use mockall::predicate::eq;

    use super::*;

    #[test]
    fn log_only_host_tracks_url() {
        let host = LogOnlyHost::new();
        let registry = Arc::new(HandlerRegistry::with_builtins());
        open_frontend(&host, &registry, "http://localhost:3000").unwrap();
        assert_eq!(host.handler_count(), 3);
        assert_eq!(host.current_url().as_deref(), Some("http://localhost:3000"));
        host.close().unwrap();
        assert!(matches!(host.close(), Err(HostError::NotOpen)));
    }

    #[test]
    fn empty_url_rejected() {
        let host = LogOnlyHost::new();
        assert!(host.load_url("").is_err());
        assert!(host.current_url().is_none());
    }

    #[test]
    fn open_frontend_exposes_before_loading() {
        let mut seq = mockall::Sequence::new();
        let mut host = MockWindowHost::new();
        host.expect_expose()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|registry| assert!(registry.has_handler("uppercase")));
        host.expect_load_url()
            .with(eq("http://localhost:3000/"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));

        let registry = Arc::new(HandlerRegistry::with_builtins());
        open_frontend(&host, &registry, "http://localhost:3000/").unwrap();
    }

    #[test]
    fn load_failure_propagates() {
        let mut host = MockWindowHost::new();
        host.expect_expose().returning(|_| ());
        host.expect_load_url()
            .returning(|_| Err(HostError::Failed("no display".into())));

        let registry = Arc::new(HandlerRegistry::new());
        let err = open_frontend(&host, &registry, "http://x").unwrap_err();
        assert_eq!(err.to_string(), "window host failed: no display");
    }
}
