//! Server lifecycle state and shutdown signalling.
//!
//! The phase lives in a `tokio::sync::watch` channel so callers can await
//! transitions (`wait_until_running`, `wait_until_stopped`). Each run gets a
//! fresh [`CancellationToken`]; connection tokens are children of it.

use std::net::SocketAddr;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::ServerError;

/// Lifecycle phase of a [`DispatchServer`](crate::DispatchServer).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Not bound.
    Stopped,
    /// `start` accepted, listener not bound yet.
    Starting,
    /// Listening on the given address.
    Running(SocketAddr),
}

/// Guards `start`/`stop` and owns the shutdown token of the current run.
pub struct Lifecycle {
    phase: watch::Sender<Phase>,
    token: Mutex<Option<CancellationToken>>,
}

impl Lifecycle {
    /// A stopped lifecycle.
    pub fn new() -> Self {
        let (phase, _) = watch::channel(Phase::Stopped);
        Self {
            phase,
            token: Mutex::new(None),
        }
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        *self.phase.borrow()
    }

    /// Bound address while running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match self.phase() {
            Phase::Running(addr) => Some(addr),
            _ => None,
        }
    }

    /// Move `Stopped → Starting` and hand out the token for this run.
    ///
    /// The token slot stays locked across the transition, so a concurrent
    /// [`request_stop`](Self::request_stop) either sees no run or sees this
    /// run's token.
    pub fn begin_start(&self) -> Result<CancellationToken, ServerError> {
        let mut slot = self.token.lock();
        let accepted = self.phase.send_if_modified(|phase| {
            if *phase == Phase::Stopped {
                *phase = Phase::Starting;
                true
            } else {
                false
            }
        });
        if !accepted {
            return Err(ServerError::AlreadyRunning);
        }
        let token = CancellationToken::new();
        *slot = Some(token.clone());
        Ok(token)
    }

    /// Record the bound address.
    pub fn mark_running(&self, addr: SocketAddr) {
        let _ = self.phase.send_replace(Phase::Running(addr));
    }

    /// Return to `Stopped` and drop the run's token.
    pub fn mark_stopped(&self) {
        if let Some(token) = self.token.lock().take() {
            token.cancel();
        }
        let _ = self.phase.send_replace(Phase::Stopped);
    }

    /// Cancel the current run. Returns `false` when nothing is running.
    pub fn request_stop(&self) -> bool {
        match self.token.lock().as_ref() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Guard that resets the lifecycle to `Stopped` when dropped.
    pub fn stopped_on_drop(&self) -> StoppedOnDrop<'_> {
        StoppedOnDrop(self)
    }

    /// Wait until the server is listening and return its address.
    pub async fn wait_until_running(&self) -> SocketAddr {
        let mut rx = self.phase.subscribe();
        loop {
            if let Phase::Running(addr) = *rx.borrow_and_update() {
                return addr;
            }
            // The sender lives in `self`, so the channel cannot close here.
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }

    /// Wait until the lifecycle is back in `Stopped`.
    pub async fn wait_until_stopped(&self) {
        let mut rx = self.phase.subscribe();
        if rx.wait_for(|phase| *phase == Phase::Stopped).await.is_err() {
            debug!("lifecycle channel closed while waiting for stop");
        }
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

/// Resets a [`Lifecycle`] to `Stopped` on drop, including when the serving
/// future is cancelled.
pub struct StoppedOnDrop<'a>(&'a Lifecycle);

impl Drop for StoppedOnDrop<'_> {
    fn drop(&mut self) {
        self.0.mark_stopped();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn addr() -> SocketAddr {
        "127.0.0.1:4000".parse().unwrap()
    }

    #[test]
    fn initial_phase_is_stopped() {
        let lc = Lifecycle::new();
        assert_eq!(lc.phase(), Phase::Stopped);
        assert!(lc.local_addr().is_none());
        assert!(!lc.request_stop());
    }

    #[test]
    fn double_start_rejected() {
        let lc = Lifecycle::new();
        let _token = lc.begin_start().unwrap();
        assert!(matches!(lc.begin_start(), Err(ServerError::AlreadyRunning)));
        lc.mark_running(addr());
        assert!(matches!(lc.begin_start(), Err(ServerError::AlreadyRunning)));
    }

    #[test]
    fn request_stop_cancels_token() {
        let lc = Lifecycle::new();
        let token = lc.begin_start().unwrap();
        let child = token.child_token();
        assert!(lc.request_stop());
        assert!(token.is_cancelled());
        assert!(child.is_cancelled());
    }

    #[test]
    fn guard_resets_to_stopped() {
        let lc = Lifecycle::new();
        let token = lc.begin_start().unwrap();
        {
            let _guard = lc.stopped_on_drop();
            lc.mark_running(addr());
            assert_eq!(lc.local_addr(), Some(addr()));
        }
        assert_eq!(lc.phase(), Phase::Stopped);
        assert!(token.is_cancelled());
        // A new run can begin with a fresh token.
        let next = lc.begin_start().unwrap();
        assert!(!next.is_cancelled());
    }

    #[tokio::test]
    async fn wait_until_running_observes_transition() {
        let lc = std::sync::Arc::new(Lifecycle::new());
        let waiter = {
            let lc = lc.clone();
            tokio::spawn(async move { lc.wait_until_running().await })
        };
        let _token = lc.begin_start().unwrap();
        lc.mark_running(addr());
        let got = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(got, addr());
    }

    #[test]
    fn stop_after_start_always_finds_the_token() {
        let lc = std::sync::Arc::new(Lifecycle::new());
        for _ in 0..200 {
            let stopper = {
                let lc = lc.clone();
                std::thread::spawn(move || loop {
                    if lc.phase() != Phase::Stopped {
                        return lc.request_stop();
                    }
                    std::hint::spin_loop();
                })
            };
            let token = lc.begin_start().unwrap();
            assert!(stopper.join().unwrap());
            assert!(token.is_cancelled());
            lc.mark_stopped();
        }
    }

    #[tokio::test]
    async fn wait_until_stopped_returns_immediately_when_stopped() {
        let lc = Lifecycle::new();
        tokio::time::timeout(Duration::from_secs(1), lc.wait_until_stopped())
            .await
            .unwrap();
    }
}
