//! `DispatchServer`: Axum WebSocket server around a [`HandlerRegistry`].

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{ConnectInfo, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use metrics_exporter_prometheus::PrometheusHandle;
use pvue_core::ConnectionId;
use pvue_rpc::{Handler, HandlerError, HandlerRegistry, Params, Registration};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::health::{self, HealthResponse};
use crate::shutdown::{Lifecycle, Phase};
use crate::websocket::connection::ClientConnection;
use crate::websocket::connections::ConnectionSet;
use crate::websocket::session::run_ws_session;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Handler registry shared with the owner of the server.
    pub registry: Arc<HandlerRegistry>,
    /// Open connections.
    pub connections: Arc<ConnectionSet>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// When the server was created.
    pub start_time: Instant,
    /// Prometheus handle for `/metrics`.
    pub metrics: Option<PrometheusHandle>,
    /// Parent of every connection token for the current run.
    pub shutdown: CancellationToken,
    /// Tracks connection tasks so `stop` can wait for them.
    pub tracker: TaskTracker,
}

/// The message dispatch server.
///
/// ```ignore
/// let server = Arc::new(DispatchServer::new(config, Arc::new(HandlerRegistry::with_builtins())));
/// let run = tokio::spawn({ let s = server.clone(); async move { s.start(8765).await } });
/// // ...
/// server.stop().await;
/// run.await??;
/// ```
pub struct DispatchServer {
    config: Arc<ServerConfig>,
    registry: Arc<HandlerRegistry>,
    connections: Arc<ConnectionSet>,
    lifecycle: Lifecycle,
    metrics: Option<PrometheusHandle>,
    start_time: Instant,
}

impl DispatchServer {
    /// Create a stopped server.
    pub fn new(config: ServerConfig, registry: Arc<HandlerRegistry>) -> Self {
        Self {
            config: Arc::new(config),
            registry,
            connections: Arc::new(ConnectionSet::new()),
            lifecycle: Lifecycle::new(),
            metrics: None,
            start_time: Instant::now(),
        }
    }

    /// Serve Prometheus text on `/metrics` from `handle`.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Register `handler` under `name`. Works before and after `start`.
    pub fn register(&self, name: &str, handler: impl Handler + 'static) -> Registration {
        self.registry.register(name, handler)
    }

    /// Register a synchronous closure under `name`.
    pub fn register_fn<F>(&self, name: &str, f: F) -> Registration
    where
        F: Fn(Params) -> Result<Value, HandlerError> + Send + Sync + 'static,
    {
        self.registry.register_fn(name, f)
    }

    /// Bind the configured host on `port` and serve until [`stop`](Self::stop).
    ///
    /// Port `0` picks a free port; read it back with
    /// [`wait_until_running`](Self::wait_until_running).
    pub async fn start(&self, port: u16) -> Result<(), ServerError> {
        let token = self.lifecycle.begin_start()?;
        let _stopped = self.lifecycle.stopped_on_drop();

        let addr = self.config.bind_addr(port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.clone(),
                source,
            })?;
        let local_addr = listener.local_addr()?;
        self.lifecycle.mark_running(local_addr);
        info!(addr = %local_addr, handlers = self.registry.len(), "dispatch server listening");

        let tracker = TaskTracker::new();
        let app = build_router(AppState {
            registry: self.registry.clone(),
            connections: self.connections.clone(),
            config: self.config.clone(),
            start_time: self.start_time,
            metrics: self.metrics.clone(),
            shutdown: token.clone(),
            tracker: tracker.clone(),
        });

        let signal = token.clone();
        let served = axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move { signal.cancelled().await })
        .await;

        // Listener is closed; now drain connections.
        token.cancel();
        let _ = self.connections.close_all().await;
        let _ = tracker.close();
        if tokio::time::timeout(self.config.shutdown_timeout(), tracker.wait())
            .await
            .is_err()
        {
            warn!(
                remaining = tracker.len(),
                "shutdown timed out after {:?}, some connections may still be open",
                self.config.shutdown_timeout()
            );
        }
        info!(addr = %local_addr, "dispatch server stopped");

        served.map_err(ServerError::Serve)
    }

    /// [`start`](Self::start) on the configured port.
    pub async fn start_default(&self) -> Result<(), ServerError> {
        self.start(self.config.port).await
    }

    /// Stop accepting, close every connection, and wait for `start` to
    /// return. No-op when the server is not running.
    pub async fn stop(&self) {
        if !self.lifecycle.request_stop() {
            info!("stop requested but server is not running");
            return;
        }
        info!("stopping dispatch server");
        self.lifecycle.wait_until_stopped().await;
    }

    /// Wait until the listener is bound and return its address.
    pub async fn wait_until_running(&self) -> SocketAddr {
        self.lifecycle.wait_until_running().await
    }

    /// Bound address while running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.lifecycle.local_addr()
    }

    /// Whether the listener is bound.
    pub fn is_running(&self) -> bool {
        matches!(self.lifecycle.phase(), Phase::Running(_))
    }

    /// Router over a fresh, detached shutdown token (for in-process tests).
    pub fn router(&self) -> Router {
        build_router(AppState {
            registry: self.registry.clone(),
            connections: self.connections.clone(),
            config: self.config.clone(),
            start_time: self.start_time,
            metrics: self.metrics.clone(),
            shutdown: CancellationToken::new(),
            tracker: TaskTracker::new(),
        })
    }

    /// Get the handler registry.
    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        &self.registry
    }

    /// Get the connection set.
    pub fn connections(&self) -> &Arc<ConnectionSet> {
        &self.connections
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// Build the Axum router: `/health`, `/metrics` when a handle is attached,
/// and the dispatch WebSocket on every other path.
pub fn build_router(state: AppState) -> Router {
    let mut router = Router::new().route("/health", get(health_handler));
    if state.metrics.is_some() {
        router = router.route("/metrics", get(metrics_handler));
    }
    router
        .fallback(ws_handler)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let connections = state.connections.connection_count().await;
    Json(health::health_check(
        state.start_time,
        connections,
        state.registry.len(),
    ))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => crate::metrics::render(handle).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Upgrade any other path to the dispatch WebSocket.
async fn ws_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> Response {
    let connection = Arc::new(ClientConnection::new(
        ConnectionId::new(),
        Some(peer),
        state.shutdown.child_token(),
    ));
    let AppState {
        registry,
        connections,
        config,
        tracker,
        ..
    } = state;
    ws.max_message_size(config.max_message_size)
        .on_failed_upgrade(|e| warn!(error = %e, "websocket upgrade failed"))
        .on_upgrade(move |socket| {
            tracker.track_future(async move {
                let _ = run_ws_session(socket, connection, registry, connections, config).await;
            })
        })
}
