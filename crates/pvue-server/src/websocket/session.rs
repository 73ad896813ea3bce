//! WebSocket session lifecycle: handles a single connected client from
//! upgrade through disconnect.

use std::sync::Arc;

use axum::extract::ws::{CloseFrame, Message, WebSocket, close_code};
use futures::{SinkExt, StreamExt};
use metrics::{counter, gauge, histogram};
use pvue_rpc::HandlerRegistry;
use tracing::{debug, info, instrument, warn};

use super::connection::ClientConnection;
use super::connections::ConnectionSet;
use super::handler::{handle_message, non_utf8_response};
use crate::config::ServerConfig;
use crate::metrics::{
    WS_CONNECTION_DURATION_SECONDS, WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL,
    WS_DISCONNECTIONS_TOTAL,
};

/// Why a session ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EndReason {
    /// The peer sent a Close frame.
    PeerClosed,
    /// The stream ended without a Close frame.
    PeerGone,
    /// Reading or writing the socket failed.
    TransportError,
    /// The peer stayed silent past the heartbeat timeout.
    HeartbeatTimeout,
    /// The server closed the connection.
    Shutdown,
}

/// Run a WebSocket session for a connected client.
///
/// 1. Registers the connection in `connections`
/// 2. Dispatches each text (or UTF-8 binary) frame and sends the response
///    before reading the next frame
/// 3. Sends periodic Ping frames and drops peers silent past the timeout
/// 4. On close request, sends a Close frame (`1001`) and stops
/// 5. Removes the connection exactly once
#[instrument(skip_all, fields(connection_id = %connection.id))]
pub async fn run_ws_session(
    ws: WebSocket,
    connection: Arc<ClientConnection>,
    registry: Arc<HandlerRegistry>,
    connections: Arc<ConnectionSet>,
    config: Arc<ServerConfig>,
) -> EndReason {
    let (mut ws_tx, mut ws_rx) = ws.split();

    info!(peer = ?connection.remote_addr, "client connected");
    counter!(WS_CONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);
    connections.add(connection.clone()).await;

    let ctx = connection.call_context();
    let heartbeat_timeout = config.heartbeat_timeout();
    let mut ping_interval = tokio::time::interval(config.heartbeat_interval());
    // Skip the immediate first tick
    let _ = ping_interval.tick().await;

    let reason = loop {
        tokio::select! {
            biased;

            () = connection.closing() => {
                let frame = CloseFrame {
                    code: close_code::AWAY,
                    reason: "server shutting down".into(),
                };
                if let Err(e) = ws_tx.send(Message::Close(Some(frame))).await {
                    warn!(error = %e, "failed to send close frame");
                }
                break EndReason::Shutdown;
            }

            frame = ws_rx.next() => {
                let msg = match frame {
                    Some(Ok(msg)) => msg,
                    Some(Err(e)) => {
                        warn!(error = %e, "websocket receive failed");
                        break EndReason::TransportError;
                    }
                    None => break EndReason::PeerGone,
                };
                connection.mark_alive();

                let result = match msg {
                    Message::Text(text) => {
                        handle_message(text.as_str(), &registry, &ctx, config.error_format).await
                    }
                    Message::Binary(data) => match std::str::from_utf8(&data) {
                        Ok(text) => handle_message(text, &registry, &ctx, config.error_format).await,
                        Err(_) => {
                            info!(len = data.len(), "received non-UTF8 binary frame");
                            non_utf8_response(config.error_format)
                        }
                    },
                    Message::Close(frame) => {
                        debug!(?frame, "client sent close frame");
                        break EndReason::PeerClosed;
                    }
                    Message::Ping(_) | Message::Pong(_) => continue,
                };

                if let Err(e) = ws_tx.send(Message::Text(result.response_json.into())).await {
                    warn!(error = %e, "failed to send response");
                    break EndReason::TransportError;
                }
            }

            _ = ping_interval.tick() => {
                if connection.last_seen_elapsed() > heartbeat_timeout {
                    warn!("client unresponsive for {heartbeat_timeout:?}, disconnecting");
                    break EndReason::HeartbeatTimeout;
                }
                if let Err(e) = ws_tx.send(Message::Ping(Vec::new().into())).await {
                    warn!(error = %e, "failed to send ping");
                    break EndReason::TransportError;
                }
            }
        }
    };

    if connections.remove(&connection.id).await {
        counter!(WS_DISCONNECTIONS_TOTAL).increment(1);
        gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
        histogram!(WS_CONNECTION_DURATION_SECONDS).record(connection.age().as_secs_f64());
    }
    info!(?reason, "client disconnected");
    reason
}
