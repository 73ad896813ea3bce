//! # pvue-server
//!
//! The dispatch server: an Axum `WebSocket` endpoint that reads one JSON
//! call per frame, runs it against a shared [`HandlerRegistry`], and writes
//! exactly one response back, in order.
//!
//! - Per-connection receive loop with heartbeat pings
//! - Connection set with explicit close on shutdown
//! - `start` / `stop` lifecycle guarded against double invocation
//! - `/health` and optional Prometheus `/metrics` routes
//!
//! [`HandlerRegistry`]: pvue_rpc::HandlerRegistry

#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod health;
pub mod host;
pub mod metrics;
pub mod server;
pub mod shutdown;
pub mod websocket;

pub use config::ServerConfig;
pub use error::ServerError;
pub use host::{HostError, LogOnlyHost, WindowHost};
pub use server::DispatchServer;
