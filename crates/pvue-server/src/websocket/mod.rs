//! `WebSocket` transport: connection state, the connection set, and the
//! per-connection receive loop.

pub mod connection;
pub mod connections;
pub mod handler;
pub mod session;
