//! Server configuration.

use std::time::Duration;

use pvue_rpc::ErrorFormat;
use pvue_settings::ServerSettings;
use serde::{Deserialize, Serialize};

/// Configuration for the dispatch server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port used by [`DispatchServer::start_default`](crate::DispatchServer::start_default).
    pub port: u16,
    /// Heartbeat interval in seconds.
    pub heartbeat_interval_secs: u64,
    /// Close a peer that has sent nothing for this many seconds.
    pub heartbeat_timeout_secs: u64,
    /// Max WebSocket message size in bytes.
    pub max_message_size: usize,
    /// Upper bound on how long `stop` waits for connection tasks.
    pub shutdown_timeout_secs: u64,
    /// Error response shape.
    pub error_format: ErrorFormat,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::from_settings(&ServerSettings::default())
    }
}

impl ServerConfig {
    /// Build from the loaded server settings.
    pub fn from_settings(settings: &ServerSettings) -> Self {
        Self {
            host: settings.host.clone(),
            port: settings.ws_port,
            heartbeat_interval_secs: settings.heartbeat_interval_secs,
            heartbeat_timeout_secs: settings.heartbeat_timeout_secs,
            max_message_size: settings.max_message_size,
            shutdown_timeout_secs: settings.shutdown_timeout_secs,
            error_format: settings.error_format,
        }
    }

    /// `host:port` for the listener.
    pub fn bind_addr(&self, port: u16) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{port}", self.host)
        } else {
            format!("{}:{port}", self.host)
        }
    }

    /// Ping interval (at least one second).
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs.max(1))
    }

    /// Silence threshold after which a peer is closed.
    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_secs(self.heartbeat_timeout_secs)
    }

    /// Shutdown drain timeout.
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_settings() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.host, "127.0.0.1");
        assert_eq!(cfg.port, 8765);
        assert_eq!(cfg.heartbeat_interval_secs, 20);
        assert_eq!(cfg.heartbeat_timeout_secs, 60);
        assert_eq!(cfg.max_message_size, 16 * 1024 * 1024);
        assert_eq!(cfg.shutdown_timeout_secs, 10);
        assert_eq!(cfg.error_format, ErrorFormat::Legacy);
    }

    #[test]
    fn from_custom_settings() {
        let settings = ServerSettings {
            host: "0.0.0.0".into(),
            ws_port: 9001,
            error_format: ErrorFormat::Tagged,
            ..ServerSettings::default()
        };
        let cfg = ServerConfig::from_settings(&settings);
        assert_eq!(cfg.host, "0.0.0.0");
        assert_eq!(cfg.port, 9001);
        assert_eq!(cfg.error_format, ErrorFormat::Tagged);
    }

    #[test]
    fn bind_addr_formats() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.bind_addr(0), "127.0.0.1:0");
        let v6 = ServerConfig {
            host: "::1".into(),
            ..ServerConfig::default()
        };
        assert_eq!(v6.bind_addr(8765), "[::1]:8765");
    }

    #[test]
    fn heartbeat_interval_never_zero() {
        let cfg = ServerConfig {
            heartbeat_interval_secs: 0,
            ..ServerConfig::default()
        };
        assert_eq!(cfg.heartbeat_interval(), Duration::from_secs(1));
    }

    #[test]
    fn serde_roundtrip() {
        let cfg = ServerConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let back: ServerConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.port, cfg.port);
        assert_eq!(back.error_format, cfg.error_format);
    }
}
