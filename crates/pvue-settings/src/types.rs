//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase", default)]` so a settings
//! file may be partial; missing fields keep their compiled default.

use serde::{Deserialize, Serialize};

/// Root settings type.
///
/// ```json
/// {
///   "server": { "wsPort": 9000, "errorFormat": "tagged" },
///   "logging": { "level": "debug" }
/// }
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PvueSettings {
    /// Dispatch server network settings.
    pub server: ServerSettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
    /// Example application settings.
    pub apps: AppSettings,
}

/// Shape of error responses on the wire.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorFormat {
    /// `{"result": "错误：..."}` only.
    #[default]
    Legacy,
    /// Legacy shape plus a machine-readable `error` object.
    Tagged,
}

/// Dispatch server settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// WebSocket port.
    pub ws_port: u16,
    /// Ping interval in seconds.
    pub heartbeat_interval_secs: u64,
    /// Close a peer that has been silent this long.
    pub heartbeat_timeout_secs: u64,
    /// Maximum WebSocket message size in bytes.
    pub max_message_size: usize,
    /// How long `stop` waits for connection tasks.
    pub shutdown_timeout_secs: u64,
    /// Error response shape.
    pub error_format: ErrorFormat,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            ws_port: 8765,
            heartbeat_interval_secs: 20,
            heartbeat_timeout_secs: 60,
            max_message_size: 16 * 1024 * 1024,
            shutdown_timeout_secs: 10,
            error_format: ErrorFormat::Legacy,
        }
    }
}

/// Log level.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace-level (most verbose).
    Trace,
    /// Debug-level.
    Debug,
    /// Info-level (default).
    #[default]
    Info,
    /// Warning-level.
    Warn,
    /// Error-level.
    Error,
}

impl LogLevel {
    /// Convert to a tracing filter string.
    pub fn as_filter_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Logging settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Minimum level written to stderr.
    pub level: LogLevel,
    /// Emit JSON lines instead of compact text.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            json: false,
        }
    }
}

/// Settings for the bundled example handler sets.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppSettings {
    /// File the notes handlers save to and load from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes_file: Option<String>,
}
