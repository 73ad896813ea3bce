//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`PvueSettings::default()`]
//! 2. If the settings file exists, deep-merge its values over defaults
//! 3. Apply `PVUE_*` environment overrides (highest priority)
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::{Result, SettingsError};
use crate::types::{ErrorFormat, LogLevel, PvueSettings};

/// Resolve the path to the settings file (`~/.pvue/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".pvue").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<PvueSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults. Invalid JSON, or a file that sets
/// `server.wsPort` to `0`, is an error.
pub fn load_settings_from_path(path: &Path) -> Result<PvueSettings> {
    let mut settings = load_file_layer(path)?;
    apply_overrides(&mut settings, |key| std::env::var(key).ok());
    Ok(settings)
}

/// Defaults merged with the file at `path`, without env overrides.
fn load_file_layer(path: &Path) -> Result<PvueSettings> {
    let defaults = serde_json::to_value(PvueSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let settings: PvueSettings = serde_json::from_value(merged)?;
    if settings.server.ws_port == 0 {
        return Err(SettingsError::InvalidValue(
            "server.wsPort must be between 1 and 65535".to_string(),
        ));
    }
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply `PVUE_*` overrides read through `lookup`.
///
/// Invalid values are ignored with a warning, keeping the file/default value.
pub fn apply_overrides(settings: &mut PvueSettings, lookup: impl Fn(&str) -> Option<String>) {
    let read = |key: &str| lookup(key).filter(|v| !v.is_empty());

    if let Some(v) = read("PVUE_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = read("PVUE_WS_PORT") {
        match parse_u16_range(&v, 1, 65535) {
            Some(port) => settings.server.ws_port = port,
            None => warn!(key = "PVUE_WS_PORT", value = %v, "invalid port env var, ignoring"),
        }
    }
    if let Some(v) = read("PVUE_HEARTBEAT_INTERVAL_SECS") {
        match parse_u64_range(&v, 1, 3600) {
            Some(secs) => settings.server.heartbeat_interval_secs = secs,
            None => warn!(key = "PVUE_HEARTBEAT_INTERVAL_SECS", value = %v, "invalid u64 env var, ignoring"),
        }
    }
    if let Some(v) = read("PVUE_MAX_MESSAGE_SIZE") {
        match v.parse::<usize>().ok().filter(|n| *n >= 1024) {
            Some(size) => settings.server.max_message_size = size,
            None => warn!(key = "PVUE_MAX_MESSAGE_SIZE", value = %v, "invalid size env var, ignoring"),
        }
    }
    if let Some(v) = read("PVUE_ERROR_FORMAT") {
        match serde_json::from_value::<ErrorFormat>(Value::String(v.to_lowercase())) {
            Ok(format) => settings.server.error_format = format,
            Err(_) => warn!(key = "PVUE_ERROR_FORMAT", value = %v, "unknown error format, ignoring"),
        }
    }
    if let Some(v) = read("PVUE_LOG_LEVEL") {
        match serde_json::from_value::<LogLevel>(Value::String(v.to_lowercase())) {
            Ok(level) => settings.logging.level = level,
            Err(_) => warn!(key = "PVUE_LOG_LEVEL", value = %v, "unknown log level, ignoring"),
        }
    }
    if let Some(v) = read("PVUE_LOG_JSON") {
        match parse_bool(&v) {
            Some(json) => settings.logging.json = json,
            None => warn!(key = "PVUE_LOG_JSON", value = %v, "invalid boolean env var, ignoring"),
        }
    }
    if let Some(v) = read("PVUE_NOTES_FILE") {
        settings.apps.notes_file = Some(v);
    }
}

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a `u16` within a range.
pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    // ── deep_merge ──────────────────────────────────────────────────

    #[test]
    fn merge_nested_override() {
        let target = serde_json::json!({"server": {"wsPort": 8765, "host": "127.0.0.1"}});
        let source = serde_json::json!({"server": {"wsPort": 9000}});
        let merged = deep_merge(target, source);
        assert_eq!(merged["server"]["wsPort"], 9000);
        assert_eq!(merged["server"]["host"], "127.0.0.1");
    }

    #[test]
    fn merge_null_preserves_target() {
        let target = serde_json::json!({"a": 1, "b": 2});
        let source = serde_json::json!({"a": null});
        let merged = deep_merge(target, source);
        assert_eq!(merged["a"], 1);
        assert_eq!(merged["b"], 2);
    }

    #[test]
    fn merge_array_replace() {
        let target = serde_json::json!({"items": [1, 2, 3]});
        let source = serde_json::json!({"items": [4]});
        assert_eq!(deep_merge(target, source)["items"], serde_json::json!([4]));
    }

    // ── file layer ──────────────────────────────────────────────────

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = load_file_layer(&dir.path().join("absent.json")).unwrap();
        assert_eq!(settings.server.ws_port, 8765);
    }

    #[test]
    fn file_values_override_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"server": {{"wsPort": 9100, "errorFormat": "tagged"}}, "logging": {{"level": "debug"}}}}"#
        )
        .unwrap();
        let settings = load_file_layer(file.path()).unwrap();
        assert_eq!(settings.server.ws_port, 9100);
        assert_eq!(settings.server.error_format, ErrorFormat::Tagged);
        assert_eq!(settings.logging.level, LogLevel::Debug);
        assert_eq!(settings.server.host, "127.0.0.1");
    }

    #[test]
    fn invalid_json_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{not json").unwrap();
        let err = load_file_layer(file.path()).unwrap_err();
        assert!(matches!(err, SettingsError::Json(_)));
    }

    #[test]
    fn zero_port_in_file_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"server": {{"wsPort": 0}}}}"#).unwrap();
        let err = load_file_layer(file.path()).unwrap_err();
        assert!(matches!(err, SettingsError::InvalidValue(_)));
    }

    // ── overrides ───────────────────────────────────────────────────

    #[test]
    fn env_overrides_apply() {
        let mut settings = PvueSettings::default();
        apply_overrides(
            &mut settings,
            env(&[
                ("PVUE_HOST", "0.0.0.0"),
                ("PVUE_WS_PORT", "9200"),
                ("PVUE_ERROR_FORMAT", "TAGGED"),
                ("PVUE_LOG_LEVEL", "warn"),
                ("PVUE_LOG_JSON", "yes"),
                ("PVUE_NOTES_FILE", "/tmp/notes.json"),
            ]),
        );
        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.server.ws_port, 9200);
        assert_eq!(settings.server.error_format, ErrorFormat::Tagged);
        assert_eq!(settings.logging.level, LogLevel::Warn);
        assert!(settings.logging.json);
        assert_eq!(settings.apps.notes_file.as_deref(), Some("/tmp/notes.json"));
    }

    #[test]
    fn invalid_env_values_are_ignored() {
        let mut settings = PvueSettings::default();
        apply_overrides(
            &mut settings,
            env(&[
                ("PVUE_WS_PORT", "0"),
                ("PVUE_HEARTBEAT_INTERVAL_SECS", "never"),
                ("PVUE_MAX_MESSAGE_SIZE", "12"),
                ("PVUE_ERROR_FORMAT", "verbose"),
                ("PVUE_LOG_JSON", "maybe"),
            ]),
        );
        let defaults = PvueSettings::default();
        assert_eq!(settings.server.ws_port, defaults.server.ws_port);
        assert_eq!(
            settings.server.heartbeat_interval_secs,
            defaults.server.heartbeat_interval_secs
        );
        assert_eq!(settings.server.max_message_size, defaults.server.max_message_size);
        assert_eq!(settings.server.error_format, ErrorFormat::Legacy);
        assert!(!settings.logging.json);
    }

    #[test]
    fn empty_env_values_are_ignored() {
        let mut settings = PvueSettings::default();
        apply_overrides(&mut settings, env(&[("PVUE_HOST", "")]));
        assert_eq!(settings.server.host, "127.0.0.1");
    }

    #[test]
    fn parse_helpers() {
        assert_eq!(parse_bool("ON"), Some(true));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("2"), None);
        assert_eq!(parse_u16_range("80", 1, 65535), Some(80));
        assert_eq!(parse_u16_range("0", 1, 65535), None);
        assert_eq!(parse_u64_range("5000", 1, 3600), None);
    }
}
