//! Branded ID newtypes.
//!
//! IDs are UUID v7 (time-ordered) generated via [`uuid::Uuid::now_v7`], so
//! log lines sorted by connection ID also sort by accept time.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for an accepted WebSocket connection.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(String);

impl ConnectionId {
    /// Create a new random ID (UUID v7, time-ordered).
    #[must_use]
    pub fn new() -> Self {
        Self(format!("conn_{}", Uuid::now_v7().simple()))
    }

    /// Return the inner string as a slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for ConnectionId {
    type Target = str;
    fn deref(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ConnectionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConnectionId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_id_has_prefix_and_v7_body() {
        let id = ConnectionId::new();
        let body = id.as_str().strip_prefix("conn_").expect("prefix");
        let parsed = Uuid::parse_str(body).expect("should be valid UUID");
        assert_eq!(parsed.get_version(), Some(uuid::Version::SortRand));
    }

    #[test]
    fn ids_are_unique() {
        assert_ne!(ConnectionId::new(), ConnectionId::new());
    }

    #[test]
    fn ids_sort_by_creation() {
        let a = ConnectionId::new();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = ConnectionId::new();
        assert!(a.as_str() < b.as_str());
    }

    #[test]
    fn display_and_deref() {
        let id = ConnectionId::from("conn_fixed");
        assert_eq!(format!("{id}"), "conn_fixed");
        let s: &str = &id;
        assert_eq!(s, "conn_fixed");
    }

    #[test]
    fn serializes_as_plain_string() {
        let id = ConnectionId::from("conn_serde");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"conn_serde\"");
        let back: ConnectionId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
