//! Wire-format types for the dispatch protocol.
//!
//! One JSON document per WebSocket text frame:
//!
//! ```text
//! -> {"function": "uppercase", "params": ["abc"]}
//! <- {"result": "ABC"}
//! ```
//!
//! Errors reuse the `result` field with a `错误：` prefix. The tagged error
//! format additionally carries an `error` object with a stable code.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use pvue_settings::ErrorFormat;

use crate::errors::DispatchError;

/// Prefix the wire protocol puts in front of every error message.
pub const ERROR_PREFIX: &str = "错误：";

/// A parsed call request.
#[derive(Clone, Debug, PartialEq)]
pub struct Request {
    /// Handler name.
    pub function: String,
    /// Positional arguments.
    pub params: Vec<Value>,
}

impl Request {
    /// Parse a raw frame into a request.
    pub fn parse(text: &str) -> Result<Self, DispatchError> {
        let value: Value = serde_json::from_str(text).map_err(|e| DispatchError::Parse {
            detail: e.to_string(),
        })?;
        Self::from_value(value)
    }

    /// Extract a request from a decoded document.
    ///
    /// `params` defaults to an empty list. When `params` is absent, a string
    /// `text` field is passed as the single argument.
    pub fn from_value(value: Value) -> Result<Self, DispatchError> {
        let Value::Object(mut doc) = value else {
            return Err(DispatchError::not_an_object());
        };

        let function = match doc.remove("function") {
            None => return Err(DispatchError::missing_function()),
            Some(Value::String(name)) => name,
            Some(_) => return Err(DispatchError::function_not_string()),
        };

        let params = match doc.remove("params") {
            None | Some(Value::Null) => match doc.remove("text") {
                Some(text @ Value::String(_)) => vec![text],
                _ => Vec::new(),
            },
            Some(Value::Array(items)) => items,
            Some(_) => return Err(DispatchError::params_not_array()),
        };

        Ok(Self { function, params })
    }
}

/// Outgoing response frame.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Response {
    /// Handler return value, or the prefixed error text.
    pub result: Value,
    /// Structured error (tagged format only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

/// Structured error body inside a tagged [`Response`].
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
    /// Machine-readable error code (e.g. `UNKNOWN_HANDLER`).
    pub code: String,
    /// Human-readable message, without the prefix.
    pub message: String,
}

impl Response {
    /// Build a success response.
    pub fn success(result: Value) -> Self {
        Self {
            result,
            error: None,
        }
    }

    /// Build an error response in the requested shape.
    pub fn error(err: &DispatchError, format: ErrorFormat) -> Self {
        let body = err.to_error_body();
        let result = Value::String(format!("{ERROR_PREFIX}{}", body.message));
        Self {
            result,
            error: match format {
                ErrorFormat::Legacy => None,
                ErrorFormat::Tagged => Some(body),
            },
        }
    }

    /// Whether this response carries an error.
    ///
    /// Legacy-shaped errors are recognised by their prefix, so a handler
    /// that returns a string starting with `错误：` is indistinguishable.
    pub fn is_error(&self) -> bool {
        self.error.is_some()
            || self
                .result
                .as_str()
                .is_some_and(|s| s.starts_with(ERROR_PREFIX))
    }

    /// Serialize to the frame text.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            tracing::error!(error = %e, "failed to serialize response");
            String::new()
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::errors::{MALFORMED_REQUEST, PARSE_ERROR};

    #[test]
    fn parse_full_request() {
        let req = Request::parse(r#"{"function": "uppercase", "params": ["abc"]}"#).unwrap();
        assert_eq!(req.function, "uppercase");
        assert_eq!(req.params, vec![json!("abc")]);
    }

    #[test]
    fn params_default_to_empty() {
        let req = Request::parse(r#"{"function": "get_todos"}"#).unwrap();
        assert!(req.params.is_empty());
        let req = Request::parse(r#"{"function": "get_todos", "params": null}"#).unwrap();
        assert!(req.params.is_empty());
    }

    #[test]
    fn legacy_text_field_becomes_argument() {
        let req = Request::parse(r#"{"text": "hi", "function": "reverse"}"#).unwrap();
        assert_eq!(req.params, vec![json!("hi")]);
    }

    #[test]
    fn params_win_over_text() {
        let req = Request::parse(r#"{"text": "a", "function": "f", "params": ["b"]}"#).unwrap();
        assert_eq!(req.params, vec![json!("b")]);
    }

    #[test]
    fn invalid_json_is_parse_error() {
        let err = Request::parse("{bad").unwrap_err();
        assert_eq!(err.code(), PARSE_ERROR);
    }

    #[test]
    fn malformed_documents() {
        for text in [
            r#"["function"]"#,
            r#"{"params": []}"#,
            r#"{"function": 7}"#,
            r#"{"function": "f", "params": "abc"}"#,
        ] {
            let err = Request::parse(text).unwrap_err();
            assert_eq!(err.code(), MALFORMED_REQUEST, "input: {text}");
        }
    }

    #[test]
    fn success_serializes_result_only() {
        let json = Response::success(json!("ABC")).to_json();
        assert_eq!(json, r#"{"result":"ABC"}"#);
    }

    #[test]
    fn legacy_error_shape() {
        let err = DispatchError::UnknownHandler {
            name: "missing".into(),
        };
        let resp = Response::error(&err, ErrorFormat::Legacy);
        let value: Value = serde_json::from_str(&resp.to_json()).unwrap();
        assert_eq!(value, json!({"result": "错误：不支持的功能 \"missing\""}));
        assert!(resp.is_error());
    }

    #[test]
    fn tagged_error_shape() {
        let err = DispatchError::missing_function();
        let resp = Response::error(&err, ErrorFormat::Tagged);
        let value: Value = serde_json::from_str(&resp.to_json()).unwrap();
        assert_eq!(value["result"], "错误：消息缺少 function 字段");
        assert_eq!(value["error"]["code"], "MALFORMED_REQUEST");
        assert_eq!(value["error"]["message"], "消息缺少 function 字段");
    }

    #[test]
    fn success_is_not_error() {
        assert!(!Response::success(json!({"ok": true})).is_error());
    }
}
