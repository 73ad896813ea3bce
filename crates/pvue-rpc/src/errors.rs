//! Dispatch error codes and error types.

use crate::types::ErrorBody;

// ── Error code constants ────────────────────────────────────────────

/// Message was not valid JSON.
pub const PARSE_ERROR: &str = "PARSE_ERROR";
/// Message was JSON but not a usable request.
pub const MALFORMED_REQUEST: &str = "MALFORMED_REQUEST";
/// No handler registered under the requested name.
pub const UNKNOWN_HANDLER: &str = "UNKNOWN_HANDLER";
/// The handler ran and failed.
pub const HANDLER_ERROR: &str = "HANDLER_ERROR";
/// Handler rejected its arguments (arity or type).
pub const INVALID_PARAMS: &str = "INVALID_PARAMS";

/// Failure raised by a handler while executing a call.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// Wrong number or type of arguments.
    #[error("{message}")]
    InvalidParams {
        /// Description of what is wrong.
        message: String,
    },

    /// Any other failure inside the handler.
    #[error("{message}")]
    Failed {
        /// Description.
        message: String,
    },
}

impl HandlerError {
    /// Build an [`HandlerError::InvalidParams`].
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::InvalidParams {
            message: message.into(),
        }
    }

    /// Build a [`HandlerError::Failed`].
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }

    /// Machine-readable error code for this variant.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidParams { .. } => INVALID_PARAMS,
            Self::Failed { .. } => HANDLER_ERROR,
        }
    }
}

/// Failure of one dispatch cycle. Every variant becomes an error response;
/// none of them closes the connection.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The frame was not valid JSON.
    #[error("无效的 JSON 格式")]
    Parse {
        /// Parser diagnostic, logged but not sent to the client.
        detail: String,
    },

    /// Valid JSON that is not a request document.
    #[error("{message}")]
    MalformedRequest {
        /// Client-facing message.
        message: String,
    },

    /// No handler registered under `name`.
    #[error("不支持的功能 \"{name}\"")]
    UnknownHandler {
        /// Requested handler name.
        name: String,
    },

    /// The handler failed (including a caught panic).
    #[error(transparent)]
    Handler(#[from] HandlerError),
}

impl DispatchError {
    /// Request document lacks a `function` field.
    pub fn missing_function() -> Self {
        Self::MalformedRequest {
            message: "消息缺少 function 字段".into(),
        }
    }

    /// `function` is present but not a string.
    pub fn function_not_string() -> Self {
        Self::MalformedRequest {
            message: "function 字段必须是字符串".into(),
        }
    }

    /// `params` is present but not an array.
    pub fn params_not_array() -> Self {
        Self::MalformedRequest {
            message: "params 字段必须是数组".into(),
        }
    }

    /// Top-level document is not an object.
    pub fn not_an_object() -> Self {
        Self::MalformedRequest {
            message: "消息必须是 JSON 对象".into(),
        }
    }

    /// Wire code for this failure.
    ///
    /// Handler failures all report [`HANDLER_ERROR`]; the finer handler code
    /// is only used as a metrics label.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Parse { .. } => PARSE_ERROR,
            Self::MalformedRequest { .. } => MALFORMED_REQUEST,
            Self::UnknownHandler { .. } => UNKNOWN_HANDLER,
            Self::Handler(_) => HANDLER_ERROR,
        }
    }

    /// Convert to the wire-format error body.
    pub fn to_error_body(&self) -> ErrorBody {
        ErrorBody {
            code: self.code().to_owned(),
            message: self.to_string(),
        }
    }
}
