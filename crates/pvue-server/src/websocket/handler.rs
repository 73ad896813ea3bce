//! Frame dispatch: turns one inbound frame into one response frame.

use pvue_rpc::{CallContext, DispatchError, ErrorFormat, HandlerRegistry, Response};
use tracing::debug;

/// Result of handling one frame.
pub struct HandleResult {
    /// Serialized JSON response to send back.
    pub response_json: String,
    /// Typed response.
    pub response: Response,
}

impl HandleResult {
    fn from_response(response: Response) -> Self {
        Self {
            response_json: response.to_json(),
            response,
        }
    }
}

/// Handle an inbound text frame.
pub async fn handle_message(
    message: &str,
    registry: &HandlerRegistry,
    ctx: &CallContext,
    format: ErrorFormat,
) -> HandleResult {
    let response = match registry.dispatch(message, ctx).await {
        Ok(value) => Response::success(value),
        Err(err) => {
            debug!(connection_id = %ctx.connection_id, code = err.code(), "sending error response");
            Response::error(&err, format)
        }
    };
    HandleResult::from_response(response)
}

/// Response to a binary frame that is not UTF-8.
pub fn non_utf8_response(format: ErrorFormat) -> HandleResult {
    let err = DispatchError::Parse {
        detail: "binary frame is not valid UTF-8".into(),
    };
    HandleResult::from_response(Response::error(&err, format))
}
