//! Handler registry and dispatch.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures::FutureExt;
use metrics::{counter, histogram};
use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, error, instrument, warn};

use crate::context::CallContext;
use crate::errors::{DispatchError, HandlerError};
use crate::metrics::{RPC_ERRORS_TOTAL, RPC_REQUEST_DURATION_SECONDS, RPC_REQUESTS_TOTAL};
use crate::params::Params;
use crate::types::Request;

/// Trait implemented by every callable handler.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Execute the handler with positional `params`.
    async fn call(&self, params: Params, ctx: &CallContext) -> Result<Value, HandlerError>;
}

/// Adapter turning a synchronous closure into a [`Handler`].
struct FnHandler<F>(F);

#[async_trait]
impl<F> Handler for FnHandler<F>
where
    F: Fn(Params) -> Result<Value, HandlerError> + Send + Sync,
{
    async fn call(&self, params: Params, _ctx: &CallContext) -> Result<Value, HandlerError> {
        (self.0)(params)
    }
}

/// Handle returned by [`HandlerRegistry::register`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Registration {
    name: String,
    replaced: bool,
}

impl Registration {
    /// Name the handler was registered under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether an earlier handler with the same name was replaced.
    pub fn replaced(&self) -> bool {
        self.replaced
    }
}

/// Registry mapping handler names to handlers.
///
/// Registration takes `&self`, so a registry shared with a running server
/// can still gain handlers. A dispatch clones the handler out of the lock
/// before invoking it; replacing a handler never affects a call in flight.
pub struct HandlerRegistry {
    handlers: RwLock<HashMap<String, Arc<dyn Handler>>>,
}

impl HandlerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
        }
    }

    /// Create a registry holding the built-in text handlers.
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        crate::handlers::text::register(&registry);
        registry
    }

    /// Register `handler` under `name`. The last registration for a name wins.
    pub fn register(&self, name: &str, handler: impl Handler + 'static) -> Registration {
        self.register_arc(name, Arc::new(handler))
    }

    /// Register an already shared handler.
    pub fn register_arc(&self, name: &str, handler: Arc<dyn Handler>) -> Registration {
        let replaced = self
            .handlers
            .write()
            .insert(name.to_owned(), handler)
            .is_some();
        if replaced {
            debug!(function = name, "handler replaced");
        } else {
            debug!(function = name, "handler registered");
        }
        Registration {
            name: name.to_owned(),
            replaced,
        }
    }

    /// Register a synchronous closure under `name`.
    pub fn register_fn<F>(&self, name: &str, f: F) -> Registration
    where
        F: Fn(Params) -> Result<Value, HandlerError> + Send + Sync + 'static,
    {
        self.register(name, FnHandler(f))
    }

    /// Parse one raw frame and run it.
    #[instrument(skip_all, fields(connection_id = %ctx.connection_id, function))]
    pub async fn dispatch(&self, text: &str, ctx: &CallContext) -> Result<Value, DispatchError> {
        let request = match Request::parse(text) {
            Ok(request) => request,
            Err(err) => {
                if let DispatchError::Parse { detail } = &err {
                    warn!(detail, "invalid JSON received");
                } else {
                    warn!(error = %err, "malformed request");
                }
                counter!(RPC_ERRORS_TOTAL, "function" => "", "error_type" => err.code()).increment(1);
                return Err(err);
            }
        };
        let _ = tracing::Span::current().record("function", request.function.as_str());
        self.call(request, ctx).await
    }

    /// Run an already parsed request.
    pub async fn call(&self, request: Request, ctx: &CallContext) -> Result<Value, DispatchError> {
        let Request { function, params } = request;
        counter!(RPC_REQUESTS_TOTAL, "function" => function.clone()).increment(1);

        // Clone the handler out so the lock is not held across the await.
        let handler = self.handlers.read().get(&function).cloned();
        let Some(handler) = handler else {
            warn!(function, "unknown handler");
            counter!(RPC_ERRORS_TOTAL, "function" => function.clone(), "error_type" => "unknown_handler").increment(1);
            return Err(DispatchError::UnknownHandler { name: function });
        };

        debug!(function, args = params.len(), "dispatching call");
        let start = Instant::now();
        let params = Params::new(function.clone(), params);
        let outcome = AssertUnwindSafe(handler.call(params, ctx))
            .catch_unwind()
            .await;

        let result = match outcome {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => {
                warn!(function, error = %err, "handler failed");
                counter!(RPC_ERRORS_TOTAL, "function" => function.clone(), "error_type" => err.code()).increment(1);
                Err(DispatchError::Handler(err))
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(function, panic = %message, "handler panicked");
                counter!(RPC_ERRORS_TOTAL, "function" => function.clone(), "error_type" => "panic").increment(1);
                Err(DispatchError::Handler(HandlerError::failed(message)))
            }
        };

        let duration = start.elapsed();
        histogram!(RPC_REQUEST_DURATION_SECONDS, "function" => function.clone())
            .record(duration.as_secs_f64());
        if duration.as_secs() >= 5 {
            warn!(
                function,
                duration_secs = duration.as_secs_f64(),
                "slow handler call"
            );
        }

        result
    }

    /// List all registered handler names (sorted).
    pub fn handler_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Check whether a handler is registered.
    pub fn has_handler(&self, name: &str) -> bool {
        self.handlers.read().contains_key(name)
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.handlers.read().len()
    }

    /// Whether no handlers are registered.
    pub fn is_empty(&self) -> bool {
        self.handlers.read().is_empty()
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("handlers", &self.handler_names())
            .finish()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_owned()
    }
}
