//! Built-in string handlers: `uppercase`, `lowercase`, `reverse`.

use serde_json::Value;

use crate::errors::HandlerError;
use crate::params::Params;
use crate::registry::HandlerRegistry;

/// Register the three built-in text handlers.
pub fn register(registry: &HandlerRegistry) {
    let _ = registry.register_fn("uppercase", |p| map_text(&p, str::to_uppercase));
    let _ = registry.register_fn("lowercase", |p| map_text(&p, str::to_lowercase));
    let _ = registry.register_fn("reverse", |p| map_text(&p, |s| s.chars().rev().collect()));
}

fn map_text(params: &Params, f: impl Fn(&str) -> String) -> Result<Value, HandlerError> {
    params.expect_len(1)?;
    Ok(Value::String(f(params.str(0)?)))
}
