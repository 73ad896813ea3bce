//! Positional argument access for handlers.
//!
//! Handlers receive the request's `params` array wrapped in [`Params`]. The
//! accessors turn arity and type mismatches into
//! [`HandlerError::InvalidParams`] so every handler reports them the same way.

use serde_json::Value;

use crate::errors::HandlerError;

/// Ordered call arguments.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Params {
    function: String,
    values: Vec<Value>,
}

impl Params {
    /// Wrap `values` as the arguments of a call to `function`.
    pub fn new(function: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            function: function.into(),
            values,
        }
    }

    /// Name of the handler being called.
    pub fn function(&self) -> &str {
        &self.function
    }

    /// Number of arguments.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no arguments were passed.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// All arguments.
    pub fn as_slice(&self) -> &[Value] {
        &self.values
    }

    /// Consume into the raw argument list.
    pub fn into_inner(self) -> Vec<Value> {
        self.values
    }

    /// Require exactly `n` arguments.
    pub fn expect_len(&self, n: usize) -> Result<(), HandlerError> {
        if self.values.len() == n {
            return Ok(());
        }
        Err(HandlerError::invalid_params(format!(
            "{}() takes {n} positional argument{} but {} {} given",
            self.function,
            if n == 1 { "" } else { "s" },
            self.values.len(),
            if self.values.len() == 1 { "was" } else { "were" },
        )))
    }

    /// Argument `index`, or an arity error.
    pub fn get(&self, index: usize) -> Result<&Value, HandlerError> {
        self.values.get(index).ok_or_else(|| {
            HandlerError::invalid_params(format!(
                "{}() missing positional argument {}",
                self.function,
                index + 1
            ))
        })
    }

    /// Argument `index` as a string.
    pub fn str(&self, index: usize) -> Result<&str, HandlerError> {
        let value = self.get(index)?;
        value
            .as_str()
            .ok_or_else(|| self.type_error(index, "a string", value))
    }

    /// Argument `index` as an integer. Integral floats and numeric strings
    /// are accepted.
    #[allow(clippy::cast_possible_truncation)]
    pub fn i64(&self, index: usize) -> Result<i64, HandlerError> {
        let value = self.get(index)?;
        let parsed = match value {
            Value::Number(n) => n.as_i64().or_else(|| {
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && f.abs() < 9.0e15)
                    .map(|f| f as i64)
            }),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        };
        parsed.ok_or_else(|| self.type_error(index, "an integer", value))
    }

    /// Argument `index` as a float. Numeric strings are accepted.
    pub fn f64(&self, index: usize) -> Result<f64, HandlerError> {
        let value = self.get(index)?;
        let parsed = match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        };
        parsed.ok_or_else(|| self.type_error(index, "a number", value))
    }

    /// Argument `index` as a boolean.
    pub fn bool(&self, index: usize) -> Result<bool, HandlerError> {
        let value = self.get(index)?;
        value
            .as_bool()
            .ok_or_else(|| self.type_error(index, "a boolean", value))
    }

    fn type_error(&self, index: usize, expected: &str, got: &Value) -> HandlerError {
        HandlerError::invalid_params(format!(
            "{}() argument {} must be {expected}, got {}",
            self.function,
            index + 1,
            type_name(got)
        ))
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::errors::INVALID_PARAMS;

    #[test]
    fn expect_len_matches() {
        let p = Params::new("uppercase", vec![json!("a")]);
        assert!(p.expect_len(1).is_ok());
    }

    #[test]
    fn expect_len_mismatch_message() {
        let p = Params::new("uppercase", vec![]);
        let err = p.expect_len(1).unwrap_err();
        assert_eq!(err.code(), INVALID_PARAMS);
        assert_eq!(
            err.to_string(),
            "uppercase() takes 1 positional argument but 0 were given"
        );
    }

    #[test]
    fn str_type_error() {
        let p = Params::new("reverse", vec![json!(5)]);
        let err = p.str(0).unwrap_err();
        assert!(err.to_string().contains("must be a string, got number"));
    }

    #[test]
    fn numeric_coercions() {
        let p = Params::new("f", vec![json!(3), json!("4.5"), json!(2.0), json!(" 7 ")]);
        assert_eq!(p.i64(0).unwrap(), 3);
        assert!((p.f64(1).unwrap() - 4.5).abs() < f64::EPSILON);
        assert_eq!(p.i64(2).unwrap(), 2);
        assert_eq!(p.i64(3).unwrap(), 7);
        assert!(p.i64(1).is_err());
    }

    #[test]
    fn missing_argument() {
        let p = Params::new("update_todo", vec![json!(1)]);
        let err = p.bool(1).unwrap_err();
        assert!(err.to_string().contains("missing positional argument 2"));
    }

    #[test]
    fn bool_argument() {
        let p = Params::new("f", vec![json!(true), json!("true")]);
        assert!(p.bool(0).unwrap());
        assert!(p.bool(1).is_err());
    }
}
