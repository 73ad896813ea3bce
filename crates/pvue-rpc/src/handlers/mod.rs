//! Bundled handler sets.
//!
//! `text` is always present (see [`HandlerRegistry::with_builtins`]). The
//! example applications each own their state and register against a
//! registry on request.
//!
//! [`HandlerRegistry::with_builtins`]: crate::registry::HandlerRegistry::with_builtins

pub mod calculator;
pub mod notes;
pub mod text;
pub mod todo;
