//! # pvue-rpc
//!
//! Dispatch protocol for the pvue backend: wire types, the error taxonomy,
//! the handler registry, positional argument helpers, and the bundled
//! handler sets.
//!
//! A dispatch cycle is parse → lookup → invoke → respond. Every failure in
//! the cycle becomes a [`DispatchError`] that the transport turns into an
//! error [`Response`]; none of them ends the connection.

#![deny(unsafe_code)]

pub mod context;
pub mod errors;
pub mod handlers;
pub mod metrics;
pub mod params;
pub mod registry;
pub mod types;

pub use context::CallContext;
pub use errors::{DispatchError, HandlerError};
pub use params::Params;
pub use registry::{Handler, HandlerRegistry, Registration};
pub use types::{ErrorBody, ErrorFormat, Request, Response};
