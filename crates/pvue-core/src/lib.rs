//! # pvue-core
//!
//! Foundation pieces shared by every pvue crate:
//!
//! - **Branded IDs**: [`ConnectionId`] as a newtype so connection identifiers
//!   cannot be confused with handler names or other strings
//! - **Logging**: [`logging::init_subscriber`] installs the global `tracing`
//!   subscriber

#![deny(unsafe_code)]

pub mod ids;
pub mod logging;

pub use ids::ConnectionId;
