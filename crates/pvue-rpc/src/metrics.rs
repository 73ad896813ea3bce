//! Names of the metrics recorded by the dispatch cycle.

/// Calls received (counter, labels: function).
pub const RPC_REQUESTS_TOTAL: &str = "rpc_requests_total";
/// Failed dispatch cycles (counter, labels: function, error_type).
pub const RPC_ERRORS_TOTAL: &str = "rpc_errors_total";
/// Handler run time (histogram, labels: function).
pub const RPC_REQUEST_DURATION_SECONDS: &str = "rpc_request_duration_seconds";
