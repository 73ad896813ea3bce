//! Structured logging with `tracing`.
//!
//! Every crate logs through the `tracing` macros with structured fields
//! (`connection_id`, `function`, `peer`). The binary calls
//! [`init_subscriber`] once at startup; libraries never install a
//! subscriber themselves.

use tracing_subscriber::EnvFilter;

/// Output format for the stderr subscriber.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Single-line human-readable output.
    #[default]
    Compact,
    /// One JSON object per line.
    Json,
}

/// Build the filter: `RUST_LOG` wins, otherwise `level`.
fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Initialize the global tracing subscriber writing to stderr.
///
/// Call once at application startup. Subsequent calls are no-ops.
///
/// # Arguments
///
/// * `level` - Minimum level (or full filter directive) when `RUST_LOG` is unset.
/// * `format` - Compact text or JSON lines.
pub fn init_subscriber(level: &str, format: LogFormat) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(build_filter(level))
        .with_target(true)
        .with_writer(std::io::stderr);

    // try_init is a no-op if a global subscriber is already set
    let _ = match format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}
