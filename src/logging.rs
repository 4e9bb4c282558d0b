//! Logging prelude module for convenient access to tracing macros.
//!
//! Re-exports the common tracing macros so call sites stay terse and
//! consistent across the codebase.

pub use tracing::{debug, error, info, trace, warn};

/// Initialize the tracing subscriber with environment filter support.
///
/// Logs at INFO level and above by default. Control the log level with
/// the `RUST_LOG` environment variable:
///
/// ```bash
/// RUST_LOG=debug confsync sync ./docs
/// RUST_LOG=confsync::sync=trace confsync sync ./docs
/// ```
pub fn init_tracing(default_level: &str) {
	tracing_subscriber::fmt()
		.with_env_filter(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
		)
		.with_writer(std::io::stderr)
		.init();
}

// vim: ts=4
