//! Logging configuration
//!
//! Diagnostics go to stderr through `tracing`. Stdout is reserved for the
//! PASS/FAIL lines and the final summary, so piping the report never mixes
//! in log output.
//!
//! # Example
//!
//! ```no_run
//! use rbac_smoke::telemetry::init_logging;
//!
//! init_logging();
//! ```

use std::io::IsTerminal;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset or invalid
pub const DEFAULT_FILTER: &str = "info";

/// Build the env filter, falling back to [`DEFAULT_FILTER`]
pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the stderr subscriber
///
/// Colours are only used when stderr is a terminal. Later calls are no-ops.
pub fn init_logging() {
    let stderr_is_terminal = std::io::stderr().is_terminal();

    let _ = tracing_subscriber::registry()
        .with(env_filter())
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(stderr_is_terminal)
                .with_target(false),
        )
        .try_init();
}
