//! Logging initialization.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Default filter used when `RUST_LOG` is not set.
const DEFAULT_FILTER: &str = "info,ringframe=debug,ringframe_renderer=debug,ringframe_rhi=info";

/// Installs the tracing subscriber for the process.
///
/// Components never reach for a global logger themselves: each one owns a
/// `tracing::Span` and logs inside it. This function only decides where
/// those events end up.
///
/// - Environment-based filtering (`RUST_LOG`), falling back to [`DEFAULT_FILTER`]
/// - Targets and thread ids in every line
///
/// # Example
/// ```
/// ringframe_core::init_logging();
/// tracing::info!("pipeline starting");
/// ```
pub fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    // A second call (tests, embedding applications) keeps the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .try_init();
}
