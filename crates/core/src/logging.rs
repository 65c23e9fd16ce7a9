//! Logging initialization.

use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Filter used when neither `RUST_LOG` nor the config provides one.
pub const DEFAULT_FILTER: &str = "info,vista=debug";

/// Installs the global `tracing` subscriber.
///
/// `RUST_LOG` wins when set; otherwise [`DEFAULT_FILTER`] is used.
///
/// ```
/// vista_core::init_logging();
/// tracing::info!("viewer starting");
/// ```
pub fn init_logging() -> bool {
    init_logging_with(None)
}

/// Installs the global subscriber, falling back to `directive` before [`DEFAULT_FILTER`].
///
/// Returns `false` if a global subscriber was already installed; the existing
/// one is kept and the refusal is logged through it at debug level.
pub fn init_logging_with(directive: Option<&str>) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(directive.unwrap_or(DEFAULT_FILTER)))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    match tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .try_init()
    {
        Ok(()) => true,
        Err(e) => {
            debug!("Keeping the existing tracing subscriber: {}", e);
            false
        }
    }
}
