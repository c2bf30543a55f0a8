//! Logging setup using `tracing` + `tracing-subscriber`.
//!
//! The level is taken from `RUST_LOG` when set, defaulting to `info` for
//! this crate. Embedders call [`init`] once at startup.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Initialise the global logging subscriber.
///
/// Safe to call once at startup; panics if a global subscriber is already
/// installed.
pub fn init() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "playpen_runner=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
