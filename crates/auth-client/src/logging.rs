//! Logging initialization for applications embedding the auth client.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Initialize structured JSON logging to stderr.
///
/// The level comes from `RUST_LOG` when set, otherwise from `level`.
/// Returns false when a global subscriber was already installed, which makes
/// repeated calls harmless.
///
/// # Example
///
/// ```ignore
/// auth_client::logging::init_logging("info");
/// tracing::info!("Auth client started");
/// ```
pub fn init_logging(level: &str) -> bool {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_target(true)
        .with_current_span(false)
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(json_layer.with_filter(env_filter))
        .try_init()
        .is_ok()
}
