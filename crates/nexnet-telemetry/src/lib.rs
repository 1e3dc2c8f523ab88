//! Structured logging initialization for nexnet nodes.

#![deny(unsafe_code)]

use thiserror::Error;
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("logging already initialized")]
    AlreadyInitialized,
}

/// Initialize human-readable structured logging with an env filter.
///
/// Controlled via `RUST_LOG`, e.g. `info,nexnet_transport=debug`. Defaults
/// to `info` when unset or malformed.
pub fn init_logging() -> Result<(), TelemetryError> {
    let fmt_layer = fmt::layer().with_target(true);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = Registry::default().with(filter).with(fmt_layer);
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|_| TelemetryError::AlreadyInitialized)
}
