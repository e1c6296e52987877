//! Structured logging setup.
//!
//! `RUST_LOG` takes precedence over the configured level.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogFormat, ObservabilityConfig};

/// Default filter directive for a configured level.
pub fn default_directive(level: &str) -> String {
    format!("dev_relay={level},tower_http=warn")
}

/// Install the global tracing subscriber.
///
/// Fails if a global subscriber is already set.
pub fn init(config: &ObservabilityConfig) -> Result<(), tracing_subscriber::util::TryInitError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_directive(&config.log_level).into());

    let registry = tracing_subscriber::registry().with(filter);

    match config.log_format {
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).try_init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
            .try_init(),
    }
}
