//! # docqa-telemetry
//!
//! Logging setup for docqa binaries.
//!
//! The library crates only emit `tracing` events and spans. A binary picks a
//! subscriber once at startup:
//!
//! - [`init_telemetry`] for human-readable logs on stderr
//! - [`init_json_telemetry`] for one JSON object per line
//! - [`init_with_capture`] to additionally keep finished spans per session in
//!   a [`SpanStore`]
//!
//! Verbosity follows `RUST_LOG` and defaults to `info`.

pub mod capture;

use std::sync::Arc;

use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt};

pub use capture::{CaptureLayer, SESSION_FIELD, SpanRecord, SpanStore};

const DEFAULT_FILTER: &str = "info";

/// The `RUST_LOG` filter, or `default` when it is unset or invalid.
pub fn env_filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// Install a plain-text subscriber writing to stderr.
///
/// # Errors
///
/// Fails if a global subscriber is already installed.
pub fn init_telemetry(service_name: &str) -> Result<(), TryInitError> {
    tracing_subscriber::registry()
        .with(env_filter(DEFAULT_FILTER))
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init()?;
    tracing::debug!(service.name = service_name, "telemetry initialized");
    Ok(())
}

/// Install a JSON subscriber writing to stderr.
///
/// # Errors
///
/// Fails if a global subscriber is already installed.
pub fn init_json_telemetry(service_name: &str) -> Result<(), TryInitError> {
    tracing_subscriber::registry()
        .with(env_filter(DEFAULT_FILTER))
        .with(fmt::layer().json().with_writer(std::io::stderr).with_current_span(true))
        .try_init()?;
    tracing::debug!(service.name = service_name, "telemetry initialized");
    Ok(())
}

/// Install a plain-text (or JSON) subscriber that also records finished
/// spans into `store`.
///
/// The capture layer sees every span regardless of the `RUST_LOG` filter.
///
/// # Errors
///
/// Fails if a global subscriber is already installed.
pub fn init_with_capture(
    service_name: &str,
    store: Arc<SpanStore>,
    json: bool,
) -> Result<(), TryInitError> {
    let filter = || env_filter(DEFAULT_FILTER);
    let (plain, structured) = if json {
        let layer = fmt::layer().json().with_writer(std::io::stderr).with_filter(filter());
        (None, Some(layer))
    } else {
        let layer = fmt::layer().with_writer(std::io::stderr).with_target(false).with_filter(filter());
        (Some(layer), None)
    };

    tracing_subscriber::registry()
        .with(CaptureLayer::new(store))
        .with(plain)
        .with(structured)
        .try_init()?;
    tracing::debug!(service.name = service_name, "telemetry initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_env_filter_falls_back_to_default() {
        let filter = EnvFilter::try_new("not a [valid filter")
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
        assert_eq!(filter.to_string(), "info");
    }

    #[test]
    fn second_global_init_fails() {
        let store = Arc::new(SpanStore::new());
        let first = init_with_capture("docqa-test", store, false);
        assert!(first.is_ok());
        assert!(init_telemetry("docqa-test").is_err());
        assert!(init_json_telemetry("docqa-test").is_err());
    }
}
