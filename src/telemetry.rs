//! Process-wide `tracing` subscriber setup for the binaries.

use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Filter applied when `RUST_LOG` is unset or invalid.
pub const DEFAULT_FILTER: &str = "info";

/// Output format of log events.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum LogFormat {
    /// Human readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

/// Raised when a global subscriber is already installed.
#[derive(Debug, Error)]
#[error("failed to initialise logging: {message}")]
pub struct TelemetryError {
    /// Underlying error message.
    pub message: String,
}

/// Installs the global subscriber, writing to stderr.
///
/// The filter comes from `RUST_LOG`, falling back to [`DEFAULT_FILTER`].
///
/// # Errors
///
/// Returns [`TelemetryError`] when a subscriber is already installed.
pub fn init(format: LogFormat) -> Result<(), TelemetryError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let json = matches!(format, LogFormat::Json);
    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| fmt::layer().json().with_writer(std::io::stderr)))
        .with((!json).then(|| fmt::layer().with_writer(std::io::stderr)))
        .try_init()
        .map_err(|err| TelemetryError {
            message: err.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_initialisation_is_reported() {
        let first = init(LogFormat::Text);
        let second = init(LogFormat::Json);
        assert!(second.is_err(), "second init succeeded after {first:?}");
    }
}
