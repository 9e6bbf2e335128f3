//! Tracing subscriber setup for hosts embedding the engine.
//!
//! The engine only emits `tracing` events; installing a subscriber is the
//! host's choice. [`init_tracing`] is a ready-made one.
//!
//! Environment variables:
//! - `RUST_LOG`: filter directives (default: `atomic_knowledge=info`)
//! - `LOG_FORMAT`: `json` for structured logs, `pretty` for development
//!   (default: json)

use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::{SubscriberInitExt, TryInitError},
    EnvFilter,
};

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "atomic_knowledge=info";

/// Output format of the fmt layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// One JSON object per event.
    #[default]
    Json,
    /// Human-readable multi-line output.
    Pretty,
}

impl LogFormat {
    /// Parse a format name. Unknown names fall back to JSON.
    pub fn from_str(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Self::Pretty,
            _ => Self::Json,
        }
    }

    /// Read `LOG_FORMAT`.
    pub fn from_env() -> Self {
        std::env::var("LOG_FORMAT")
            .map(|v| Self::from_str(&v))
            .unwrap_or_default()
    }
}

/// Install a global subscriber with an env filter and the chosen format.
///
/// Fails if a global subscriber is already installed.
pub fn init_tracing(format: LogFormat) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into());

    match format {
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_current_span(true)
                    .flatten_event(true),
            )
            .try_init(),
    }
}
