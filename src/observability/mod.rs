//! Observability
//!
//! Structured logging through `tracing`. Application code only uses the
//! `tracing` macros and [`security_event!`]; the subscriber and its output
//! format are chosen once at startup.
//!
//! # Usage
//!
//! ```ignore
//! use securebiz::observability::{init, ObservabilityConfig};
//!
//! init(ObservabilityConfig::from_env())?;
//! ```
//!
//! # Environment Variables
//!
//! - `LOG_FORMAT`: "pretty", "json" or "compact" (default: "pretty")
//! - `RUST_LOG`: filter directive (default: "info")

mod config;
mod events;
mod providers;

pub use config::{LogFormat, ObservabilityConfig, ObservabilityConfigBuilder};
pub use events::{security_event, SecurityEvent, Severity};

use tracing::info;

/// Install the global tracing subscriber.
///
/// Must run once, before any logging. A second call fails with
/// [`ObservabilityError::Provider`].
pub fn init(config: ObservabilityConfig) -> Result<(), ObservabilityError> {
    providers::init_tracing(&config)?;

    info!(
        log_format = %config.log_format,
        log_filter = %config.log_filter,
        "Observability initialized"
    );

    Ok(())
}

/// Observability initialization errors
#[derive(Debug)]
pub enum ObservabilityError {
    /// Invalid configuration
    Config(String),
    /// Subscriber installation failed
    Provider(String),
}

impl std::fmt::Display for ObservabilityError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "Observability config error: {}", msg),
            Self::Provider(msg) => write!(f, "Provider error: {}", msg),
        }
    }
}

impl std::error::Error for ObservabilityError {}
