//! Structured logging for uboss.
//!
//! Installs a global `tracing` subscriber with an [`EnvFilter`] and either a
//! JSON or a human-readable formatter. Library code only emits events; the
//! host application decides whether and how they are printed.
//!
//! # Example
//!
//! ```rust,ignore
//! use uboss_telemetry::logging::{init_logging, LogConfig};
//!
//! init_logging(&LogConfig::development())?;
//! tracing::info!(method = "increase", "Gateway composed");
//! ```

use crate::error::TelemetryError;
use crate::TelemetryResult;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Whether logging is enabled.
    pub enabled: bool,

    /// Filter directive (e.g., "info", "uboss=debug,warn").
    pub level: String,

    /// Whether to output JSON format.
    pub json_format: bool,

    /// Whether to log span open/close events (e.g. `uboss.invoke`).
    pub span_events: bool,

    /// Whether to include file/line info.
    pub file_line_info: bool,

    /// Whether to include target (module path).
    pub include_target: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::production()
    }
}

impl LogConfig {
    /// Creates a development configuration with human-readable output.
    #[must_use]
    pub fn development() -> Self {
        Self {
            enabled: true,
            level: "debug".to_string(),
            json_format: false,
            span_events: true,
            file_line_info: true,
            include_target: true,
        }
    }

    /// Creates a production configuration with JSON output.
    #[must_use]
    pub fn production() -> Self {
        Self {
            enabled: true,
            level: "info".to_string(),
            json_format: true,
            span_events: false,
            file_line_info: false,
            include_target: true,
        }
    }
}

/// Initializes the logging subsystem.
///
/// # Errors
///
/// Returns `TelemetryError::InvalidConfig` for an unparsable filter and
/// `TelemetryError::LoggingInit` if a global subscriber is already set.
pub fn init_logging(config: &LogConfig) -> TelemetryResult<()> {
    if !config.enabled {
        return Ok(());
    }

    let filter = create_env_filter(&config.level)?;

    let span_events = if config.span_events {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_span_events(span_events)
        .with_file(config.file_line_info)
        .with_line_number(config.file_line_info)
        .with_target(config.include_target);

    let result = if config.json_format {
        tracing_subscriber::registry()
            .with(fmt_layer.json().with_filter(filter))
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(fmt_layer.pretty().with_filter(filter))
            .try_init()
    };

    result.map_err(|e| TelemetryError::LoggingInit(e.to_string()))
}

/// Creates an env filter from a directive string.
///
/// # Errors
///
/// Returns `TelemetryError::InvalidConfig` if the directive is invalid.
pub fn create_env_filter(filter: &str) -> TelemetryResult<EnvFilter> {
    EnvFilter::try_new(filter)
        .map_err(|e| TelemetryError::InvalidConfig(format!("Invalid log level {filter:?}: {e}")))
}

/// Field names used in uboss log events and spans.
pub mod fields {
    /// Method name field.
    pub const METHOD: &str = "method";

    /// Stage name field.
    pub const STAGE: &str = "stage";

    /// Stage kind field (`beforeAuth`, `authorization`, `method`, ...).
    pub const PHASE: &str = "phase";

    /// Stage position field.
    pub const INDEX: &str = "index";

    /// Invocation outcome field.
    pub const OUTCOME: &str = "outcome";

    /// Error field.
    pub const ERROR: &str = "error";
}
