//! Observability for uboss.
//!
//! - **Logging**: structured JSON or pretty logs via `tracing-subscriber`
//! - **Metrics**: invocation counters and latency histograms via `metrics`
//!
//! The gateway crates only emit `tracing` events and `metrics` samples.
//! [`init_telemetry`] is for binaries that want uboss to install the
//! subscriber for them.
//!
//! # Example
//!
//! ```rust,ignore
//! use uboss_telemetry::{init_telemetry, LogConfig, MetricsConfig, TelemetryConfig};
//!
//! let config = TelemetryConfig {
//!     logging: LogConfig::development(),
//!     metrics: MetricsConfig::default(),
//! };
//! init_telemetry(&config)?;
//! ```

#![doc(html_root_url = "https://docs.rs/uboss-telemetry/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::TelemetryError;
pub use logging::{create_env_filter, init_logging, LogConfig};
pub use metrics::{init_metrics, MetricsConfig, Outcome};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;

/// Combined logging and metrics configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// Logging settings.
    pub logging: LogConfig,
    /// Metrics settings.
    pub metrics: MetricsConfig,
}

/// Initializes logging and metrics.
///
/// # Errors
///
/// Returns `TelemetryError` if the logging subscriber cannot be installed.
pub fn init_telemetry(config: &TelemetryConfig) -> TelemetryResult<()> {
    init_logging(&config.logging)?;
    init_metrics(&config.metrics);
    Ok(())
}
