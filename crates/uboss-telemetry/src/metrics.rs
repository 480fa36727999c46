//! Invocation metrics for uboss.
//!
//! Metrics are recorded through the [`metrics`] facade. uboss never installs
//! a recorder itself: without one every call here is a no-op, and the host
//! application chooses the exporter.
//!
//! # Standard Metrics
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `uboss_invocations_total` | Counter | `method`, `outcome` | Settled invocations |
//! | `uboss_invocation_duration_seconds` | Histogram | `method` | Stage runner duration |
//! | `uboss_authorization_denied_total` | Counter | `method` | Gate denials |

use metrics::{counter, describe_counter, describe_histogram, histogram};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Total settled invocations.
pub const INVOCATIONS_TOTAL: &str = "uboss_invocations_total";

/// Stage runner duration.
pub const INVOCATION_DURATION_SECONDS: &str = "uboss_invocation_duration_seconds";

/// Authorization gate denials.
pub const AUTHORIZATION_DENIED_TOTAL: &str = "uboss_authorization_denied_total";

static ENABLED: AtomicBool = AtomicBool::new(true);

/// Metrics configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Whether invocation metrics are recorded.
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// How an invocation settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// The last stage produced the result.
    Ok,
    /// A stage settled the result early.
    ShortCircuit,
    /// A stage failed.
    Error,
    /// The authorization gate denied the request.
    Unauthorized,
}

impl Outcome {
    /// Returns the label value for this outcome.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::ShortCircuit => "short_circuit",
            Self::Error => "error",
            Self::Unauthorized => "unauthorized",
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Applies the metrics configuration and registers metric descriptions.
pub fn init_metrics(config: &MetricsConfig) {
    ENABLED.store(config.enabled, Ordering::Relaxed);
    if config.enabled {
        register_metric_descriptions();
    }
}

/// Returns `true` if recording is enabled.
#[must_use]
pub fn is_enabled() -> bool {
    ENABLED.load(Ordering::Relaxed)
}

fn register_metric_descriptions() {
    describe_counter!(INVOCATIONS_TOTAL, "Total number of settled invocations");
    describe_histogram!(
        INVOCATION_DURATION_SECONDS,
        metrics::Unit::Seconds,
        "Time spent running an invocation's stages"
    );
    describe_counter!(
        AUTHORIZATION_DENIED_TOTAL,
        "Total requests denied by the authorization gate"
    );
}

/// Records a settled invocation.
///
/// Updates `uboss_invocations_total` and `uboss_invocation_duration_seconds`.
pub fn record_invocation(method: &str, outcome: Outcome, duration: Duration) {
    if !is_enabled() {
        return;
    }

    counter!(
        INVOCATIONS_TOTAL,
        "method" => method.to_string(),
        "outcome" => outcome.as_str()
    )
    .increment(1);

    histogram!(
        INVOCATION_DURATION_SECONDS,
        "method" => method.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Records a denial by the authorization gate.
pub fn record_authorization_denied(method: &str) {
    if !is_enabled() {
        return;
    }

    counter!(
        AUTHORIZATION_DENIED_TOTAL,
        "method" => method.to_string()
    )
    .increment(1);
}
