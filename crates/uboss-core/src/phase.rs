//! Middleware phases.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An ordered middleware slot around the authorization gate and the method.
///
/// ```text
/// beforeAuth* → [gate] → beforeInvoke* → [method] → afterInvoke*
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    /// Runs before the authorization gate.
    BeforeAuth,
    /// Runs after the gate, before the method.
    BeforeInvoke,
    /// Runs after the method, receiving its output.
    AfterInvoke,
}

impl Phase {
    /// Returns all phases in pipeline order.
    #[must_use]
    pub const fn all() -> [Phase; 3] {
        [Self::BeforeAuth, Self::BeforeInvoke, Self::AfterInvoke]
    }

    /// Returns the name used in declarative config.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BeforeAuth => "beforeAuth",
            Self::BeforeInvoke => "beforeInvoke",
            Self::AfterInvoke => "afterInvoke",
        }
    }

    /// Parses a config key into a phase.
    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        Self::all().into_iter().find(|phase| phase.as_str() == key)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
