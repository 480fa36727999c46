//! Deployment policies.
//!
//! uboss historically shipped two incompatible behaviours for duplicate
//! registrations and for methods without ACL rules. Both are explicit
//! settings chosen per deployment.

use serde::{Deserialize, Serialize};

/// What happens when a name is registered a second time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// The later registration replaces the earlier one.
    #[default]
    Overwrite,
    /// The second registration fails with `DuplicateRegistration`.
    Reject,
}

/// The decision taken for a method that has no ACL rule bound to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultDecision {
    /// Unprotected methods are callable by anyone.
    #[default]
    Allow,
    /// Unprotected methods are denied.
    Deny,
}

impl DefaultDecision {
    /// Returns the decision as a boolean grant.
    #[must_use]
    pub const fn is_allow(self) -> bool {
        matches!(self, Self::Allow)
    }
}
