//! Authorization gate stage.
//!
//! The gate evaluates the method's ACL rule against `value.metadata` and
//! either passes the value through unchanged or fails the invocation with
//! `Unauthorized` (status 403).
//!
//! # Pipeline Position
//!
//! ```text
//! request → beforeAuth… → [authorization] → beforeInvoke… → method → afterInvoke…
//! ```
//!
//! A method without an ACL rule gets the configured [`DefaultDecision`].
//! Evaluation never fails: missing metadata, type mismatches and failing
//! role predicates all count as "not granted".

use crate::context::StageContext;
use crate::middleware::{Middleware, StageOutput};
use std::fmt;
use std::sync::Arc;
use tracing::debug;
use uboss_authz::{AclRule, RoleLookup};
use uboss_core::{DefaultDecision, UbossError};
use uboss_telemetry::metrics;

/// Role lookup shared by every gate of one composed API.
pub type SharedRoles = Arc<dyn RoleLookup + Send + Sync>;

/// The authorization stage for one method.
///
/// # Example
///
/// ```
/// use std::collections::HashMap;
/// use std::sync::Arc;
/// use serde_json::json;
/// use uboss_authz::{AclRule, AttributeRule, Role};
/// use uboss_core::DefaultDecision;
/// use uboss_middleware::{AuthorizationGate, Middleware, StageContext};
///
/// let roles: HashMap<String, Arc<dyn Role>> = HashMap::new();
/// let acl = AclRule::for_method("increase")
///     .attribute(AttributeRule::equal("requestor", json!("admin")));
/// let gate = AuthorizationGate::new(Some(acl), Arc::new(roles), DefaultDecision::Allow);
///
/// # tokio_test::block_on(async {
/// let allowed = StageContext::detached(json!({ "metadata": { "requestor": "admin" } }));
/// assert!(gate.process(allowed).resolve().await.is_ok());
///
/// let denied = StageContext::detached(json!({ "metadata": { "requestor": "guest" } }));
/// assert!(gate.process(denied).resolve().await.unwrap_err().is_unauthorized());
/// # });
/// ```
pub struct AuthorizationGate {
    acl: Option<AclRule>,
    roles: SharedRoles,
    default_decision: DefaultDecision,
}

impl AuthorizationGate {
    /// Creates a gate for one method.
    ///
    /// `acl` is the rule bound to the method, if any. `roles` must resolve
    /// every role the rule references.
    pub fn new(acl: Option<AclRule>, roles: SharedRoles, default_decision: DefaultDecision) -> Self {
        Self {
            acl,
            roles,
            default_decision,
        }
    }

    /// Returns the ACL rule this gate enforces.
    pub const fn acl(&self) -> Option<&AclRule> {
        self.acl.as_ref()
    }

    /// Evaluates the gate against request metadata.
    pub fn is_authorized(&self, metadata: &serde_json::Value) -> bool {
        match &self.acl {
            Some(acl) => acl.evaluate(metadata, &*self.roles),
            None => self.default_decision.is_allow(),
        }
    }
}

impl Middleware for AuthorizationGate {
    fn process(&self, ctx: StageContext) -> StageOutput {
        if self.is_authorized(ctx.metadata()) {
            debug!(method = ctx.method(), "Authorization granted");
            return StageOutput::ready(ctx.into_value());
        }

        debug!(method = ctx.method(), "Authorization denied");
        metrics::record_authorization_denied(ctx.method());
        StageOutput::fail(UbossError::unauthorized(ctx.method()))
    }
}

impl fmt::Debug for AuthorizationGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizationGate")
            .field("acl", &self.acl)
            .field("default_decision", &self.default_decision)
            .finish_non_exhaustive()
    }
}
