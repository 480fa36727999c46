//! ACL rules.
//!
//! An [`AclRule`] binds one or more methods to a set of attribute and role
//! rules. It grants access if any contained rule does; a rule set with no
//! rules at all grants unconditionally.

use indexmap::IndexSet;
use serde_json::Value;

use crate::attribute::AttributeRule;
use crate::role::{RoleLookup, RoleRule};

/// Binds methods to attribute and role rules, OR-combined.
///
/// # Example
///
/// ```
/// use std::collections::HashMap;
/// use std::sync::Arc;
/// use serde_json::json;
/// use uboss_authz::{AclRule, AttributeRule, Role};
///
/// let acl = AclRule::for_method("increase")
///     .attribute(AttributeRule::include("requestor.tags", json!("admin")));
/// let roles: HashMap<String, Arc<dyn Role>> = HashMap::new();
///
/// assert!(acl.is_bound_to("increase"));
/// assert!(acl.evaluate(&json!({ "requestor": { "tags": ["admin", "x"] } }), &roles));
/// assert!(!acl.evaluate(&json!({ "requestor": { "tags": ["x"] } }), &roles));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AclRule {
    methods: IndexSet<String>,
    attributes: Vec<AttributeRule>,
    role_rules: Vec<RoleRule>,
}

impl AclRule {
    /// Creates an unbound rule set with no rules.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a rule set bound to one method.
    pub fn for_method(method: impl Into<String>) -> Self {
        Self::new().method(method)
    }

    /// Creates a rule set bound to several methods.
    pub fn for_methods<I, S>(methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        methods
            .into_iter()
            .fold(Self::new(), |acl, method| acl.method(method))
    }

    /// Binds another method.
    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.methods.insert(method.into());
        self
    }

    /// Adds an attribute rule.
    pub fn attribute(mut self, rule: AttributeRule) -> Self {
        self.attributes.push(rule);
        self
    }

    /// Adds a role rule.
    pub fn role_rule(mut self, rule: RoleRule) -> Self {
        self.role_rules.push(rule);
        self
    }

    /// Adds a role rule over the given role names.
    pub fn roles<I, S>(self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.role_rule(RoleRule::new(names))
    }

    /// Returns the bound method names.
    pub fn methods(&self) -> impl Iterator<Item = &str> {
        self.methods.iter().map(String::as_str)
    }

    /// Returns `true` if this rule set applies to `method`.
    pub fn is_bound_to(&self, method: &str) -> bool {
        self.methods.contains(method)
    }

    /// Returns the attribute rules.
    pub fn attributes(&self) -> &[AttributeRule] {
        &self.attributes
    }

    /// Returns the role rules.
    pub fn role_rules(&self) -> &[RoleRule] {
        &self.role_rules
    }

    /// Returns every role name referenced by the role rules, in order.
    pub fn role_names(&self) -> impl Iterator<Item = &str> {
        self.role_rules.iter().flat_map(|rule| rule.names())
    }

    /// Returns `true` if the rule set contains no rules.
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty() && self.role_rules.is_empty()
    }

    /// Evaluates the rule set: OR across all contained rules.
    ///
    /// An empty rule set grants access.
    pub fn evaluate<L>(&self, metadata: &Value, roles: &L) -> bool
    where
        L: RoleLookup + ?Sized,
    {
        if self.is_empty() {
            return true;
        }

        self.attributes.iter().any(|rule| rule.evaluate(metadata))
            || self
                .role_rules
                .iter()
                .any(|rule| rule.evaluate(metadata, roles))
    }
}
