//! Standalone synchronous ACL evaluator.
//!
//! [`AclEvaluator`] answers "may this request call this method?" without
//! running any pipeline. Methods, ACL rules and roles are loaded first;
//! [`AclEvaluator::ready`] then cross-checks them once, after which
//! [`AclEvaluator::exec`] is a pure function of its request.

use std::fmt;
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument};
use uboss_core::{DefaultDecision, DuplicatePolicy, EntryKind, UbossError, UbossResult};

use crate::acl::AclRule;
use crate::role::Role;

/// Policies for the standalone evaluator.
///
/// The defaults are stricter than the pipeline's: every method must be
/// protected, anything else is denied, and names cannot be loaded twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluatorSettings {
    /// Fail `ready()` when a method has no ACL rule bound to it.
    pub require_acl: bool,
    /// Decision for methods without a bound ACL rule.
    pub default_decision: DefaultDecision,
    /// Handling of repeated method and role names.
    pub duplicates: DuplicatePolicy,
}

impl Default for EvaluatorSettings {
    fn default() -> Self {
        Self {
            require_acl: true,
            default_decision: DefaultDecision::Deny,
            duplicates: DuplicatePolicy::Reject,
        }
    }
}

/// One registration accepted by [`AclEvaluator::load`].
pub enum AclLoad {
    /// A method name that may be queried.
    Method(String),
    /// An ACL rule bound to one or more methods.
    Acl(AclRule),
    /// A named role predicate.
    Role(String, Arc<dyn Role>),
}

impl AclLoad {
    /// Creates a method registration.
    pub fn method(name: impl Into<String>) -> Self {
        Self::Method(name.into())
    }

    /// Creates a role registration.
    pub fn role(name: impl Into<String>, role: impl Role) -> Self {
        Self::Role(name.into(), Arc::new(role))
    }
}

impl From<AclRule> for AclLoad {
    fn from(acl: AclRule) -> Self {
        Self::Acl(acl)
    }
}

impl fmt::Debug for AclLoad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Method(name) => f.debug_tuple("Method").field(name).finish(),
            Self::Acl(acl) => f.debug_tuple("Acl").field(acl).finish(),
            Self::Role(name, _) => f.debug_tuple("Role").field(name).finish(),
        }
    }
}

/// A single authorization query.
#[derive(Debug, Clone, Copy)]
pub struct AclRequest<'a> {
    /// The method being called.
    pub method: &'a str,
    /// The request metadata the rules are evaluated against.
    pub metadata: &'a Value,
}

impl<'a> AclRequest<'a> {
    /// Creates a query.
    pub const fn new(method: &'a str, metadata: &'a Value) -> Self {
        Self { method, metadata }
    }
}

/// Synchronous evaluator over loaded methods, ACL rules and roles.
///
/// # Example
///
/// ```
/// use serde_json::json;
/// use uboss_authz::{role, AclEvaluator, AclLoad, AclRequest, AclRule};
///
/// let mut evaluator = AclEvaluator::new();
/// evaluator.load(AclLoad::method("increase")).unwrap();
/// evaluator.load(AclLoad::role("admin", role::predicate(|m| m["user"] == json!("root")))).unwrap();
/// evaluator.load(AclRule::for_method("increase").roles(["admin"]).into()).unwrap();
/// evaluator.ready().unwrap();
///
/// let metadata = json!({ "user": "root" });
/// assert!(evaluator.exec(AclRequest::new("increase", &metadata)).unwrap());
/// ```
pub struct AclEvaluator {
    settings: EvaluatorSettings,
    methods: IndexSet<String>,
    acls: Vec<AclRule>,
    roles: IndexMap<String, Arc<dyn Role>>,
    ready: bool,
}

impl AclEvaluator {
    /// Creates an evaluator with default settings.
    pub fn new() -> Self {
        Self::with_settings(EvaluatorSettings::default())
    }

    /// Creates an evaluator with explicit settings.
    pub fn with_settings(settings: EvaluatorSettings) -> Self {
        Self {
            settings,
            methods: IndexSet::new(),
            acls: Vec::new(),
            roles: IndexMap::new(),
            ready: false,
        }
    }

    /// Returns the settings.
    pub const fn settings(&self) -> &EvaluatorSettings {
        &self.settings
    }

    /// Registers a method, an ACL rule or a role.
    ///
    /// Any load invalidates a previous `ready()`.
    ///
    /// # Errors
    ///
    /// `InvalidName` for an empty name, `DuplicateRegistration` for a repeated
    /// name under [`DuplicatePolicy::Reject`], and `ConfigShape` for an ACL
    /// rule bound to no method.
    pub fn load(&mut self, entry: AclLoad) -> UbossResult<()> {
        match entry {
            AclLoad::Method(name) => {
                self.check_name(EntryKind::Method, &name, self.methods.contains(&name))?;
                self.methods.insert(name);
            }
            AclLoad::Acl(acl) => {
                if acl.methods().next().is_none() {
                    return Err(UbossError::config_shape(
                        "acl",
                        "acl rule must be bound to at least one method",
                    ));
                }
                self.acls.push(acl);
            }
            AclLoad::Role(name, role) => {
                self.check_name(EntryKind::Role, &name, self.roles.contains_key(&name))?;
                self.roles.insert(name, role);
            }
        }
        self.ready = false;
        Ok(())
    }

    fn check_name(&self, kind: EntryKind, name: &str, exists: bool) -> UbossResult<()> {
        if name.is_empty() {
            return Err(UbossError::invalid_name(kind, name));
        }
        if exists && self.settings.duplicates == DuplicatePolicy::Reject {
            return Err(UbossError::duplicate(kind, name));
        }
        Ok(())
    }

    /// Cross-checks the loaded entries.
    ///
    /// # Errors
    ///
    /// `MissingMethod` when an ACL rule is bound to an unknown method,
    /// `MissingRole` when an ACL rule references an unknown role, and
    /// `UnprotectedMethod` when `require_acl` is set and a method has no rule.
    #[instrument(skip(self), fields(methods = self.methods.len(), acls = self.acls.len()))]
    pub fn ready(&mut self) -> UbossResult<()> {
        self.ready = false;

        for acl in &self.acls {
            if let Some(method) = acl.methods().find(|m| !self.methods.contains(*m)) {
                return Err(UbossError::missing_method(method));
            }
            if let Some(role) = acl.role_names().find(|r| !self.roles.contains_key(*r)) {
                let method = acl.methods().next().unwrap_or_default();
                return Err(UbossError::missing_role(role, method));
            }
        }

        if self.settings.require_acl {
            if let Some(method) = self
                .methods
                .iter()
                .find(|m| !self.acls.iter().any(|acl| acl.is_bound_to(m)))
            {
                return Err(UbossError::UnprotectedMethod {
                    name: method.clone(),
                });
            }
        }

        self.ready = true;
        debug!("acl evaluator ready");
        Ok(())
    }

    /// Returns `true` once `ready()` succeeded and nothing was loaded since.
    pub const fn is_ready(&self) -> bool {
        self.ready
    }

    /// Decides a request.
    ///
    /// Denial is `Ok(false)`, never an error.
    ///
    /// # Errors
    ///
    /// `NotReady` before a successful `ready()`, `MissingMethod` for an
    /// unknown method.
    pub fn exec(&self, request: AclRequest<'_>) -> UbossResult<bool> {
        if !self.ready {
            return Err(UbossError::NotReady);
        }
        if !self.methods.contains(request.method) {
            return Err(UbossError::missing_method(request.method));
        }
        Ok(self.is_authorized(request.method, request.metadata))
    }

    /// OR over every ACL rule bound to `method`, or the default decision when
    /// none is bound. Does not require `ready()`.
    pub fn is_authorized(&self, method: &str, metadata: &Value) -> bool {
        let mut bound = self.acls.iter().filter(|acl| acl.is_bound_to(method)).peekable();
        if bound.peek().is_none() {
            return self.settings.default_decision.is_allow();
        }
        bound.any(|acl| acl.evaluate(metadata, &self.roles))
    }

    /// Returns the loaded method names in load order.
    pub fn methods(&self) -> impl Iterator<Item = &str> {
        self.methods.iter().map(String::as_str)
    }

    /// Returns the ACL rules bound to `method`.
    pub fn acl<'a>(&'a self, method: &'a str) -> impl Iterator<Item = &'a AclRule> + 'a {
        self.acls.iter().filter(move |acl| acl.is_bound_to(method))
    }

    /// Returns the loaded role names in load order.
    pub fn roles(&self) -> impl Iterator<Item = &str> {
        self.roles.keys().map(String::as_str)
    }
}

impl Default for AclEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for AclEvaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AclEvaluator")
            .field("settings", &self.settings)
            .field("methods", &self.methods)
            .field("acls", &self.acls)
            .field("roles", &self.roles.keys().collect::<Vec<_>>())
            .field("ready", &self.ready)
            .finish()
    }
}
