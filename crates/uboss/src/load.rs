//! Typed registration requests.

use std::fmt;
use std::sync::Arc;

use uboss_authz::Role;
use uboss_config::ConfigSource;
use uboss_middleware::Middleware;

use crate::registry::{SharedRole, SharedStage};

/// One call to [`Gateway::load`](crate::Gateway::load).
///
/// Each variant carries one kind of registration, so the kind is fixed at
/// the call site. [`Load::method`], [`Load::middleware`] and [`Load::role`]
/// start a batch of that kind; a batch only accepts more entries of the
/// same kind and converts into a `Load` when it is loaded.
///
/// # Example
///
/// ```
/// use serde_json::json;
/// use uboss::{Gateway, Load};
/// use uboss_authz::role;
/// use uboss_middleware::from_fn;
///
/// let mut gateway = Gateway::new();
/// gateway
///     .load(Load::method("echo", from_fn(Ok)))
///     .unwrap()
///     .load(Load::middleware("trace", from_fn(Ok)).and_middleware("audit", from_fn(Ok)))
///     .unwrap()
///     .load(Load::role("admin", role::predicate(|m| m["admin"] == json!(true))))
///     .unwrap()
///     .load(Load::config(json!({ "methods": { "echo": {} } })))
///     .unwrap();
/// ```
pub enum Load {
    /// Named target methods.
    Methods(Vec<(String, SharedStage)>),
    /// Named middlewares.
    Middlewares(Vec<(String, SharedStage)>),
    /// Named role predicates.
    Roles(Vec<(String, SharedRole)>),
    /// A declarative configuration document.
    Config(ConfigSource),
}

impl Load {
    /// Starts a batch of methods.
    pub fn method(name: impl Into<String>, method: impl Middleware) -> MethodBatch {
        MethodBatch(Vec::new()).and_method(name, method)
    }

    /// Starts a batch of middlewares.
    pub fn middleware(name: impl Into<String>, middleware: impl Middleware) -> MiddlewareBatch {
        MiddlewareBatch(Vec::new()).and_middleware(name, middleware)
    }

    /// Starts a batch of roles.
    pub fn role(name: impl Into<String>, role: impl Role) -> RoleBatch {
        RoleBatch(Vec::new()).and_role(name, role)
    }

    /// A declarative configuration.
    pub fn config(source: impl Into<ConfigSource>) -> Self {
        Self::Config(source.into())
    }

    /// Short label of the variant, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Methods(_) => "methods",
            Self::Middlewares(_) => "middlewares",
            Self::Roles(_) => "roles",
            Self::Config(_) => "config",
        }
    }
}

/// Methods registered together by one [`Load`].
pub struct MethodBatch(Vec<(String, SharedStage)>);

impl MethodBatch {
    /// Adds another method.
    #[must_use]
    pub fn and_method(mut self, name: impl Into<String>, method: impl Middleware) -> Self {
        self.0.push((name.into(), Arc::new(method) as SharedStage));
        self
    }
}

/// Middlewares registered together by one [`Load`].
///
/// Only middlewares can be added to it:
///
/// ```compile_fail
/// use uboss::Load;
/// use uboss_middleware::from_fn;
///
/// let _ = Load::middleware("inc", from_fn(Ok)).and_method("increase", from_fn(Ok));
/// ```
pub struct MiddlewareBatch(Vec<(String, SharedStage)>);

impl MiddlewareBatch {
    /// Adds another middleware.
    #[must_use]
    pub fn and_middleware(mut self, name: impl Into<String>, middleware: impl Middleware) -> Self {
        self.0.push((name.into(), Arc::new(middleware) as SharedStage));
        self
    }
}

/// Roles registered together by one [`Load`].
pub struct RoleBatch(Vec<(String, SharedRole)>);

impl RoleBatch {
    /// Adds another role.
    #[must_use]
    pub fn and_role(mut self, name: impl Into<String>, role: impl Role) -> Self {
        self.0.push((name.into(), Arc::new(role) as SharedRole));
        self
    }
}

impl From<MethodBatch> for Load {
    fn from(batch: MethodBatch) -> Self {
        Self::Methods(batch.0)
    }
}

impl From<MiddlewareBatch> for Load {
    fn from(batch: MiddlewareBatch) -> Self {
        Self::Middlewares(batch.0)
    }
}

impl From<RoleBatch> for Load {
    fn from(batch: RoleBatch) -> Self {
        Self::Roles(batch.0)
    }
}

fn names<T: ?Sized>(entries: &[(String, Arc<T>)]) -> Vec<&str> {
    entries.iter().map(|(name, _)| name.as_str()).collect()
}

impl fmt::Debug for Load {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Methods(entries) => f.debug_tuple("Methods").field(&names(entries)).finish(),
            Self::Middlewares(entries) => f.debug_tuple("Middlewares").field(&names(entries)).finish(),
            Self::Roles(entries) => f.debug_tuple("Roles").field(&names(entries)).finish(),
            Self::Config(source) => f.debug_tuple("Config").field(source).finish(),
        }
    }
}

impl fmt::Debug for MethodBatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("MethodBatch").field(&names(&self.0)).finish()
    }
}

impl fmt::Debug for MiddlewareBatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("MiddlewareBatch").field(&names(&self.0)).finish()
    }
}

impl fmt::Debug for RoleBatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RoleBatch").field(&names(&self.0)).finish()
    }
}
