//! Role based rules.
//!
//! A [`Role`] is a named predicate over request metadata. A [`RoleRule`]
//! references roles by name and grants access if any of them does. Role
//! predicates are user code: an error or a panic inside one is logged and
//! counts as `false` for that role only.

use indexmap::IndexSet;
use serde_json::Value;
use std::collections::HashMap;
use std::hash::BuildHasher;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::warn;

/// A named authorization predicate over request metadata.
///
/// Closures of shape `Fn(&Value) -> anyhow::Result<bool>` implement this
/// trait; use [`predicate`] for infallible closures.
pub trait Role: Send + Sync + 'static {
    /// Decides whether the metadata satisfies this role.
    fn evaluate(&self, metadata: &Value) -> anyhow::Result<bool>;
}

impl<F> Role for F
where
    F: Fn(&Value) -> anyhow::Result<bool> + Send + Sync + 'static,
{
    fn evaluate(&self, metadata: &Value) -> anyhow::Result<bool> {
        self(metadata)
    }
}

/// Wraps an infallible closure as a [`Role`].
///
/// ```
/// use serde_json::json;
/// use uboss_authz::role::{self, Role};
///
/// let admin = role::predicate(|m| m["requestor"] == json!("admin"));
/// assert!(admin.evaluate(&json!({ "requestor": "admin" })).unwrap());
/// ```
pub fn predicate<F>(f: F) -> impl Role
where
    F: Fn(&Value) -> bool + Send + Sync + 'static,
{
    move |metadata: &Value| -> anyhow::Result<bool> { Ok(f(metadata)) }
}

/// Wraps a fallible closure as a [`Role`].
pub fn fallible<F>(f: F) -> impl Role
where
    F: Fn(&Value) -> anyhow::Result<bool> + Send + Sync + 'static,
{
    move |metadata: &Value| f(metadata)
}

/// Resolves role names to predicates.
pub trait RoleLookup {
    /// Returns the role registered under `name`.
    fn role(&self, name: &str) -> Option<&dyn Role>;
}

impl<S: BuildHasher> RoleLookup for HashMap<String, Arc<dyn Role>, S> {
    fn role(&self, name: &str) -> Option<&dyn Role> {
        self.get(name).map(|role| &**role)
    }
}

impl<S: BuildHasher> RoleLookup for indexmap::IndexMap<String, Arc<dyn Role>, S> {
    fn role(&self, name: &str) -> Option<&dyn Role> {
        self.get(name).map(|role| &**role)
    }
}

/// Runs one role predicate, coercing errors and panics to `false`.
pub(crate) fn evaluate_role(name: &str, role: &dyn Role, metadata: &Value) -> bool {
    match catch_unwind(AssertUnwindSafe(|| role.evaluate(metadata))) {
        Ok(Ok(granted)) => granted,
        Ok(Err(err)) => {
            warn!(role = name, error = %err, "role predicate failed, treating as denied");
            false
        }
        Err(_) => {
            warn!(role = name, "role predicate panicked, treating as denied");
            false
        }
    }
}

/// Grants access if any of the named roles does.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleRule {
    names: IndexSet<String>,
}

impl RoleRule {
    /// Creates a rule over the given role names, keeping first-seen order.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns the referenced role names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// Returns `true` if no role is referenced.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Evaluates the rule: OR over the referenced roles.
    ///
    /// A name the lookup cannot resolve counts as `false`; composition
    /// guarantees this does not happen for composed pipelines.
    pub fn evaluate<L>(&self, metadata: &Value, roles: &L) -> bool
    where
        L: RoleLookup + ?Sized,
    {
        self.names.iter().any(|name| {
            roles
                .role(name)
                .is_some_and(|role| evaluate_role(name, role, metadata))
        })
    }
}
