//! Named methods, middlewares and roles.
//!
//! The registry is the mutable half of a gateway. Composition copies the
//! `Arc`s it needs out of it, so later registrations never reach an already
//! composed API.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::debug;
use uboss_authz::Role;
use uboss_core::{DuplicatePolicy, EntryKind, UbossError, UbossResult};
use uboss_middleware::Middleware;

/// A registered method or middleware.
pub type SharedStage = Arc<dyn Middleware>;

/// A registered role predicate.
pub type SharedRole = Arc<dyn Role>;

/// Registry of named methods, middlewares and roles.
///
/// Names are unique per kind. A repeated name either replaces the earlier
/// entry in place or is rejected, depending on the [`DuplicatePolicy`].
///
/// # Example
///
/// ```
/// use serde_json::{json, Value};
/// use uboss::Registry;
/// use uboss_middleware::from_fn;
///
/// let mut registry = Registry::new();
/// registry
///     .register_method("increase", from_fn(|n: Value| Ok(json!(n.as_i64().unwrap_or(0) + 1))))
///     .unwrap();
///
/// assert!(registry.method("increase").is_some());
/// assert!(registry.register_method("", from_fn(Ok)).is_err());
/// ```
pub struct Registry {
    duplicates: DuplicatePolicy,
    methods: IndexMap<String, SharedStage>,
    middlewares: IndexMap<String, SharedStage>,
    roles: IndexMap<String, SharedRole>,
}

impl Registry {
    /// Creates an empty registry that overwrites duplicates.
    #[must_use]
    pub fn new() -> Self {
        Self::with_policy(DuplicatePolicy::default())
    }

    /// Creates an empty registry with the given duplicate policy.
    #[must_use]
    pub fn with_policy(duplicates: DuplicatePolicy) -> Self {
        Self {
            duplicates,
            methods: IndexMap::new(),
            middlewares: IndexMap::new(),
            roles: IndexMap::new(),
        }
    }

    /// Returns the duplicate policy.
    pub fn policy(&self) -> DuplicatePolicy {
        self.duplicates
    }

    /// Registers a method.
    pub fn register_method(&mut self, name: impl Into<String>, method: impl Middleware) -> UbossResult<()> {
        self.register_methods(vec![(name.into(), Arc::new(method) as SharedStage)])
    }

    /// Registers a middleware.
    pub fn register_middleware(
        &mut self,
        name: impl Into<String>,
        middleware: impl Middleware,
    ) -> UbossResult<()> {
        self.register_middlewares(vec![(name.into(), Arc::new(middleware) as SharedStage)])
    }

    /// Registers a role predicate.
    pub fn register_role(&mut self, name: impl Into<String>, role: impl Role) -> UbossResult<()> {
        self.register_roles(vec![(name.into(), Arc::new(role) as SharedRole)])
    }

    /// Registers a batch of methods; nothing is registered if any entry is invalid.
    pub fn register_methods(&mut self, entries: Vec<(String, SharedStage)>) -> UbossResult<()> {
        insert_all(&mut self.methods, EntryKind::Method, entries, self.duplicates)
    }

    /// Registers a batch of middlewares; nothing is registered if any entry is invalid.
    pub fn register_middlewares(&mut self, entries: Vec<(String, SharedStage)>) -> UbossResult<()> {
        insert_all(&mut self.middlewares, EntryKind::Middleware, entries, self.duplicates)
    }

    /// Registers a batch of roles; nothing is registered if any entry is invalid.
    pub fn register_roles(&mut self, entries: Vec<(String, SharedRole)>) -> UbossResult<()> {
        insert_all(&mut self.roles, EntryKind::Role, entries, self.duplicates)
    }

    /// Looks up a method.
    pub fn method(&self, name: &str) -> Option<&SharedStage> {
        self.methods.get(name)
    }

    /// Looks up a middleware.
    pub fn middleware(&self, name: &str) -> Option<&SharedStage> {
        self.middlewares.get(name)
    }

    /// Looks up a role.
    pub fn role(&self, name: &str) -> Option<&SharedRole> {
        self.roles.get(name)
    }

    /// Method names in first-registration order.
    pub fn method_names(&self) -> impl Iterator<Item = &str> {
        self.methods.keys().map(String::as_str)
    }

    /// Middleware names in first-registration order.
    pub fn middleware_names(&self) -> impl Iterator<Item = &str> {
        self.middlewares.keys().map(String::as_str)
    }

    /// Role names in first-registration order.
    pub fn role_names(&self) -> impl Iterator<Item = &str> {
        self.roles.keys().map(String::as_str)
    }

    /// Copies the current role table.
    pub(crate) fn roles_snapshot(&self) -> IndexMap<String, SharedRole> {
        self.roles.clone()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("duplicates", &self.duplicates)
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .field("middlewares", &self.middlewares.keys().collect::<Vec<_>>())
            .field("roles", &self.roles.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn insert_all<T: ?Sized>(
    map: &mut IndexMap<String, Arc<T>>,
    kind: EntryKind,
    entries: Vec<(String, Arc<T>)>,
    duplicates: DuplicatePolicy,
) -> UbossResult<()> {
    for (index, (name, _)) in entries.iter().enumerate() {
        if name.is_empty() {
            return Err(UbossError::invalid_name(kind, name.as_str()));
        }
        if duplicates == DuplicatePolicy::Reject
            && (map.contains_key(name) || entries[..index].iter().any(|(seen, _)| seen == name))
        {
            return Err(UbossError::duplicate(kind, name.as_str()));
        }
    }

    for (name, value) in entries {
        if map.insert(name.clone(), value).is_some() {
            debug!(kind = %kind, name = %name, "replaced earlier registration");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use uboss_authz::role;
    use uboss_core::ErrorCategory;
    use uboss_middleware::{from_fn, StageContext};

    fn constant(value: i64) -> SharedStage {
        Arc::new(from_fn(move |_| Ok(json!(value))))
    }

    async fn run(stage: &SharedStage) -> Value {
        stage
            .process(StageContext::detached(Value::Null))
            .resolve()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_overwrite_keeps_last_registration() {
        let mut registry = Registry::new();
        registry.register_methods(vec![("m".into(), constant(1))]).unwrap();
        registry.register_methods(vec![("m".into(), constant(2))]).unwrap();

        assert_eq!(run(registry.method("m").unwrap()).await, json!(2));
        assert_eq!(registry.method_names().collect::<Vec<_>>(), vec!["m"]);
    }

    #[test]
    fn test_reject_policy() {
        let mut registry = Registry::with_policy(DuplicatePolicy::Reject);
        registry.register_role("admin", role::predicate(|_| true)).unwrap();

        let err = registry
            .register_role("admin", role::predicate(|_| false))
            .unwrap_err();
        assert_eq!(err.to_string(), "role admin has already been loaded");
        assert_eq!(err.category(), ErrorCategory::Registration);
    }

    #[test]
    fn test_reject_policy_within_batch_is_atomic() {
        let mut registry = Registry::with_policy(DuplicatePolicy::Reject);
        let err = registry
            .register_middlewares(vec![
                ("a".into(), constant(1)),
                ("b".into(), constant(2)),
                ("a".into(), constant(3)),
            ])
            .unwrap_err();

        assert!(matches!(err, UbossError::DuplicateRegistration { .. }));
        assert_eq!(registry.middleware_names().count(), 0);
    }

    #[test]
    fn test_empty_name_rejected_atomically() {
        let mut registry = Registry::new();
        let err = registry
            .register_methods(vec![("ok".into(), constant(1)), (String::new(), constant(2))])
            .unwrap_err();

        assert!(matches!(err, UbossError::InvalidName { kind: EntryKind::Method, .. }));
        assert!(registry.method("ok").is_none());
    }

    #[test]
    fn test_kinds_are_separate_namespaces() {
        let mut registry = Registry::with_policy(DuplicatePolicy::Reject);
        registry.register_method("increase", from_fn(Ok)).unwrap();
        registry.register_middleware("increase", from_fn(Ok)).unwrap();

        assert!(registry.method("increase").is_some());
        assert!(registry.middleware("increase").is_some());
        assert!(registry.role("increase").is_none());
    }

    #[test]
    fn test_debug_lists_names() {
        let mut registry = Registry::new();
        registry.register_method("increase", from_fn(Ok)).unwrap();
        let debug = format!("{registry:?}");
        assert!(debug.contains("increase"));
    }
}
