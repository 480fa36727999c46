//! Gateway variant without authorization.
//!
//! [`SimpleGateway`] has no ACLs, no roles and no `beforeAuth` phase. Its
//! pipelines are `beforeInvoke… → method → afterInvoke…`. `verify()`
//! cross-checks references and freezes a snapshot; `fetch()` hands out
//! pipelines from that snapshot.

use indexmap::IndexMap;
use tracing::{debug, info, instrument};
use uboss_config::{ConfigMode, ConfigSource, GatewayConfig, MethodConfig};
use uboss_core::{DuplicatePolicy, Phase, UbossError, UbossResult};
use uboss_middleware::Pipeline;

use crate::gateway::{assemble, validate_references};
use crate::load::Load;
use crate::registry::Registry;

/// Gateway without authorization.
///
/// # Example
///
/// ```
/// use serde_json::{json, Value};
/// use uboss::{Load, SimpleGateway};
/// use uboss_middleware::from_fn;
///
/// # tokio_test::block_on(async {
/// let mut gateway = SimpleGateway::new();
/// gateway
///     .load(Load::method("upper", from_fn(|v: Value| {
///         Ok(json!(v.as_str().unwrap_or_default().to_uppercase()))
///     })))
///     .unwrap()
///     .load(Load::config(json!({ "methods": { "upper": {} } })))
///     .unwrap();
///
/// gateway.verify().unwrap();
/// let upper = gateway.fetch("upper").unwrap();
/// assert_eq!(upper.invoke(json!("abc")).await.unwrap(), json!("ABC"));
/// # });
/// ```
#[derive(Debug, Default)]
pub struct SimpleGateway {
    registry: Registry,
    store: IndexMap<String, MethodConfig>,
    verified: Option<IndexMap<String, Pipeline>>,
}

impl SimpleGateway {
    /// Creates a gateway that overwrites duplicate registrations.
    #[must_use]
    pub fn new() -> Self {
        Self::with_policy(DuplicatePolicy::default())
    }

    /// Creates a gateway with the given duplicate policy.
    #[must_use]
    pub fn with_policy(duplicates: DuplicatePolicy) -> Self {
        Self {
            registry: Registry::with_policy(duplicates),
            store: IndexMap::new(),
            verified: None,
        }
    }

    /// Applies one registration. Any successful load discards the verified
    /// snapshot, so `verify()` must run again before `fetch()`.
    ///
    /// `Load::Roles` is rejected with `UnsupportedLoadOptions`; a config
    /// declaring `beforeAuth` or `acl` is a `ConfigShape` error.
    pub fn load(&mut self, load: impl Into<Load>) -> UbossResult<&mut Self> {
        let load = load.into();
        debug!(kind = load.kind(), "load");
        match load {
            Load::Methods(entries) => self.registry.register_methods(entries)?,
            Load::Middlewares(entries) => self.registry.register_middlewares(entries)?,
            Load::Roles(_) => {
                return Err(UbossError::unsupported_load(
                    "roles require a gateway with authorization",
                ))
            }
            Load::Config(source) => {
                let config = GatewayConfig::from_source(source, ConfigMode::Simple)?;
                self.store.extend(config);
            }
        }
        self.verified = None;
        Ok(self)
    }

    /// Loads a declarative configuration from `source`.
    pub fn load_config(&mut self, source: impl Into<ConfigSource>) -> UbossResult<&mut Self> {
        self.load(Load::Config(source.into()))
    }

    /// Returns the registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Cross-validates configuration against the registry and freezes the
    /// pipelines. On failure nothing is frozen.
    #[instrument(skip(self), fields(methods = self.store.len()))]
    pub fn verify(&mut self) -> UbossResult<()> {
        self.verified = None;
        validate_references(
            &self.registry,
            &self.store,
            [Phase::BeforeInvoke, Phase::AfterInvoke],
        )?;

        let mut pipelines = IndexMap::with_capacity(self.store.len());
        for (method, config) in &self.store {
            let pipeline = assemble(&self.registry, method, config, |builder| builder)?;
            pipelines.insert(method.clone(), pipeline);
        }

        info!(methods = pipelines.len(), "verified gateway");
        self.verified = Some(pipelines);
        Ok(())
    }

    /// Returns `true` if the last `verify()` succeeded and nothing was
    /// loaded since.
    pub fn is_verified(&self) -> bool {
        self.verified.is_some()
    }

    /// Returns the pipeline of a configured method.
    ///
    /// # Errors
    ///
    /// - `NotVerified` before a successful `verify()`
    /// - `NotConfigured` for a method the configuration does not name
    pub fn fetch(&self, method: &str) -> UbossResult<Pipeline> {
        let pipelines = self.verified.as_ref().ok_or(UbossError::NotVerified)?;
        pipelines
            .get(method)
            .cloned()
            .ok_or_else(|| UbossError::NotConfigured {
                name: method.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use uboss_authz::role;
    use uboss_middleware::from_fn;

    fn loaded() -> SimpleGateway {
        let mut gateway = SimpleGateway::new();
        gateway
            .load(Load::method("increase", from_fn(|n: Value| Ok(json!(n.as_i64().unwrap_or(0) + 1)))))
            .unwrap()
            .load(Load::middleware("double", from_fn(|n: Value| Ok(json!(n.as_i64().unwrap_or(0) * 2)))))
            .unwrap()
            .load_config(json!({
                "methods": {
                    "increase": { "middlewares": { "beforeInvoke": ["double"], "afterInvoke": ["double"] } }
                }
            }))
            .unwrap();
        gateway
    }

    #[tokio::test]
    async fn test_verify_then_fetch() {
        let mut gateway = loaded();
        gateway.verify().unwrap();

        let pipeline = gateway.fetch("increase").unwrap();
        assert_eq!(pipeline.stage_names(), vec!["double", "increase", "double"]);
        assert_eq!(pipeline.invoke(json!(3)).await.unwrap(), json!(14));
    }

    #[test]
    fn test_fetch_before_verify() {
        let gateway = loaded();
        assert!(matches!(gateway.fetch("increase"), Err(UbossError::NotVerified)));
    }

    #[test]
    fn test_fetch_unconfigured() {
        let mut gateway = loaded();
        gateway.verify().unwrap();
        let err = gateway.fetch("upper").unwrap_err();
        assert_eq!(err.to_string(), "method upper is not configured");
    }

    #[test]
    fn test_load_invalidates_verification() {
        let mut gateway = loaded();
        gateway.verify().unwrap();
        gateway.load(Load::middleware("noop", from_fn(Ok))).unwrap();
        assert!(!gateway.is_verified());
    }

    #[test]
    fn test_verify_missing_references() {
        let mut gateway = loaded();
        gateway
            .load_config(json!({ "methods": { "increase": { "middlewares": { "afterInvoke": ["audit"] } } } }))
            .unwrap();
        let err = gateway.verify().unwrap_err();
        assert_eq!(err.to_string(), "middleware audit has not been loaded");
        assert!(!gateway.is_verified());

        gateway.load_config(json!({ "methods": { "upper": {} } })).unwrap();
        let err = gateway.verify().unwrap_err();
        assert_eq!(err.to_string(), "method upper has not been loaded");
    }

    #[test]
    fn test_authorization_concepts_rejected() {
        let mut gateway = SimpleGateway::new();
        let err = gateway
            .load(Load::role("admin", role::predicate(|_| true)))
            .unwrap_err();
        assert!(matches!(err, UbossError::UnsupportedLoadOptions { .. }));

        let err = gateway
            .load_config(json!({ "methods": { "m": { "acl": { "roles": ["admin"] } } } }))
            .unwrap_err();
        assert!(matches!(err, UbossError::ConfigShape { .. }));

        let err = gateway
            .load_config(json!({ "methods": { "m": { "middlewares": { "beforeAuth": ["x"] } } } }))
            .unwrap_err();
        assert!(matches!(err, UbossError::ConfigShape { .. }));
    }
}
