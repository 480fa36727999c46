//! The gateway: registration, cross-validation and composition.

use std::sync::Arc;

use indexmap::IndexMap;
use tracing::{debug, info, instrument};
use uboss_config::{
    AuthorizationSettings, ConfigMode, ConfigSource, GatewayConfig, MethodConfig, UbossConfig,
};
use uboss_core::{DefaultDecision, DuplicatePolicy, Phase, UbossError, UbossResult};
use uboss_middleware::{AuthorizationGate, Pipeline, PipelineBuilder, SharedRoles};

use crate::api::ComposedApi;
use crate::load::Load;
use crate::registry::Registry;

/// Registry plus per-method configuration, composed into a [`ComposedApi`].
///
/// Every composed pipeline has the shape
///
/// ```text
/// beforeAuth… → authorization → beforeInvoke… → method → afterInvoke…
/// ```
///
/// # Example
///
/// ```
/// use serde_json::{json, Value};
/// use uboss::{Gateway, Load};
/// use uboss_middleware::from_fn;
///
/// # tokio_test::block_on(async {
/// let mut gateway = Gateway::new();
/// gateway
///     .load(Load::method("increase", from_fn(|n: Value| Ok(json!(n.as_i64().unwrap_or(0) + 1)))))
///     .unwrap()
///     .load(Load::config(json!({ "methods": { "increase": {} } })))
///     .unwrap();
///
/// let api = gateway.compose().unwrap();
/// assert_eq!(api.invoke("increase", json!(1)).await.unwrap(), json!(2));
/// # });
/// ```
#[derive(Debug)]
pub struct Gateway {
    registry: Registry,
    store: IndexMap<String, MethodConfig>,
    authorization: AuthorizationSettings,
}

impl Gateway {
    /// Creates a gateway with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Creates a gateway builder.
    #[must_use]
    pub fn builder() -> GatewayBuilder {
        GatewayBuilder::default()
    }

    /// Creates a gateway from deployment settings.
    #[must_use]
    pub fn from_config(config: &UbossConfig) -> Self {
        Self::builder().settings(config).build()
    }

    /// Applies one registration.
    ///
    /// A `Config` load replaces the configuration of each method it names;
    /// methods it does not name keep their earlier configuration. A load that
    /// fails changes nothing.
    pub fn load(&mut self, load: impl Into<Load>) -> UbossResult<&mut Self> {
        let load = load.into();
        debug!(kind = load.kind(), "load");
        match load {
            Load::Methods(entries) => self.registry.register_methods(entries)?,
            Load::Middlewares(entries) => self.registry.register_middlewares(entries)?,
            Load::Roles(entries) => self.registry.register_roles(entries)?,
            Load::Config(source) => {
                let config = GatewayConfig::from_source(source, ConfigMode::Full)?;
                self.store.extend(config);
            }
        }
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

    /// Returns the configuration of `method`, if any.
    pub fn method_config(&self, method: &str) -> Option<&MethodConfig> {
        self.store.get(method)
    }

    /// Configured method names in configuration order.
    pub fn configured_methods(&self) -> impl Iterator<Item = &str> {
        self.store.keys().map(String::as_str)
    }

    /// Returns the authorization settings.
    pub fn authorization(&self) -> AuthorizationSettings {
        self.authorization
    }

    /// Cross-validates configuration against the registry and builds the API.
    ///
    /// Every configured method is checked before anything is built, in
    /// configuration order: the method itself, then the middlewares of each
    /// phase, then the roles its ACL references. The first violation is
    /// returned and no API is produced. With `require_acl` set, a configured
    /// method without an ACL then fails with `UnprotectedMethod`.
    #[instrument(skip(self), fields(methods = self.store.len()))]
    pub fn compose(&self) -> UbossResult<ComposedApi> {
        validate_references(&self.registry, &self.store, Phase::all())?;

        if self.authorization.require_acl {
            if let Some(method) = self
                .store
                .iter()
                .find_map(|(method, config)| config.acl_rule().is_none().then_some(method))
            {
                return Err(UbossError::UnprotectedMethod {
                    name: method.clone(),
                });
            }
        }

        let roles: SharedRoles = Arc::new(self.registry.roles_snapshot());
        let mut pipelines = IndexMap::with_capacity(self.store.len());
        for (method, config) in &self.store {
            let gate = AuthorizationGate::new(
                config.acl_rule().cloned(),
                Arc::clone(&roles),
                self.authorization.default_decision,
            );
            let pipeline = assemble(&self.registry, method, config, |builder| {
                builder.gate(Arc::new(gate))
            })?;
            pipelines.insert(method.clone(), pipeline);
        }

        let api = ComposedApi::new(pipelines);
        info!(methods = api.len(), "composed api");
        Ok(api)
    }
}

impl Default for Gateway {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for [`Gateway`].
#[derive(Debug, Default)]
pub struct GatewayBuilder {
    duplicates: DuplicatePolicy,
    authorization: AuthorizationSettings,
}

impl GatewayBuilder {
    /// Takes every policy from deployment settings.
    #[must_use]
    pub fn settings(mut self, config: &UbossConfig) -> Self {
        self.duplicates = config.registry.duplicates;
        self.authorization = config.authorization;
        self
    }

    /// Sets the duplicate registration policy.
    #[must_use]
    pub fn duplicates(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicates = policy;
        self
    }

    /// Sets the decision for methods without an ACL.
    #[must_use]
    pub fn default_decision(mut self, decision: DefaultDecision) -> Self {
        self.authorization.default_decision = decision;
        self
    }

    /// Requires every configured method to carry an ACL.
    #[must_use]
    pub fn require_acl(mut self, require: bool) -> Self {
        self.authorization.require_acl = require;
        self
    }

    /// Builds the gateway.
    #[must_use]
    pub fn build(self) -> Gateway {
        Gateway {
            registry: Registry::with_policy(self.duplicates),
            store: IndexMap::new(),
            authorization: self.authorization,
        }
    }
}

/// Checks every reference of every configured method, one method at a
/// time: the method, its middlewares in `phases` order, then its ACL roles.
pub(crate) fn validate_references(
    registry: &Registry,
    store: &IndexMap<String, MethodConfig>,
    phases: impl IntoIterator<Item = Phase> + Clone,
) -> UbossResult<()> {
    for (method, config) in store {
        if registry.method(method).is_none() {
            return Err(UbossError::missing_method(method.as_str()));
        }

        for phase in phases.clone() {
            if let Some(name) = config
                .middlewares()
                .get(phase)
                .iter()
                .find(|name| registry.middleware(name).is_none())
            {
                return Err(UbossError::missing_middleware(
                    name.as_str(),
                    method.as_str(),
                    phase.as_str(),
                ));
            }
        }

        if let Some(role) = config
            .acl_rule()
            .and_then(|acl| acl.role_names().find(|role| registry.role(role).is_none()))
        {
            return Err(UbossError::missing_role(role, method.as_str()));
        }
    }
    Ok(())
}

/// Builds one method's pipeline from validated references. `gate` inserts
/// whatever runs between `beforeAuth` and `beforeInvoke`.
pub(crate) fn assemble(
    registry: &Registry,
    method: &str,
    config: &MethodConfig,
    gate: impl FnOnce(PipelineBuilder) -> PipelineBuilder,
) -> UbossResult<Pipeline> {
    let chain = |builder: PipelineBuilder, phase: Phase| {
        config
            .middlewares()
            .get(phase)
            .iter()
            .try_fold(builder, |builder, name| {
                let handler = registry
                    .middleware(name)
                    .ok_or_else(|| UbossError::missing_middleware(name.as_str(), method, phase.as_str()))?;
                Ok::<_, UbossError>(builder.middleware(phase, name.as_str(), Arc::clone(handler)))
            })
    };

    let handler = registry
        .method(method)
        .ok_or_else(|| UbossError::missing_method(method))?;

    let builder = chain(Pipeline::builder(method), Phase::BeforeAuth)?;
    let builder = chain(gate(builder), Phase::BeforeInvoke)?;
    let builder = builder.method(Arc::clone(handler));
    let builder = chain(builder, Phase::AfterInvoke)?;
    Ok(builder.build())
}
