//! Declarative per-method gateway configuration.
//!
//! The document has a single root key, `methods`, mapping each method name
//! to its middleware chains and optional ACL:
//!
//! ```json
//! {
//!   "methods": {
//!     "increase": {
//!       "middlewares": {
//!         "beforeAuth": ["session"],
//!         "beforeInvoke": ["validate"],
//!         "afterInvoke": ["audit"]
//!       },
//!       "acl": {
//!         "roles": ["admin", "user"],
//!         "attribute": { "path": "requestor.tags", "include": "ops" }
//!       }
//!     }
//!   }
//! }
//! ```
//!
//! Parsing is strict and eager: every malformed shape is reported at load
//! time with its location, e.g. `increase.middlewares.beforeInvoke`.

use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde_json::{Map, Value};
use uboss_authz::{AclRule, AttributeRule};
use uboss_core::{Phase, UbossError, UbossResult};

use crate::ConfigError;

/// Which gateway flavour the configuration is parsed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConfigMode {
    /// Three phases plus ACL.
    #[default]
    Full,
    /// `beforeInvoke` and `afterInvoke` only; no ACL.
    Simple,
}

impl ConfigMode {
    /// Phases this mode accepts.
    pub fn phases(self) -> &'static [Phase] {
        match self {
            Self::Full => &[Phase::BeforeAuth, Phase::BeforeInvoke, Phase::AfterInvoke],
            Self::Simple => &[Phase::BeforeInvoke, Phase::AfterInvoke],
        }
    }

    fn allows_acl(self) -> bool {
        matches!(self, Self::Full)
    }
}

/// Where a declarative configuration comes from.
#[derive(Debug, Clone)]
pub enum ConfigSource {
    /// An in-memory document.
    Value(Value),
    /// JSON text.
    Json(String),
    /// TOML text.
    Toml(String),
    /// A `.json` or `.toml` file.
    File(PathBuf),
}

impl ConfigSource {
    /// A file source.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File(path.into())
    }

    /// Reads and decodes the source into a document.
    pub fn into_value(self) -> UbossResult<Value> {
        let value = match self {
            Self::Value(value) => value,
            Self::Json(text) => decode_json(&text)?,
            Self::Toml(text) => decode_toml(&text)?,
            Self::File(path) => read_file(&path)?,
        };
        Ok(value)
    }
}

impl From<Value> for ConfigSource {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

fn decode_json(text: &str) -> Result<Value, ConfigError> {
    Ok(serde_json::from_str(text)?)
}

fn decode_toml(text: &str) -> Result<Value, ConfigError> {
    Ok(toml::from_str(text)?)
}

fn read_file(path: &Path) -> Result<Value, ConfigError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase);

    // Format is checked before existence so that an unusable source is
    // reported as such even when the file is missing.
    let decode: fn(&str) -> Result<Value, ConfigError> = match extension.as_deref() {
        Some("json") => decode_json,
        Some("toml") => decode_toml,
        other => return Err(ConfigError::unsupported_format(other.unwrap_or("<none>"))),
    };

    if !path.exists() {
        return Err(ConfigError::file_not_found(path));
    }
    let content = fs::read_to_string(path).map_err(|e| ConfigError::read_error(path, e))?;
    decode(&content)
}

/// Ordered middleware names per phase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhaseMiddlewares {
    before_auth: Vec<String>,
    before_invoke: Vec<String>,
    after_invoke: Vec<String>,
}

impl PhaseMiddlewares {
    /// Returns the chain for `phase`, possibly empty.
    pub fn get(&self, phase: Phase) -> &[String] {
        match phase {
            Phase::BeforeAuth => &self.before_auth,
            Phase::BeforeInvoke => &self.before_invoke,
            Phase::AfterInvoke => &self.after_invoke,
        }
    }

    fn get_mut(&mut self, phase: Phase) -> &mut Vec<String> {
        match phase {
            Phase::BeforeAuth => &mut self.before_auth,
            Phase::BeforeInvoke => &mut self.before_invoke,
            Phase::AfterInvoke => &mut self.after_invoke,
        }
    }

    /// Total number of referenced middlewares across phases.
    pub fn len(&self) -> usize {
        self.before_auth.len() + self.before_invoke.len() + self.after_invoke.len()
    }

    /// Returns `true` if every phase is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Configuration of one method.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MethodConfig {
    middlewares: PhaseMiddlewares,
    acl: Option<AclRule>,
}

impl MethodConfig {
    /// An empty configuration: no middlewares, no ACL.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a middleware name to a phase chain.
    #[must_use]
    pub fn middleware(mut self, phase: Phase, name: impl Into<String>) -> Self {
        self.middlewares.get_mut(phase).push(name.into());
        self
    }

    /// Sets the ACL rule set.
    #[must_use]
    pub fn acl(mut self, acl: AclRule) -> Self {
        self.acl = Some(acl);
        self
    }

    /// The phase chains.
    pub fn middlewares(&self) -> &PhaseMiddlewares {
        &self.middlewares
    }

    /// The ACL rule set, if one was declared.
    pub fn acl_rule(&self) -> Option<&AclRule> {
        self.acl.as_ref()
    }
}

/// A parsed declarative configuration, in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GatewayConfig {
    methods: IndexMap<String, MethodConfig>,
}

impl GatewayConfig {
    /// An empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a method entry.
    #[must_use]
    pub fn method(mut self, name: impl Into<String>, config: MethodConfig) -> Self {
        self.methods.insert(name.into(), config);
        self
    }

    /// Reads and parses a configuration source.
    ///
    /// # Errors
    ///
    /// - `UnsupportedLoadOptions` if a file is neither `.json` nor `.toml`
    /// - `ConfigShape` for unreadable, undecodable or malformed documents
    pub fn from_source(source: ConfigSource, mode: ConfigMode) -> UbossResult<Self> {
        Self::parse(&source.into_value()?, mode)
    }

    /// Parses an in-memory document.
    ///
    /// # Errors
    ///
    /// Returns `ConfigShape` naming the first malformed location.
    pub fn parse(document: &Value, mode: ConfigMode) -> UbossResult<Self> {
        let root = expect_object("config", document, "config must be an object")?;
        reject_unknown("config", root, &["methods"])?;

        let mut methods = IndexMap::new();
        if let Some(raw) = root.get("methods") {
            let entries = expect_object("methods", raw, "config methods property must be an object")?;
            for (name, entry) in entries {
                if name.is_empty() {
                    return Err(UbossError::config_shape("methods", "method names must be non-empty"));
                }
                methods.insert(name.clone(), parse_method(name, entry, mode)?);
            }
        }

        Ok(Self { methods })
    }

    /// Iterates over method entries in declaration order.
    pub fn methods(&self) -> impl Iterator<Item = (&str, &MethodConfig)> {
        self.methods.iter().map(|(name, config)| (name.as_str(), config))
    }

    /// Looks up one method entry.
    pub fn get(&self, method: &str) -> Option<&MethodConfig> {
        self.methods.get(method)
    }

    /// Number of configured methods.
    pub fn len(&self) -> usize {
        self.methods.len()
    }

    /// Returns `true` if no method is configured.
    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

impl IntoIterator for GatewayConfig {
    type Item = (String, MethodConfig);
    type IntoIter = indexmap::map::IntoIter<String, MethodConfig>;

    fn into_iter(self) -> Self::IntoIter {
        self.methods.into_iter()
    }
}

fn parse_method(name: &str, entry: &Value, mode: ConfigMode) -> UbossResult<MethodConfig> {
    let map = expect_object(name, entry, "method configuration must be an object")?;
    let allowed: &[&str] = if mode.allows_acl() {
        &["middlewares", "acl"]
    } else {
        &["middlewares"]
    };
    reject_unknown(name, map, allowed)?;

    let middlewares = match map.get("middlewares") {
        Some(raw) => parse_middlewares(name, raw, mode)?,
        None => PhaseMiddlewares::default(),
    };
    let acl = map
        .get("acl")
        .map(|raw| parse_acl(name, raw))
        .transpose()?;

    Ok(MethodConfig { middlewares, acl })
}

fn parse_middlewares(method: &str, raw: &Value, mode: ConfigMode) -> UbossResult<PhaseMiddlewares> {
    let location = format!("{method}.middlewares");
    let map = expect_object(&location, raw, "middlewares if set must be an object")?;

    let allowed: Vec<&str> = mode.phases().iter().map(|phase| phase.as_str()).collect();
    reject_unknown(&location, map, &allowed)?;

    let mut chains = PhaseMiddlewares::default();
    for &phase in mode.phases() {
        let Some(raw) = map.get(phase.as_str()).filter(|raw| !raw.is_null()) else {
            continue;
        };
        let location = format!("{location}.{}", phase.as_str());
        let names = parse_names(
            &location,
            raw,
            &format!("{} middleware chain, if set, should be an array", phase.as_str()),
            "middlewares must be non-empty strings",
        )?;
        *chains.get_mut(phase) = names;
    }
    Ok(chains)
}

fn parse_acl(method: &str, raw: &Value) -> UbossResult<AclRule> {
    let location = format!("{method}.acl");
    let map = expect_object(&location, raw, "acl must be an object")?;
    reject_unknown(&location, map, &["roles", "attribute", "attributes"])?;

    let mut acl = AclRule::for_method(method);

    if let Some(raw) = map.get("roles") {
        let location = format!("{location}.roles");
        let names = parse_names(
            &location,
            raw,
            "roles must be an array",
            "roles must be non-empty strings",
        )?;
        if names.is_empty() {
            return Err(UbossError::config_shape(location, "roles must not be empty"));
        }
        acl = acl.roles(names);
    }

    if let Some(raw) = map.get("attribute") {
        acl = acl.attribute(AttributeRule::parse(&format!("{location}.attribute"), raw)?);
    }

    if let Some(raw) = map.get("attributes") {
        let rules = raw.as_array().ok_or_else(|| {
            UbossError::config_shape(format!("{location}.attributes"), "attributes must be an array")
        })?;
        for (index, rule) in rules.iter().enumerate() {
            acl = acl.attribute(AttributeRule::parse(
                &format!("{location}.attributes[{index}]"),
                rule,
            )?);
        }
    }

    Ok(acl)
}

fn parse_names(location: &str, raw: &Value, not_array: &str, bad_entry: &str) -> UbossResult<Vec<String>> {
    let items = raw
        .as_array()
        .ok_or_else(|| UbossError::config_shape(location, not_array))?;

    items
        .iter()
        .map(|item| match item.as_str() {
            Some(name) if !name.is_empty() => Ok(name.to_string()),
            _ => Err(UbossError::config_shape(location, bad_entry)),
        })
        .collect()
}

fn expect_object<'a>(location: &str, value: &'a Value, reason: &str) -> UbossResult<&'a Map<String, Value>> {
    value
        .as_object()
        .ok_or_else(|| UbossError::config_shape(location, reason))
}

fn reject_unknown(location: &str, map: &Map<String, Value>, allowed: &[&str]) -> UbossResult<()> {
    match map.keys().find(|key| !allowed.contains(&key.as_str())) {
        Some(key) => Err(UbossError::config_shape(
            location,
            format!("unknown property {key}"),
        )),
        None => Ok(()),
    }
}
