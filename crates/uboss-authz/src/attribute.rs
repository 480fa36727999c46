//! Attribute based rules.
//!
//! An [`AttributeRule`] resolves a *subject* from request metadata by dotted
//! path and compares it with an *operand*, which is either a literal or
//! another metadata path resolved at evaluation time.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uboss_core::{lookup_path, UbossError, UbossResult};

/// The comparison applied by an attribute rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    /// The subject is a sequence containing the operand.
    Include,
    /// The subject strictly equals the operand.
    Equal,
}

impl Predicate {
    /// Returns the config key naming this predicate.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Include => "include",
            Self::Equal => "equal",
        }
    }
}

/// The right-hand side of an attribute comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// A fixed value.
    Literal(Value),
    /// A dotted path resolved against the same metadata as the subject.
    Path(String),
}

impl Operand {
    /// Creates a path operand.
    pub fn path(path: impl Into<String>) -> Self {
        Self::Path(path.into())
    }

    fn resolve<'a>(&'a self, metadata: &'a Value) -> Option<&'a Value> {
        match self {
            Self::Literal(value) => Some(value),
            Self::Path(path) => lookup_path(metadata, path),
        }
    }

    /// Parses an operand from declarative config.
    ///
    /// `{ "path": "a.b" }` is a path reference; any other non-null,
    /// non-object value is a literal.
    fn parse(location: &str, value: &Value) -> UbossResult<Self> {
        match value {
            Value::Null => Err(UbossError::config_shape(
                location,
                "the value of the predicate must be present",
            )),
            Value::Object(map) => {
                let path = map.get("path").and_then(Value::as_str);
                match path {
                    Some(path) if map.len() == 1 && !path.is_empty() => Ok(Self::path(path)),
                    _ => Err(UbossError::config_shape(
                        location,
                        "the value of the predicate must be either a literal or an object with a single non-empty string path property",
                    )),
                }
            }
            literal => Ok(Self::Literal(literal.clone())),
        }
    }
}

impl From<Value> for Operand {
    fn from(value: Value) -> Self {
        Self::Literal(value)
    }
}

/// Compares a metadata path against a literal or another metadata path.
///
/// # Example
///
/// ```
/// use serde_json::json;
/// use uboss_authz::{AttributeRule, Operand};
///
/// let rule = AttributeRule::include("requestor.tags", json!("admin"));
/// assert!(rule.evaluate(&json!({ "requestor": { "tags": ["admin", "x"] } })));
/// assert!(!rule.evaluate(&json!({ "requestor": { "tags": ["x"] } })));
///
/// let owner = AttributeRule::equal("resource.owner", Operand::path("requestor.id"));
/// assert!(owner.evaluate(&json!({ "resource": { "owner": 7 }, "requestor": { "id": 7 } })));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeRule {
    path: String,
    predicate: Predicate,
    operand: Operand,
}

impl AttributeRule {
    /// Creates a rule from its parts.
    pub fn new(path: impl Into<String>, predicate: Predicate, operand: impl Into<Operand>) -> Self {
        Self {
            path: path.into(),
            predicate,
            operand: operand.into(),
        }
    }

    /// Creates an `include` rule.
    pub fn include(path: impl Into<String>, operand: impl Into<Operand>) -> Self {
        Self::new(path, Predicate::Include, operand)
    }

    /// Creates an `equal` rule.
    pub fn equal(path: impl Into<String>, operand: impl Into<Operand>) -> Self {
        Self::new(path, Predicate::Equal, operand)
    }

    /// Parses `{ "path": ..., "include" | "equal": ... }` from declarative config.
    ///
    /// Exactly one of `include` and `equal` must be supplied.
    pub fn parse(location: &str, value: &Value) -> UbossResult<Self> {
        let map = value
            .as_object()
            .ok_or_else(|| UbossError::config_shape(location, "attribute rule must be an object"))?;

        if let Some(key) = map
            .keys()
            .find(|key| !matches!(key.as_str(), "path" | "include" | "equal"))
        {
            return Err(UbossError::config_shape(
                location,
                format!("unknown attribute rule property {key}"),
            ));
        }

        let path = match map.get("path").and_then(Value::as_str) {
            Some(path) if !path.is_empty() => path,
            _ => {
                return Err(UbossError::config_shape(
                    location,
                    "path must exist in attribute rule and be a non-empty string",
                ))
            }
        };

        let (predicate, raw) = match (map.get("include"), map.get("equal")) {
            (Some(raw), None) => (Predicate::Include, raw),
            (None, Some(raw)) => (Predicate::Equal, raw),
            _ => {
                return Err(UbossError::config_shape(
                    location,
                    "exactly one predicate of include, equal must exist in attribute rule",
                ))
            }
        };

        let operand = Operand::parse(&format!("{location}.{}", predicate.as_str()), raw)?;
        Ok(Self::new(path, predicate, operand))
    }

    /// Returns the subject path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the predicate.
    pub const fn predicate(&self) -> Predicate {
        self.predicate
    }

    /// Returns the operand.
    pub const fn operand(&self) -> &Operand {
        &self.operand
    }

    /// Evaluates the rule against request metadata.
    ///
    /// Never fails: an absent subject or an absent path operand is `false`.
    /// For `include`, arrays are searched for an equal element and strings
    /// for a substring; any other subject is `false`.
    pub fn evaluate(&self, metadata: &Value) -> bool {
        let Some(subject) = lookup_path(metadata, &self.path) else {
            return false;
        };
        let Some(operand) = self.operand.resolve(metadata) else {
            return false;
        };

        match self.predicate {
            Predicate::Include => match subject {
                Value::Array(items) => items.iter().any(|item| same_value(item, operand)),
                Value::String(haystack) => operand
                    .as_str()
                    .is_some_and(|needle| haystack.contains(needle)),
                _ => false,
            },
            Predicate::Equal => same_value(subject, operand),
        }
    }
}

/// Equality with numbers compared by value, so `1` matches `1.0`.
#[allow(clippy::float_cmp)]
fn same_value(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        _ => a == b,
    }
}
