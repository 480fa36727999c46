//! Dynamic values and dotted-path lookup.
//!
//! Requests, pipeline values and authorization metadata are plain JSON
//! values. Lookups never fail: a missing key, an out-of-range index or a
//! scalar in the middle of the path all resolve to `None`.

pub use serde_json::Value;

static NULL: Value = Value::Null;

/// Resolves a dotted path such as `requestor.tags.0` against `value`.
///
/// Objects are descended by key, arrays by non-negative integer index.
///
/// # Example
///
/// ```
/// use uboss_core::lookup_path;
/// use serde_json::json;
///
/// let metadata = json!({ "requestor": { "tags": ["admin", "x"] } });
/// assert_eq!(lookup_path(&metadata, "requestor.tags.1"), Some(&json!("x")));
/// assert_eq!(lookup_path(&metadata, "requestor.name"), None);
/// ```
#[must_use]
pub fn lookup_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(value, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Returns the authorization metadata carried by a request.
///
/// Metadata lives under the `metadata` key; anything else yields `null`.
#[must_use]
pub fn metadata_of(request: &Value) -> &Value {
    request.get("metadata").unwrap_or(&NULL)
}
