//! The composed API: method name → pipeline.

use indexmap::IndexMap;
use serde_json::Value;
use uboss_core::{UbossError, UbossResult};
use uboss_middleware::{Invocation, Pipeline};

/// Immutable map from method name to its composed pipeline.
///
/// Built by [`Gateway::compose`](crate::Gateway::compose). Later changes
/// to the gateway do not affect an existing `ComposedApi`; cloning is cheap
/// and clones share the pipelines.
#[derive(Debug, Clone, Default)]
pub struct ComposedApi {
    pipelines: IndexMap<String, Pipeline>,
}

impl ComposedApi {
    pub(crate) fn new(pipelines: IndexMap<String, Pipeline>) -> Self {
        Self { pipelines }
    }

    /// Returns the pipeline for `method`, if it was configured.
    pub fn get(&self, method: &str) -> Option<&Pipeline> {
        self.pipelines.get(method)
    }

    /// Invokes `method` with `request`.
    ///
    /// An unconfigured method settles immediately with `NotConfigured`.
    pub async fn invoke(&self, method: &str, request: Value) -> UbossResult<Value> {
        self.start(method, request)?.await
    }

    /// Starts an invocation without awaiting it.
    ///
    /// The stages run even if the returned [`Invocation`] is dropped.
    pub fn start(&self, method: &str, request: Value) -> UbossResult<Invocation> {
        self.pipelines
            .get(method)
            .map(|pipeline| pipeline.invoke(request))
            .ok_or_else(|| UbossError::NotConfigured {
                name: method.to_string(),
            })
    }

    /// Configured method names in configuration order.
    pub fn method_names(&self) -> impl Iterator<Item = &str> {
        self.pipelines.keys().map(String::as_str)
    }

    /// Stage names of `method`, in execution order.
    pub fn stage_names(&self, method: &str) -> Option<Vec<&str>> {
        self.pipelines.get(method).map(Pipeline::stage_names)
    }

    /// Number of composed methods.
    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    /// Returns `true` if no method was composed.
    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use uboss_middleware::from_fn;

    fn api() -> ComposedApi {
        let pipeline = Pipeline::builder("echo")
            .method(Arc::new(from_fn(Ok)))
            .build();
        ComposedApi::new(IndexMap::from([("echo".to_string(), pipeline)]))
    }

    #[tokio::test]
    async fn test_invoke_configured_method() {
        assert_eq!(api().invoke("echo", json!(7)).await.unwrap(), json!(7));
    }

    #[tokio::test]
    async fn test_invoke_unconfigured_method() {
        let err = api().invoke("upper", json!("a")).await.unwrap_err();
        assert_eq!(err.to_string(), "method upper is not configured");
        assert!(api().get("upper").is_none());
    }

    #[test]
    fn test_inspection() {
        let api = api();
        assert_eq!(api.method_names().collect::<Vec<_>>(), vec!["echo"]);
        assert_eq!(api.stage_names("echo"), Some(vec!["echo"]));
        assert_eq!(api.len(), 1);
        assert!(ComposedApi::default().is_empty());
    }
}
