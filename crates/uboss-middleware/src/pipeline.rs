//! Ordered stage pipeline.
//!
//! A [`Pipeline`] is the executable form of one composed method:
//!
//! ```text
//! request → beforeAuth… → [authorization] → beforeInvoke… → method → afterInvoke… → result
//! ```
//!
//! Stages run strictly in order; a stage starts only after the previous one
//! produced a value. The first error aborts the remaining stages. A stage may
//! settle the invocation early through its short-circuit handle; the stages
//! after it still run, but nothing they produce reaches the caller.
//!
//! Each call to [`Pipeline::invoke`] spawns the stage runner on the ambient
//! tokio runtime and returns an [`Invocation`] future for the settled result.
//! Dropping the invocation does not stop the runner.

use crate::context::{SettleGuard, ShortCircuit, StageContext};
use crate::middleware::{Middleware, StageOutput};
use futures_util::FutureExt;
use http::StatusCode;
use serde_json::Value;
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::{debug, info_span, warn, Instrument};
use uboss_core::{Phase, UbossError, UbossResult};
use uboss_telemetry::metrics::{self, Outcome};

/// The role a stage plays in a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    /// A configured middleware in one of the three phases.
    Middleware(Phase),
    /// The authorization gate between `beforeAuth` and `beforeInvoke`.
    Authorization,
    /// The target method.
    Method,
}

impl StageKind {
    /// Returns the label used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Middleware(phase) => phase.as_str(),
            Self::Authorization => "authorization",
            Self::Method => "method",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named stage bound to its handler.
#[derive(Clone)]
pub struct Stage {
    name: Arc<str>,
    kind: StageKind,
    handler: Arc<dyn Middleware>,
}

impl Stage {
    /// Creates a stage.
    pub fn new(name: impl Into<Arc<str>>, kind: StageKind, handler: Arc<dyn Middleware>) -> Self {
        Self {
            name: name.into(),
            kind,
            handler,
        }
    }

    /// Returns the stage name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the stage kind.
    pub const fn kind(&self) -> StageKind {
        self.kind
    }
}

impl fmt::Debug for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stage")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// An immutable, ordered list of stages for one method.
///
/// Cloning is cheap; clones share the stage list.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use serde_json::{json, Value};
/// use uboss_middleware::{from_fn, Pipeline};
///
/// # tokio_test::block_on(async {
/// let pipeline = Pipeline::builder("increase")
///     .method(Arc::new(from_fn(|n: Value| Ok(json!(n.as_i64().unwrap_or(0) + 1)))))
///     .build();
///
/// assert_eq!(pipeline.invoke(json!(1)).await.unwrap(), json!(2));
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct Pipeline {
    method: Arc<str>,
    stages: Arc<[Stage]>,
}

impl Pipeline {
    /// Creates a pipeline builder for `method`.
    #[must_use]
    pub fn builder(method: impl Into<Arc<str>>) -> PipelineBuilder {
        PipelineBuilder::new(method)
    }

    /// Returns the method name.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Returns the stages in execution order.
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Returns the names of all stages in execution order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(Stage::name).collect()
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Starts an invocation with `request` as the initial value.
    ///
    /// The stage runner is spawned immediately; awaiting the returned
    /// [`Invocation`] only observes its settlement. Outside a tokio runtime
    /// the invocation settles at once with an execution error.
    pub fn invoke(&self, request: Value) -> Invocation {
        let (sender, receiver) = oneshot::channel();
        let guard = SettleGuard::new(sender);

        match Handle::try_current() {
            Ok(handle) => {
                let span = info_span!("uboss.invoke", method = %self.method);
                let runner = run(
                    Arc::clone(&self.method),
                    Arc::clone(&self.stages),
                    request,
                    guard,
                );
                drop(handle.spawn(runner.instrument(span)));
            }
            Err(err) => {
                guard.settle(Err(UbossError::execution(format!(
                    "method {} invoked outside a tokio runtime: {err}",
                    self.method
                ))
                .with_status(StatusCode::INTERNAL_SERVER_ERROR)));
            }
        }

        Invocation { receiver }
    }
}

/// Builder for constructing a [`Pipeline`].
///
/// Stages run in the order they are added.
#[derive(Debug)]
pub struct PipelineBuilder {
    method: Arc<str>,
    stages: Vec<Stage>,
}

impl PipelineBuilder {
    /// Creates an empty builder for `method`.
    #[must_use]
    pub fn new(method: impl Into<Arc<str>>) -> Self {
        Self {
            method: method.into(),
            stages: Vec::new(),
        }
    }

    /// Appends a stage.
    #[must_use]
    pub fn stage(mut self, stage: Stage) -> Self {
        self.stages.push(stage);
        self
    }

    /// Appends a named middleware in `phase`.
    #[must_use]
    pub fn middleware(
        self,
        phase: Phase,
        name: impl Into<Arc<str>>,
        handler: Arc<dyn Middleware>,
    ) -> Self {
        self.stage(Stage::new(name, StageKind::Middleware(phase), handler))
    }

    /// Appends the authorization gate.
    #[must_use]
    pub fn gate(self, handler: Arc<dyn Middleware>) -> Self {
        self.stage(Stage::new("authorization", StageKind::Authorization, handler))
    }

    /// Appends the target method, named after the pipeline.
    #[must_use]
    pub fn method(self, handler: Arc<dyn Middleware>) -> Self {
        let name = Arc::clone(&self.method);
        self.stage(Stage::new(name, StageKind::Method, handler))
    }

    /// Builds the pipeline.
    #[must_use]
    pub fn build(self) -> Pipeline {
        Pipeline {
            method: self.method,
            stages: self.stages.into(),
        }
    }
}

/// The pending result of one invocation.
///
/// Resolves exactly once, with the first of: the last stage's value, a
/// short-circuit value, or the first error.
#[derive(Debug)]
#[must_use = "an invocation runs regardless, but its result is only observable by awaiting it"]
pub struct Invocation {
    receiver: oneshot::Receiver<UbossResult<Value>>,
}

impl Future for Invocation {
    type Output = UbossResult<Value>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver).poll(cx).map(|received| {
            received.unwrap_or_else(|_| {
                Err(UbossError::execution("invocation aborted before settling")
                    .with_status(StatusCode::INTERNAL_SERVER_ERROR))
            })
        })
    }
}

/// Runs every stage of one invocation and settles its guard.
async fn run(method: Arc<str>, stages: Arc<[Stage]>, request: Value, guard: Arc<SettleGuard>) {
    let started = Instant::now();
    let short_circuit = ShortCircuit::new(Arc::clone(&guard));
    let mut value = request;

    for (index, stage) in stages.iter().enumerate() {
        debug!(
            stage = stage.name(),
            phase = stage.kind().as_str(),
            index,
            "Running stage"
        );

        let ctx = StageContext::new(
            value,
            short_circuit.clone(),
            Arc::clone(&method),
            Arc::clone(&stage.name),
            stage.kind,
            index,
        );

        match run_stage(stage, ctx).await {
            Ok(next) => value = next,
            Err(err) => {
                let unauthorized = err.is_unauthorized();
                let message = err.to_string();
                let outcome = if guard.settle(Err(err)) {
                    if unauthorized {
                        Outcome::Unauthorized
                    } else {
                        warn!(stage = stage.name(), index, error = %message, "Invocation failed");
                        Outcome::Error
                    }
                } else {
                    debug!(stage = stage.name(), error = %message, "Dropping error after settlement");
                    Outcome::ShortCircuit
                };
                metrics::record_invocation(&method, outcome, started.elapsed());
                return;
            }
        }
    }

    let outcome = if guard.settle(Ok(value)) {
        Outcome::Ok
    } else {
        debug!("Dropping final value after short-circuit");
        Outcome::ShortCircuit
    };
    metrics::record_invocation(&method, outcome, started.elapsed());
}

/// Runs one stage, turning panics into execution errors.
async fn run_stage(stage: &Stage, ctx: StageContext) -> UbossResult<Value> {
    let output = catch_unwind(AssertUnwindSafe(|| stage.handler.process(ctx)))
        .map_err(|payload| panicked(stage, &*payload))?;

    match output {
        StageOutput::Ready(result) => result,
        StageOutput::Pending(future) => AssertUnwindSafe(future)
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| Err(panicked(stage, &*payload))),
    }
}

fn panicked(stage: &Stage, payload: &(dyn Any + Send)) -> UbossError {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    UbossError::execution(format!("stage {} panicked: {detail}", stage.name))
        .with_status(StatusCode::INTERNAL_SERVER_ERROR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::{from_async_fn, from_fn};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn add(n: i64) -> Arc<dyn Middleware> {
        Arc::new(from_fn(move |v: Value| Ok(json!(v.as_i64().unwrap_or(0) + n))))
    }

    #[tokio::test]
    async fn test_stages_run_in_order() {
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let record = |name: &'static str| -> Arc<dyn Middleware> {
            let order = Arc::clone(&order);
            Arc::new(move |ctx: StageContext| {
                order.lock().push(name);
                StageOutput::ready(ctx.into_value())
            })
        };

        let pipeline = Pipeline::builder("m")
            .middleware(Phase::BeforeAuth, "first", record("first"))
            .middleware(Phase::BeforeInvoke, "second", record("second"))
            .method(record("m"))
            .middleware(Phase::AfterInvoke, "third", record("third"))
            .build();

        assert_eq!(pipeline.invoke(json!(1)).await.unwrap(), json!(1));
        assert_eq!(*order.lock(), vec!["first", "second", "m", "third"]);
        assert_eq!(pipeline.stage_names(), vec!["first", "second", "m", "third"]);
    }

    #[tokio::test]
    async fn test_value_threads_through_stages() {
        let pipeline = Pipeline::builder("increase")
            .middleware(Phase::BeforeInvoke, "increase", add(1))
            .middleware(Phase::BeforeInvoke, "decrease", add(-1))
            .method(add(1))
            .build();
        assert_eq!(pipeline.invoke(json!(1)).await.unwrap(), json!(2));
    }

    #[tokio::test]
    async fn test_empty_pipeline_returns_request() {
        let pipeline = Pipeline::builder("noop").build();
        assert_eq!(pipeline.stage_count(), 0);
        assert_eq!(pipeline.invoke(json!({ "a": 1 })).await.unwrap(), json!({ "a": 1 }));
    }

    #[tokio::test]
    async fn test_async_stages() {
        let pipeline = Pipeline::builder("m")
            .middleware(
                Phase::BeforeInvoke,
                "slow",
                Arc::new(from_async_fn(|v: Value| async move {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    Ok(json!(v.as_i64().unwrap_or(0) * 10))
                })),
            )
            .method(add(1))
            .build();
        assert_eq!(pipeline.invoke(json!(2)).await.unwrap(), json!(21));
    }

    #[tokio::test]
    async fn test_error_aborts_remaining_stages() {
        let ran = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ran);
        let pipeline = Pipeline::builder("m")
            .middleware(
                Phase::BeforeInvoke,
                "fail",
                Arc::new(from_fn(|_| {
                    Err(UbossError::execution("teapot").with_status(StatusCode::IM_A_TEAPOT))
                })),
            )
            .method(Arc::new(move |ctx: StageContext| {
                counter.fetch_add(1, Ordering::SeqCst);
                StageOutput::ready(ctx.into_value())
            }))
            .build();

        let err = pipeline.invoke(json!(1)).await.unwrap_err();
        assert_eq!(err.to_string(), "teapot");
        assert_eq!(err.status_code(), Some(StatusCode::IM_A_TEAPOT));
        tokio::task::yield_now().await;
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_short_circuit_wins_and_later_stages_still_run() {
        let ran = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ran);
        let (done_tx, done_rx) = oneshot::channel::<()>();
        let done_tx = parking_lot::Mutex::new(Some(done_tx));

        let pipeline = Pipeline::builder("increase")
            .middleware(
                Phase::BeforeInvoke,
                "shortCircuit",
                Arc::new(|ctx: StageContext| {
                    let n = ctx.value().as_i64().unwrap_or(0);
                    assert!(ctx.short_circuit().resolve(json!(n + 10)));
                    StageOutput::ready(ctx.into_value())
                }),
            )
            .method(add(1))
            .middleware(
                Phase::AfterInvoke,
                "observe",
                Arc::new(move |ctx: StageContext| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    if let Some(tx) = done_tx.lock().take() {
                        let _ = tx.send(());
                    }
                    StageOutput::ready(ctx.into_value())
                }),
            )
            .build();

        assert_eq!(pipeline.invoke(json!(1)).await.unwrap(), json!(11));
        done_rx.await.unwrap();
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_error_after_short_circuit_is_dropped() {
        let pipeline = Pipeline::builder("m")
            .middleware(
                Phase::BeforeInvoke,
                "cache",
                Arc::new(|ctx: StageContext| {
                    ctx.short_circuit().resolve(json!("cached"));
                    StageOutput::ready(ctx.into_value())
                }),
            )
            .method(Arc::new(from_fn(|_| Err(UbossError::execution("boom")))))
            .build();

        assert_eq!(pipeline.invoke(json!(1)).await.unwrap(), json!("cached"));
    }

    #[tokio::test]
    async fn test_second_short_circuit_is_ignored() {
        let pipeline = Pipeline::builder("m")
            .middleware(
                Phase::BeforeInvoke,
                "twice",
                Arc::new(|ctx: StageContext| {
                    assert!(ctx.short_circuit().resolve(json!(1)));
                    assert!(!ctx.short_circuit().resolve(json!(2)));
                    StageOutput::ready(ctx.into_value())
                }),
            )
            .build();

        assert_eq!(pipeline.invoke(json!(0)).await.unwrap(), json!(1));
    }

    #[tokio::test]
    async fn test_sync_panic_becomes_500() {
        let pipeline = Pipeline::builder("m")
            .method(Arc::new(|_ctx: StageContext| -> StageOutput { panic!("kaboom") }))
            .build();

        let err = pipeline.invoke(json!(1)).await.unwrap_err();
        assert!(err.to_string().contains("kaboom"));
        assert_eq!(err.status_code(), Some(StatusCode::INTERNAL_SERVER_ERROR));
    }

    #[tokio::test]
    async fn test_async_panic_becomes_500() {
        let pipeline = Pipeline::builder("m")
            .method(Arc::new(from_async_fn(|_v: Value| async move {
                if true {
                    panic!("{}", String::from("async kaboom"));
                }
                Ok(Value::Null)
            })))
            .build();

        let err = pipeline.invoke(json!(1)).await.unwrap_err();
        assert!(err.to_string().contains("async kaboom"));
        assert_eq!(err.status_code(), Some(StatusCode::INTERNAL_SERVER_ERROR));
    }

    #[tokio::test]
    async fn test_dropped_invocation_keeps_running() {
        let (tx, rx) = oneshot::channel::<Value>();
        let tx = parking_lot::Mutex::new(Some(tx));
        let pipeline = Pipeline::builder("m")
            .method(Arc::new(from_async_fn(|v: Value| async move {
                tokio::time::sleep(Duration::from_millis(5)).await;
                Ok(v)
            })))
            .middleware(
                Phase::AfterInvoke,
                "report",
                Arc::new(move |ctx: StageContext| {
                    if let Some(tx) = tx.lock().take() {
                        let _ = tx.send(ctx.value().clone());
                    }
                    StageOutput::ready(ctx.into_value())
                }),
            )
            .build();

        drop(pipeline.invoke(json!("side effect")));
        assert_eq!(rx.await.unwrap(), json!("side effect"));
    }

    #[tokio::test]
    async fn test_concurrent_invocations_are_independent() {
        let pipeline = Pipeline::builder("double")
            .method(Arc::new(from_async_fn(|v: Value| async move {
                tokio::task::yield_now().await;
                Ok(json!(v.as_i64().unwrap_or(0) * 2))
            })))
            .build();

        let a = pipeline.invoke(json!(1));
        let b = pipeline.invoke(json!(2));
        let (a, b) = tokio::join!(a, b);
        assert_eq!(a.unwrap(), json!(2));
        assert_eq!(b.unwrap(), json!(4));
    }

    #[test]
    fn test_invoke_outside_runtime() {
        let pipeline = Pipeline::builder("m").build();
        let invocation = pipeline.invoke(json!(1));
        let err = tokio_test::block_on(invocation).unwrap_err();
        assert!(err.to_string().contains("outside a tokio runtime"));
    }

    #[test]
    fn test_stage_kind_labels() {
        assert_eq!(StageKind::Middleware(Phase::BeforeAuth).as_str(), "beforeAuth");
        assert_eq!(StageKind::Authorization.to_string(), "authorization");
        assert_eq!(StageKind::Method.as_str(), "method");
    }
}
