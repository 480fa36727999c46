//! Core stage trait and types.
//!
//! Middlewares and target methods share one calling convention: they take a
//! [`StageContext`] and return a [`StageOutput`], which is either an
//! immediate result or a pending future. The executor only suspends an
//! invocation when a stage hands back a pending future.
//!
//! # Example
//!
//! ```
//! use serde_json::{json, Value};
//! use uboss_core::UbossResult;
//! use uboss_middleware::{from_async_fn, from_fn, Middleware, StageContext};
//!
//! // Synchronous stage
//! let increase = from_fn(|n: Value| -> UbossResult<Value> {
//!     Ok(json!(n.as_i64().unwrap_or_default() + 1))
//! });
//!
//! // Asynchronous stage
//! let echo = from_async_fn(|v: Value| async move { Ok(v) });
//!
//! let _ = increase.process(StageContext::detached(json!(1)));
//! let _ = echo.process(StageContext::detached(json!(1)));
//! ```

use crate::context::StageContext;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use uboss_core::{UbossError, UbossResult};

/// A boxed future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// What a stage hands back to the executor.
pub enum StageOutput {
    /// The stage finished synchronously.
    Ready(UbossResult<Value>),
    /// The stage finishes when the future resolves.
    Pending(BoxFuture<'static, UbossResult<Value>>),
}

impl StageOutput {
    /// A successful synchronous result.
    pub const fn ready(value: Value) -> Self {
        Self::Ready(Ok(value))
    }

    /// A failed synchronous result.
    pub const fn fail(error: UbossError) -> Self {
        Self::Ready(Err(error))
    }

    /// A deferred result.
    pub fn pending<F>(future: F) -> Self
    where
        F: Future<Output = UbossResult<Value>> + Send + 'static,
    {
        Self::Pending(Box::pin(future))
    }

    /// Returns `true` if the result is available without awaiting.
    pub const fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    /// Resolves the output, awaiting it if pending.
    pub async fn resolve(self) -> UbossResult<Value> {
        match self {
            Self::Ready(result) => result,
            Self::Pending(future) => future.await,
        }
    }
}

impl From<UbossResult<Value>> for StageOutput {
    fn from(result: UbossResult<Value>) -> Self {
        Self::Ready(result)
    }
}

impl From<Value> for StageOutput {
    fn from(value: Value) -> Self {
        Self::ready(value)
    }
}

impl fmt::Debug for StageOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready(result) => f.debug_tuple("Ready").field(result).finish(),
            Self::Pending(_) => f.write_str("Pending(..)"),
        }
    }
}

/// A pipeline stage: a middleware or a target method.
///
/// # Invariants
///
/// - A stage receives the previous stage's value and returns the next one
/// - A stage may settle the invocation early through
///   [`StageContext::short_circuit`], at most once per invocation
/// - An `Err` aborts the remaining stages; a panic is reported as an
///   execution error with status 500
///
/// Closures of shape `Fn(StageContext) -> StageOutput` implement this trait.
pub trait Middleware: Send + Sync + 'static {
    /// Processes the current value.
    fn process(&self, ctx: StageContext) -> StageOutput;
}

impl<F> Middleware for F
where
    F: Fn(StageContext) -> StageOutput + Send + Sync + 'static,
{
    fn process(&self, ctx: StageContext) -> StageOutput {
        self(ctx)
    }
}

/// Wraps a synchronous value transform as a stage.
pub fn from_fn<F>(f: F) -> impl Middleware
where
    F: Fn(Value) -> UbossResult<Value> + Send + Sync + 'static,
{
    move |ctx: StageContext| StageOutput::Ready(f(ctx.into_value()))
}

/// Wraps an asynchronous value transform as a stage.
pub fn from_async_fn<F, Fut>(f: F) -> impl Middleware
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = UbossResult<Value>> + Send + 'static,
{
    move |ctx: StageContext| StageOutput::pending(f(ctx.into_value()))
}

/// A stage that passes its input through unchanged.
pub fn identity() -> impl Middleware {
    |ctx: StageContext| StageOutput::ready(ctx.into_value())
}
