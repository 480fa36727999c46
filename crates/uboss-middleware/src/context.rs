//! Per-invocation stage context.
//!
//! Every stage receives a [`StageContext`]: the value produced by the
//! previous stage plus a [`ShortCircuit`] handle that settles the whole
//! invocation early. Settlement is guarded so that exactly one of natural
//! completion, short-circuit or failure reaches the caller.

use crate::pipeline::StageKind;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::oneshot;
use uboss_core::{metadata_of, UbossResult};

/// The sending half of an invocation's settle channel.
pub(crate) type Settle = oneshot::Sender<UbossResult<Value>>;

/// First-writer-wins cell around the settle channel.
#[derive(Debug)]
pub(crate) struct SettleGuard {
    sender: Mutex<Option<Settle>>,
}

impl SettleGuard {
    pub(crate) fn new(sender: Settle) -> Arc<Self> {
        Arc::new(Self {
            sender: Mutex::new(Some(sender)),
        })
    }

    /// Delivers `result` unless the invocation has already settled.
    ///
    /// Returns `true` if this call settled the invocation.
    pub(crate) fn settle(&self, result: UbossResult<Value>) -> bool {
        let Some(sender) = self.sender.lock().take() else {
            return false;
        };
        // The caller may have dropped the invocation; the stages still ran.
        let _ = sender.send(result);
        true
    }

    pub(crate) fn is_settled(&self) -> bool {
        self.sender.lock().is_none()
    }
}

/// Handle that settles the invocation with a value before the last stage.
///
/// Only the first settlement counts. Stages after the one that
/// short-circuited still run, but their outputs and errors are discarded.
///
/// # Example
///
/// ```
/// use serde_json::json;
/// use uboss_middleware::{StageContext, StageOutput};
///
/// fn cached(ctx: StageContext) -> StageOutput {
///     if ctx.value()["cached"] == json!(true) {
///         ctx.short_circuit().resolve(json!("from cache"));
///     }
///     StageOutput::ready(ctx.into_value())
/// }
/// # let _ = cached(StageContext::detached(json!({})));
/// ```
#[derive(Debug, Clone)]
pub struct ShortCircuit {
    guard: Arc<SettleGuard>,
}

impl ShortCircuit {
    pub(crate) fn new(guard: Arc<SettleGuard>) -> Self {
        Self { guard }
    }

    /// Settles the invocation with `value`.
    ///
    /// Returns `true` if this call won; `false` if the invocation had
    /// already settled, in which case `value` is dropped.
    pub fn resolve(&self, value: Value) -> bool {
        self.guard.settle(Ok(value))
    }

    /// Returns `true` once the invocation has settled by any means.
    pub fn is_settled(&self) -> bool {
        self.guard.is_settled()
    }
}

/// Input handed to a stage.
#[derive(Debug)]
pub struct StageContext {
    value: Value,
    short_circuit: ShortCircuit,
    method: Arc<str>,
    stage: Arc<str>,
    kind: StageKind,
    index: usize,
}

impl StageContext {
    pub(crate) fn new(
        value: Value,
        short_circuit: ShortCircuit,
        method: Arc<str>,
        stage: Arc<str>,
        kind: StageKind,
        index: usize,
    ) -> Self {
        Self {
            value,
            short_circuit,
            method,
            stage,
            kind,
            index,
        }
    }

    /// Creates a context outside any pipeline.
    ///
    /// The short-circuit handle settles nothing observable. Useful for
    /// testing a stage in isolation.
    pub fn detached(value: Value) -> Self {
        let (sender, _receiver) = oneshot::channel();
        Self::new(
            value,
            ShortCircuit::new(SettleGuard::new(sender)),
            Arc::from(""),
            Arc::from(""),
            StageKind::Method,
            0,
        )
    }

    /// Returns the current value.
    pub const fn value(&self) -> &Value {
        &self.value
    }

    /// Returns `value.metadata`, or `null` when absent.
    pub fn metadata(&self) -> &Value {
        metadata_of(&self.value)
    }

    /// Returns the short-circuit handle.
    pub const fn short_circuit(&self) -> &ShortCircuit {
        &self.short_circuit
    }

    /// Returns the name of the invoked method.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Returns the name of the running stage.
    pub fn stage(&self) -> &str {
        &self.stage
    }

    /// Returns the kind of the running stage.
    pub const fn kind(&self) -> StageKind {
        self.kind
    }

    /// Returns the position of the running stage.
    pub const fn index(&self) -> usize {
        self.index
    }

    /// Consumes the context, returning the value.
    pub fn into_value(self) -> Value {
        self.value
    }

    /// Consumes the context, returning the value and the short-circuit
    /// handle for use inside an async stage.
    pub fn into_parts(self) -> (Value, ShortCircuit) {
        (self.value, self.short_circuit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_first_settlement_wins() {
        let (sender, mut receiver) = oneshot::channel();
        let guard = SettleGuard::new(sender);
        let short_circuit = ShortCircuit::new(Arc::clone(&guard));

        assert!(!short_circuit.is_settled());
        assert!(short_circuit.resolve(json!(11)));
        assert!(!short_circuit.resolve(json!(12)));
        assert!(!guard.settle(Ok(json!(2))));

        assert!(guard.is_settled());
        assert_eq!(receiver.try_recv().unwrap().unwrap(), json!(11));
    }

    #[test]
    fn test_short_circuit_after_completion_is_dropped() {
        let (sender, mut receiver) = oneshot::channel();
        let guard = SettleGuard::new(sender);
        let short_circuit = ShortCircuit::new(Arc::clone(&guard));

        assert!(guard.settle(Ok(json!(2))));
        assert!(!short_circuit.resolve(json!(11)));
        assert_eq!(receiver.try_recv().unwrap().unwrap(), json!(2));
    }

    #[test]
    fn test_settle_with_dropped_receiver() {
        let (sender, receiver) = oneshot::channel();
        drop(receiver);
        let guard = SettleGuard::new(sender);
        assert!(guard.settle(Ok(json!(1))));
        assert!(guard.is_settled());
    }

    #[test]
    fn test_detached_context() {
        let ctx = StageContext::detached(json!({ "metadata": { "user": "u1" }, "n": 1 }));
        assert_eq!(ctx.metadata(), &json!({ "user": "u1" }));
        assert!(ctx.short_circuit().resolve(json!(0)));

        let (value, short_circuit) = ctx.into_parts();
        assert_eq!(value["n"], json!(1));
        assert!(short_circuit.is_settled());
    }

    #[test]
    fn test_metadata_absent_is_null() {
        let ctx = StageContext::detached(json!(1));
        assert!(ctx.metadata().is_null());
    }
}
