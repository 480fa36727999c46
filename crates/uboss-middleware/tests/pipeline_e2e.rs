//! End-to-end pipeline integration tests.
//!
//! These tests assemble full stage lists the way the gateway does:
//!
//! 1. beforeAuth middlewares
//! 2. Authorization gate
//! 3. beforeInvoke middlewares
//! 4. Target method
//! 5. afterInvoke middlewares

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use http::StatusCode;
use parking_lot::Mutex;
use serde_json::{json, Value};
use uboss_authz::{role, AclRule, AttributeRule, Role};
use uboss_core::{DefaultDecision, Phase, UbossError};
use uboss_middleware::{
    from_async_fn, from_fn, AuthorizationGate, Middleware, Pipeline, SharedRoles, StageContext,
    StageOutput,
};

fn roles() -> SharedRoles {
    let mut roles: HashMap<String, Arc<dyn Role>> = HashMap::new();
    roles.insert(
        "admin".to_string(),
        Arc::new(role::predicate(|m| m["requestor"] == json!("admin"))),
    );
    Arc::new(roles)
}

/// Records the stage names it sees, in order.
fn tracer(log: &Arc<Mutex<Vec<String>>>) -> Arc<dyn Middleware> {
    let log = Arc::clone(log);
    Arc::new(move |ctx: StageContext| {
        log.lock().push(format!("{}:{}", ctx.kind(), ctx.stage()));
        StageOutput::ready(ctx.into_value())
    })
}

/// Adds a role tag to the request metadata.
fn promote() -> Arc<dyn Middleware> {
    Arc::new(from_fn(|mut request: Value| {
        request["metadata"]["requestor"] = json!("admin");
        Ok(request)
    }))
}

fn full_pipeline(log: &Arc<Mutex<Vec<String>>>, before_auth: Arc<dyn Middleware>) -> Pipeline {
    let gate = AuthorizationGate::new(
        Some(AclRule::for_method("increase").roles(["admin"])),
        roles(),
        DefaultDecision::Allow,
    );

    Pipeline::builder("increase")
        .middleware(Phase::BeforeAuth, "promote", before_auth)
        .gate(Arc::new(gate))
        .middleware(Phase::BeforeInvoke, "trace", tracer(log))
        .method(Arc::new(from_fn(|request: Value| {
            Ok(json!(request["n"].as_i64().unwrap_or(0) + 1))
        })))
        .middleware(Phase::AfterInvoke, "trace", tracer(log))
        .build()
}

#[tokio::test]
async fn test_before_auth_runs_ahead_of_the_gate() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let pipeline = full_pipeline(&log, promote());

    let result = pipeline
        .invoke(json!({ "metadata": { "requestor": "guest" }, "n": 1 }))
        .await
        .unwrap();

    assert_eq!(result, json!(2));
    assert_eq!(
        *log.lock(),
        vec!["beforeInvoke:trace".to_string(), "afterInvoke:trace".to_string()]
    );
    assert_eq!(
        pipeline.stage_names(),
        vec!["promote", "authorization", "trace", "increase", "trace"]
    );
}

#[tokio::test]
async fn test_denied_request_skips_everything_after_the_gate() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let pipeline = full_pipeline(&log, Arc::new(from_fn(Ok)));

    let err = pipeline
        .invoke(json!({ "metadata": { "requestor": "guest" }, "n": 1 }))
        .await
        .unwrap_err();

    assert!(err.is_unauthorized());
    assert_eq!(err.status_code(), Some(StatusCode::FORBIDDEN));
    tokio::time::sleep(Duration::from_millis(5)).await;
    assert!(log.lock().is_empty());
}

#[tokio::test]
async fn test_after_invoke_receives_method_output() {
    let seen = Arc::new(Mutex::new(None));
    let probe = Arc::clone(&seen);

    let pipeline = Pipeline::builder("upper")
        .method(Arc::new(from_fn(|v: Value| {
            Ok(json!(v.as_str().unwrap_or_default().to_uppercase()))
        })))
        .middleware(
            Phase::AfterInvoke,
            "probe",
            Arc::new(move |ctx: StageContext| {
                *probe.lock() = Some(ctx.value().clone());
                StageOutput::ready(json!({ "wrapped": ctx.into_value() }))
            }),
        )
        .build();

    let result = pipeline.invoke(json!("abc")).await.unwrap();
    assert_eq!(*seen.lock(), Some(json!("ABC")));
    assert_eq!(result, json!({ "wrapped": "ABC" }));
}

#[tokio::test]
async fn test_mixed_sync_and_async_stages() {
    let pipeline = Pipeline::builder("compute")
        .middleware(
            Phase::BeforeInvoke,
            "double",
            Arc::new(from_async_fn(|v: Value| async move {
                tokio::time::sleep(Duration::from_millis(2)).await;
                Ok(json!(v.as_i64().unwrap_or(0) * 2))
            })),
        )
        .method(Arc::new(from_fn(|v: Value| Ok(json!(v.as_i64().unwrap_or(0) + 1)))))
        .middleware(
            Phase::AfterInvoke,
            "negate",
            Arc::new(from_async_fn(|v: Value| async move {
                Ok(json!(-v.as_i64().unwrap_or(0)))
            })),
        )
        .build();

    assert_eq!(pipeline.invoke(json!(3)).await.unwrap(), json!(-7));
}

#[tokio::test]
async fn test_async_short_circuit_from_pending_stage() {
    let pipeline = Pipeline::builder("m")
        .middleware(
            Phase::BeforeInvoke,
            "cache",
            Arc::new(|ctx: StageContext| {
                let (value, short_circuit) = ctx.into_parts();
                StageOutput::pending(async move {
                    tokio::task::yield_now().await;
                    short_circuit.resolve(json!("cached"));
                    Ok(value)
                })
            }),
        )
        .method(Arc::new(from_async_fn(|_v: Value| async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            Ok(json!("fresh"))
        })))
        .build();

    assert_eq!(pipeline.invoke(json!(null)).await.unwrap(), json!("cached"));
}

#[tokio::test]
async fn test_business_error_status_is_preserved() {
    let pipeline = Pipeline::builder("m")
        .method(Arc::new(from_fn(|_| {
            Err(UbossError::execution("not found")
                .with_status(StatusCode::NOT_FOUND)
                .with_source(anyhow::anyhow!("row 7 missing")))
        })))
        .build();

    let err = pipeline.invoke(json!(1)).await.unwrap_err();
    assert_eq!(err.to_string(), "not found");
    assert_eq!(err.status_code(), Some(StatusCode::NOT_FOUND));
    assert!(std::error::Error::source(&err).is_some());
}

#[tokio::test]
async fn test_attribute_gate_with_path_operand() {
    let gate = AuthorizationGate::new(
        Some(
            AclRule::for_method("update").attribute(AttributeRule::equal(
                "resource.owner",
                uboss_authz::Operand::path("requestor.id"),
            )),
        ),
        roles(),
        DefaultDecision::Deny,
    );
    let pipeline = Pipeline::builder("update")
        .gate(Arc::new(gate))
        .method(Arc::new(from_fn(|_| Ok(json!("updated")))))
        .build();

    let owner = json!({ "metadata": { "resource": { "owner": "u1" }, "requestor": { "id": "u1" } } });
    let other = json!({ "metadata": { "resource": { "owner": "u1" }, "requestor": { "id": "u2" } } });

    assert_eq!(pipeline.invoke(owner).await.unwrap(), json!("updated"));
    assert!(pipeline.invoke(other).await.unwrap_err().is_unauthorized());
}
