//! End-to-end gateway scenarios.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use http::StatusCode;
use parking_lot::Mutex;
use serde_json::{json, Value};
use uboss::prelude::*;

fn number(value: &Value) -> i64 {
    value.as_i64().unwrap_or_default()
}

fn increase() -> impl Middleware {
    from_fn(|n: Value| Ok(json!(number(&n) + 1)))
}

fn decrease() -> impl Middleware {
    from_fn(|n: Value| Ok(json!(number(&n) - 1)))
}

/// Role predicates compare `metadata.requestor` against the role name.
fn requestor_is(name: &'static str) -> impl Role {
    role::predicate(move |metadata| metadata["requestor"] == json!(name))
}

fn base_gateway() -> Gateway {
    let mut gateway = Gateway::new();
    gateway
        .load(Load::method("increase", increase()))
        .unwrap()
        .load(Load::middleware("increase", increase()).and_middleware("decrease", decrease()))
        .unwrap();
    gateway
}

#[tokio::test]
async fn middleware_then_method() {
    let mut gateway = base_gateway();
    gateway
        .load_config(json!({
            "methods": { "increase": { "middlewares": { "beforeInvoke": ["increase"] } } }
        }))
        .unwrap();

    let api = gateway.compose().unwrap();
    assert_eq!(api.invoke("increase", json!(1)).await.unwrap(), json!(3));
}

#[tokio::test]
async fn middlewares_run_in_declaration_order() {
    let mut gateway = base_gateway();
    gateway
        .load_config(json!({
            "methods": { "increase": { "middlewares": { "beforeInvoke": ["increase", "decrease"] } } }
        }))
        .unwrap();

    let api = gateway.compose().unwrap();
    assert_eq!(api.invoke("increase", json!(1)).await.unwrap(), json!(2));
}

#[tokio::test]
async fn pending_method_resolves_to_its_output() {
    let mut gateway = Gateway::new();
    gateway
        .load(Load::method(
            "slow",
            from_async_fn(|n: Value| async move {
                tokio::time::sleep(Duration::from_millis(5)).await;
                Ok(json!(number(&n) * 10))
            }),
        ))
        .unwrap()
        .load_config(json!({ "methods": { "slow": {} } }))
        .unwrap();

    let api = gateway.compose().unwrap();
    assert_eq!(api.invoke("slow", json!(4)).await.unwrap(), json!(40));
}

#[tokio::test]
async fn roles_are_or_combined() {
    let mut gateway = Gateway::new();
    gateway
        .load(Load::method("increase", from_fn(|req: Value| Ok(json!(number(&req["value"]) + 1)))))
        .unwrap()
        .load(Load::role("admin", requestor_is("admin")).and_role("user", requestor_is("user")))
        .unwrap()
        .load_config(json!({
            "methods": { "increase": { "acl": { "roles": ["admin", "user"] } } }
        }))
        .unwrap();

    let api = gateway.compose().unwrap();

    let user = json!({ "metadata": { "requestor": "user" }, "value": 1 });
    assert_eq!(api.invoke("increase", user).await.unwrap(), json!(2));

    let partner = json!({ "metadata": { "requestor": "partner" }, "value": 1 });
    let err = api.invoke("increase", partner).await.unwrap_err();
    assert!(err.is_unauthorized());
    assert_eq!(err.to_string(), "Unauthorized");
    assert_eq!(err.status_code(), Some(StatusCode::FORBIDDEN));
}

#[tokio::test]
async fn attribute_include_rule() {
    let mut gateway = Gateway::new();
    gateway
        .load(Load::method("increase", from_fn(|_| Ok(json!("ok")))))
        .unwrap()
        .load_config(json!({
            "methods": {
                "increase": { "acl": { "attribute": { "path": "requestor.tags", "include": "admin" } } }
            }
        }))
        .unwrap();

    let api = gateway.compose().unwrap();

    let tagged = json!({ "metadata": { "requestor": { "tags": ["admin", "x"] } } });
    assert_eq!(api.invoke("increase", tagged).await.unwrap(), json!("ok"));

    let untagged = json!({ "metadata": { "requestor": { "tags": ["x"] } } });
    assert!(api.invoke("increase", untagged).await.unwrap_err().is_unauthorized());

    let anonymous = json!({ "value": 1 });
    assert!(api.invoke("increase", anonymous).await.unwrap_err().is_unauthorized());
}

#[tokio::test]
async fn short_circuit_bypasses_the_method() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);

    let mut gateway = Gateway::new();
    gateway
        .load(Load::method(
            "increase",
            from_fn(move |n: Value| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(json!(number(&n) + 1))
            }),
        ))
        .unwrap()
        .load(Load::middleware("shortCircuit", |ctx: StageContext| {
            let n = number(ctx.value());
            ctx.short_circuit().resolve(json!(n + 10));
            StageOutput::ready(ctx.into_value())
        }))
        .unwrap()
        .load_config(json!({
            "methods": { "increase": { "middlewares": { "beforeInvoke": ["shortCircuit"] } } }
        }))
        .unwrap();

    let api = gateway.compose().unwrap();
    assert_eq!(api.invoke("increase", json!(1)).await.unwrap(), json!(11));

    // Later stages still run for their side effects.
    tokio::time::sleep(Duration::from_millis(5)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn failure_after_short_circuit_is_not_observed() {
    let mut gateway = Gateway::new();
    gateway
        .load(Load::method(
            "explode",
            from_fn(|_| Err(UbossError::execution("too late"))),
        ))
        .unwrap()
        .load(Load::middleware("cached", |ctx: StageContext| {
            ctx.short_circuit().resolve(json!("cached"));
            StageOutput::ready(ctx.into_value())
        }))
        .unwrap()
        .load_config(json!({
            "methods": { "explode": { "middlewares": { "beforeInvoke": ["cached"] } } }
        }))
        .unwrap();

    let api = gateway.compose().unwrap();
    assert_eq!(api.invoke("explode", json!(null)).await.unwrap(), json!("cached"));
}

#[tokio::test]
async fn slow_after_invoke_does_not_delay_a_short_circuit() {
    let finished = Arc::new(Mutex::new(false));
    let flag = Arc::clone(&finished);

    let mut gateway = base_gateway();
    gateway
        .load(Load::middleware("early", |ctx: StageContext| {
            ctx.short_circuit().resolve(json!("early"));
            StageOutput::ready(ctx.into_value())
        }))
        .unwrap()
        .load(Load::middleware(
            "slow",
            from_async_fn(move |v: Value| {
                let flag = Arc::clone(&flag);
                async move {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    *flag.lock() = true;
                    Ok(v)
                }
            }),
        ))
        .unwrap()
        .load_config(json!({
            "methods": {
                "increase": { "middlewares": { "beforeInvoke": ["early"], "afterInvoke": ["slow"] } }
            }
        }))
        .unwrap();

    let api = gateway.compose().unwrap();
    assert_eq!(api.invoke("increase", json!(1)).await.unwrap(), json!("early"));
    assert!(!*finished.lock());
}

#[tokio::test]
async fn after_invoke_receives_method_output() {
    let mut gateway = base_gateway();
    gateway
        .load(Load::middleware("wrap", from_fn(|v: Value| Ok(json!({ "result": v })))))
        .unwrap()
        .load_config(json!({
            "methods": { "increase": { "middlewares": { "afterInvoke": ["wrap"] } } }
        }))
        .unwrap();

    let api = gateway.compose().unwrap();
    assert_eq!(api.invoke("increase", json!(1)).await.unwrap(), json!({ "result": 2 }));
}

#[tokio::test]
async fn rejected_stage_aborts_with_its_status() {
    let reached = Arc::new(AtomicUsize::new(0));
    let probe = Arc::clone(&reached);

    let mut gateway = base_gateway();
    gateway
        .load(Load::middleware(
            "lookup",
            from_async_fn(|_v: Value| async move {
                Err(UbossError::execution("record not found").with_status(StatusCode::NOT_FOUND))
            }),
        ))
        .unwrap()
        .load(Load::middleware(
            "probe",
            from_fn(move |v: Value| {
                probe.fetch_add(1, Ordering::SeqCst);
                Ok(v)
            }),
        ))
        .unwrap()
        .load_config(json!({
            "methods": {
                "increase": { "middlewares": { "beforeInvoke": ["lookup"], "afterInvoke": ["probe"] } }
            }
        }))
        .unwrap();

    let api = gateway.compose().unwrap();
    let err = api.invoke("increase", json!(1)).await.unwrap_err();
    assert_eq!(err.to_string(), "record not found");
    assert_eq!(err.status_code(), Some(StatusCode::NOT_FOUND));

    tokio::time::sleep(Duration::from_millis(5)).await;
    assert_eq!(reached.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn failing_role_predicate_is_unauthorized() {
    let mut gateway = base_gateway();
    gateway
        .load(Load::role(
            "error",
            role::fallible(|metadata| {
                let unknown = metadata["requestor"]["error"]
                    .get("unknown")
                    .ok_or_else(|| anyhow::anyhow!("requestor.error.unknown is not set"))?;
                Ok(unknown == &json!(true))
            }),
        ))
        .unwrap()
        .load_config(json!({
            "methods": { "increase": { "acl": { "roles": ["error"] } } }
        }))
        .unwrap();

    let api = gateway.compose().unwrap();
    let err = api
        .invoke("increase", json!({ "metadata": { "requestor": {} } }))
        .await
        .unwrap_err();
    assert!(matches!(err, UbossError::Unauthorized { .. }));
}

#[tokio::test]
async fn later_role_registration_is_consulted() {
    let mut gateway = base_gateway();
    gateway
        .load(Load::role("admin", role::predicate(|_| false)))
        .unwrap()
        .load(Load::role("admin", role::predicate(|_| true)))
        .unwrap()
        .load_config(json!({ "methods": { "increase": { "acl": { "roles": ["admin"] } } } }))
        .unwrap();

    let api = gateway.compose().unwrap();
    assert_eq!(api.invoke("increase", json!(1)).await.unwrap(), json!(2));
}

#[tokio::test]
async fn unprotected_method_uses_default_decision() {
    let mut gateway = Gateway::builder()
        .default_decision(DefaultDecision::Deny)
        .build();
    gateway
        .load(Load::method("increase", increase()))
        .unwrap()
        .load_config(json!({ "methods": { "increase": {} } }))
        .unwrap();

    let api = gateway.compose().unwrap();
    assert!(api.invoke("increase", json!(1)).await.unwrap_err().is_unauthorized());

    let mut gateway = Gateway::new();
    gateway
        .load(Load::method("increase", increase()))
        .unwrap()
        .load_config(json!({ "methods": { "increase": { "acl": {} } } }))
        .unwrap();
    let api = gateway.compose().unwrap();
    assert_eq!(api.invoke("increase", json!(1)).await.unwrap(), json!(2));
}

#[tokio::test]
async fn before_auth_can_establish_identity() {
    let mut gateway = base_gateway();
    gateway
        .load(Load::middleware(
            "session",
            from_fn(|mut request: Value| {
                if request["token"] == json!("secret") {
                    request["metadata"]["requestor"] = json!("admin");
                }
                Ok(request)
            }),
        ))
        .unwrap()
        .load(Load::middleware("unwrap", from_fn(|request: Value| Ok(request["value"].clone()))))
        .unwrap()
        .load(Load::role("admin", requestor_is("admin")))
        .unwrap()
        .load_config(json!({
            "methods": {
                "increase": {
                    "middlewares": { "beforeAuth": ["session"], "beforeInvoke": ["unwrap"] },
                    "acl": { "roles": ["admin"] }
                }
            }
        }))
        .unwrap();

    let api = gateway.compose().unwrap();
    let ok = json!({ "token": "secret", "value": 41 });
    assert_eq!(api.invoke("increase", ok).await.unwrap(), json!(42));

    let denied = json!({ "token": "guess", "value": 41 });
    assert!(api.invoke("increase", denied).await.unwrap_err().is_unauthorized());
}

#[test]
fn unregistered_method_fails_composition() {
    let mut gateway = base_gateway();
    gateway
        .load_config(json!({ "methods": { "increase": {}, "upper": {} } }))
        .unwrap();

    let err = gateway.compose().unwrap_err();
    assert!(matches!(err, UbossError::MissingMethod { ref name } if name == "upper"));
    assert!(err.to_string().contains("upper"));
}

#[test]
fn malformed_phase_fails_at_load_time() {
    let mut gateway = base_gateway();
    let err = gateway
        .load_config(json!({ "methods": { "increase": { "middlewares": { "beforeInvoke": {} } } } }))
        .unwrap_err();

    assert!(matches!(err, UbossError::ConfigShape { .. }));
    assert!(err.to_string().contains("beforeInvoke"));
}
