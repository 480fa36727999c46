//! # uboss
//!
//! **Authorization-aware method gateway**
//!
//! uboss wires plain functions into invocable pipelines. You register named
//! methods, middlewares and roles, describe per method which middlewares run
//! in which phase and which ACL protects it, and compose the whole thing
//! into an API:
//!
//! ```text
//! request → beforeAuth… → [authorization] → beforeInvoke… → method → afterInvoke…
//! ```
//!
//! - **Fail fast**: `compose()` checks every reference before building
//!   anything and never yields a partial API
//! - **Snapshots**: a composed API keeps the callables it was built with
//! - **Fail closed**: ACL evaluation problems count as "not granted"
//!
//! ## Quick Start
//!
//! ```
//! use serde_json::{json, Value};
//! use uboss::prelude::*;
//!
//! # tokio_test::block_on(async {
//! let mut gateway = Gateway::new();
//! gateway
//!     .load(Load::method("increase", from_fn(|n: Value| {
//!         Ok(json!(n["value"].as_i64().unwrap_or(0) + 1))
//!     })))
//!     .unwrap()
//!     .load(Load::role("admin", role::predicate(|m| m["requestor"] == json!("admin"))))
//!     .unwrap()
//!     .load(Load::config(json!({
//!         "methods": { "increase": { "acl": { "roles": ["admin"] } } }
//!     })))
//!     .unwrap();
//!
//! let api = gateway.compose().unwrap();
//!
//! let admin = json!({ "metadata": { "requestor": "admin" }, "value": 1 });
//! assert_eq!(api.invoke("increase", admin).await.unwrap(), json!(2));
//!
//! let guest = json!({ "metadata": { "requestor": "guest" }, "value": 1 });
//! assert!(api.invoke("increase", guest).await.unwrap_err().is_unauthorized());
//! # });
//! ```
//!
//! ## Crates
//!
//! | Crate              | Contents                                         |
//! |--------------------|--------------------------------------------------|
//! | `uboss-core`       | errors, phases, deployment policies              |
//! | `uboss-authz`      | ACL model and the standalone [`AclEvaluator`]    |
//! | `uboss-middleware` | stage contract and the pipeline executor         |
//! | `uboss-config`     | settings loader and declarative gateway config   |
//! | `uboss-telemetry`  | logging and metrics                              |
//!
//! [`AclEvaluator`]: uboss_authz::AclEvaluator

#![doc(html_root_url = "https://docs.rs/uboss/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod api;
mod gateway;
mod load;
mod registry;
mod simple;

pub use api::ComposedApi;
pub use gateway::{Gateway, GatewayBuilder};
pub use load::{Load, MethodBatch, MiddlewareBatch, RoleBatch};
pub use registry::{Registry, SharedRole, SharedStage};
pub use simple::SimpleGateway;

// Re-export member crates
pub use uboss_authz as authz;
pub use uboss_config as config;
pub use uboss_core as core;
pub use uboss_middleware as middleware;
pub use uboss_telemetry as telemetry;

/// Installs logging and metrics as described by deployment settings.
///
/// # Errors
///
/// Returns `TelemetryError` if a global subscriber is already installed or
/// the log filter is invalid.
pub fn init_telemetry(config: &uboss_config::UbossConfig) -> uboss_telemetry::TelemetryResult<()> {
    uboss_telemetry::init_telemetry(&config.telemetry.to_telemetry_config())
}

/// Prelude module for convenient imports.
///
/// ```
/// use uboss::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{ComposedApi, Gateway, Load, Registry, SimpleGateway};

    pub use uboss_authz::{
        role, AclEvaluator, AclLoad, AclRequest, AclRule, AttributeRule, Operand, Role,
    };
    pub use uboss_config::{ConfigLoader, ConfigSource, UbossConfig};
    pub use uboss_core::{DefaultDecision, DuplicatePolicy, Phase, UbossError, UbossResult};
    pub use uboss_middleware::{
        from_async_fn, from_fn, Invocation, Middleware, Pipeline, ShortCircuit, StageContext,
        StageOutput,
    };
}
