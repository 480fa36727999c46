//! # uboss Middleware
//!
//! The stage pipeline that runs every composed uboss method.
//!
//! ## Pipeline Stages
//!
//! ```text
//! request → beforeAuth… → [authorization] → beforeInvoke… → method → afterInvoke…
//!                                                                          ↓
//! result ←──────────── first of: last value | short-circuit | first error ─┘
//! ```
//!
//! | Kind            | Source                         | Purpose                              |
//! |-----------------|--------------------------------|--------------------------------------|
//! | `beforeAuth`    | configured middlewares         | Enrich the request before the gate   |
//! | `authorization` | [`AuthorizationGate`]          | Evaluate the method's ACL rule       |
//! | `beforeInvoke`  | configured middlewares         | Prepare the method input             |
//! | `method`        | the registered method          | Business logic                       |
//! | `afterInvoke`   | configured middlewares         | Post-process the method output       |
//!
//! ## Key Features
//!
//! - **One contract**: middlewares and methods are both [`Middleware`]s
//! - **Sync or async**: a stage returns [`StageOutput::Ready`] or
//!   [`StageOutput::Pending`]; only pending stages suspend the invocation
//! - **Settle once**: [`ShortCircuit`] ends an invocation early; later stages
//!   still run but cannot change the result
//! - **Fail fast**: the first error, or a panic, aborts the remaining stages
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use serde_json::{json, Value};
//! use uboss_core::Phase;
//! use uboss_middleware::{from_fn, Pipeline, StageContext, StageOutput};
//!
//! # tokio_test::block_on(async {
//! let pipeline = Pipeline::builder("increase")
//!     .middleware(
//!         Phase::BeforeInvoke,
//!         "shortCircuit",
//!         Arc::new(|ctx: StageContext| {
//!             let n = ctx.value().as_i64().unwrap_or(0);
//!             ctx.short_circuit().resolve(json!(n + 10));
//!             StageOutput::ready(ctx.into_value())
//!         }),
//!     )
//!     .method(Arc::new(from_fn(|n: Value| Ok(json!(n.as_i64().unwrap_or(0) + 1)))))
//!     .build();
//!
//! assert_eq!(pipeline.invoke(json!(1)).await.unwrap(), json!(11));
//! # });
//! ```

#![doc(html_root_url = "https://docs.rs/uboss-middleware/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod context;
pub mod middleware;
pub mod pipeline;
pub mod stages;

// Re-export main types at crate root
pub use context::{ShortCircuit, StageContext};
pub use middleware::{from_async_fn, from_fn, identity, BoxFuture, Middleware, StageOutput};
pub use pipeline::{Invocation, Pipeline, PipelineBuilder, Stage, StageKind};
pub use stages::authorization::{AuthorizationGate, SharedRoles};
