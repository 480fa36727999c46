//! uboss Authorization - attribute and role based ACL rules
//!
//! This crate provides the authorization model used by the uboss gateway:
//!
//! - [`AttributeRule`] compares a metadata path against a literal or another
//!   metadata path (`include` / `equal`)
//! - [`RoleRule`] defers to named [`Role`] predicates
//! - [`AclRule`] binds methods to attribute and role rules
//! - [`AclEvaluator`] is the standalone, synchronous evaluator
//!
//! # Decision semantics
//!
//! ```text
//!   isAuthorized(method) = OR over AclRules bound to method
//!   AclRule              = OR over its attribute rules and role rules
//!                          (no rules at all ⇒ allow)
//!   no AclRule bound     ⇒ configured DefaultDecision
//! ```
//!
//! Evaluation is fail-closed: missing metadata, type mismatches, predicate
//! errors and predicate panics all evaluate to `false` and never surface as
//! errors.
//!
//! # Example
//!
//! ```
//! use std::collections::HashMap;
//! use std::sync::Arc;
//! use serde_json::json;
//! use uboss_authz::{role, AclRule, AttributeRule, Role};
//!
//! let acl = AclRule::for_method("increase")
//!     .attribute(AttributeRule::include("requestor.tags", json!("admin")))
//!     .roles(["owner"]);
//!
//! let mut roles: HashMap<String, Arc<dyn Role>> = HashMap::new();
//! roles.insert(
//!     "owner".to_string(),
//!     Arc::new(role::predicate(|m| m["owner"] == json!(true))),
//! );
//!
//! assert!(acl.evaluate(&json!({ "requestor": { "tags": ["admin"] } }), &roles));
//! assert!(acl.evaluate(&json!({ "owner": true }), &roles));
//! assert!(!acl.evaluate(&json!({ "requestor": { "tags": ["x"] } }), &roles));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod acl;
pub mod attribute;
pub mod evaluator;
pub mod role;

// Re-exports for convenience
pub use acl::AclRule;
pub use attribute::{AttributeRule, Operand, Predicate};
pub use evaluator::{AclEvaluator, AclLoad, AclRequest, EvaluatorSettings};
pub use role::{Role, RoleLookup, RoleRule};
