//! Built-in pipeline stages.
//!
//! - [`authorization`] - The ACL gate inserted between `beforeAuth` and
//!   `beforeInvoke`

pub mod authorization;

pub use authorization::AuthorizationGate;
