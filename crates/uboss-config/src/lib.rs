//! Typed configuration for uboss.
//!
//! This crate covers two kinds of configuration:
//!
//! - [`UbossConfig`]: deployment settings (duplicate policy, default
//!   authorization decision, telemetry), loaded in layers by
//!   [`ConfigLoader`] (defaults → file → env)
//! - [`GatewayConfig`]: the declarative per-method document naming the
//!   middleware chains and ACL of each method
//!
//! # Settings example
//!
//! ```no_run
//! use uboss_config::ConfigLoader;
//!
//! # fn main() -> Result<(), uboss_config::ConfigError> {
//! let config = ConfigLoader::new()
//!     .with_defaults()
//!     .with_file("uboss.toml")?
//!     .with_env_prefix("UBOSS")
//!     .load()?;
//!
//! println!("duplicates: {:?}", config.registry.duplicates);
//! # Ok(())
//! # }
//! ```
//!
//! # Settings file format
//!
//! ```toml
//! [registry]
//! duplicates = "reject"          # or "overwrite"
//!
//! [authorization]
//! default_decision = "deny"      # or "allow"
//! require_acl = true
//!
//! [telemetry.logging]
//! enabled = true
//! level = "info"
//! format = "json"                # or "pretty"
//! include_location = false
//!
//! [telemetry.metrics]
//! enabled = true
//! ```
//!
//! # Environment variable overrides
//!
//! With a prefix set, `PREFIX__SECTION__KEY` overrides a single value:
//!
//! - `UBOSS__REGISTRY__DUPLICATES=reject`
//! - `UBOSS__AUTHORIZATION__DEFAULT_DECISION=deny`
//! - `UBOSS__TELEMETRY__LOGGING__LEVEL=uboss=debug`
//!
//! # Gateway document example
//!
//! ```
//! use serde_json::json;
//! use uboss_config::{ConfigMode, GatewayConfig};
//! use uboss_core::Phase;
//!
//! let config = GatewayConfig::parse(
//!     &json!({
//!         "methods": {
//!             "increase": {
//!                 "middlewares": { "beforeInvoke": ["validate"] },
//!                 "acl": { "roles": ["admin"] }
//!             }
//!         }
//!     }),
//!     ConfigMode::Full,
//! )
//! .unwrap();
//!
//! let increase = config.get("increase").unwrap();
//! assert_eq!(increase.middlewares().get(Phase::BeforeInvoke), ["validate"]);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod gateway;
mod loader;
mod schema;

pub use config::*;
pub use error::ConfigError;
pub use gateway::{ConfigMode, ConfigSource, GatewayConfig, MethodConfig, PhaseMiddlewares};
pub use loader::ConfigLoader;
pub use schema::*;
