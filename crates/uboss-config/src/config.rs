//! Deployment configuration.
//!
//! [`UbossConfig`] holds the per-deployment policies of a gateway. The
//! per-method declarative configuration is [`GatewayConfig`](crate::GatewayConfig).

use serde::{Deserialize, Serialize};
use uboss_authz::EvaluatorSettings;
use uboss_core::{DefaultDecision, DuplicatePolicy};

use crate::{AuthorizationSettings, ConfigError, LogFormat, LoggingConfig, RegistrySettings, TelemetrySection};

/// Complete uboss deployment configuration.
///
/// Use [`ConfigLoader`](crate::ConfigLoader) to load it from files and
/// environment variables.
///
/// # Example
///
/// ```
/// use uboss_config::UbossConfig;
/// use uboss_core::{DefaultDecision, DuplicatePolicy};
///
/// let config = UbossConfig::default();
/// assert_eq!(config.registry.duplicates, DuplicatePolicy::Overwrite);
/// assert_eq!(config.authorization.default_decision, DefaultDecision::Allow);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct UbossConfig {
    /// Registry settings.
    #[serde(default)]
    pub registry: RegistrySettings,

    /// Authorization settings.
    #[serde(default)]
    pub authorization: AuthorizationSettings,

    /// Telemetry configuration (logging, metrics).
    #[serde(default)]
    pub telemetry: TelemetrySection,
}

impl UbossConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if:
    /// - The log level is not a valid filter directive
    /// - `require_acl` is set together with a default-allow decision
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.telemetry.logging.enabled {
            uboss_telemetry::create_env_filter(&self.telemetry.logging.level).map_err(|e| {
                ConfigError::invalid_value("telemetry.logging.level", e.to_string())
            })?;
        }

        // With every method protected the default decision is unreachable;
        // an explicit allow there signals a misunderstanding.
        if self.authorization.require_acl
            && self.authorization.default_decision == DefaultDecision::Allow
        {
            return Err(ConfigError::invalid_value(
                "authorization.default_decision",
                "must be 'deny' when require_acl is set",
            ));
        }

        Ok(())
    }

    /// Create a development configuration preset.
    ///
    /// - Pretty debug logs with source locations
    /// - Later registrations overwrite earlier ones
    /// - Methods without an ACL are callable
    ///
    /// # Example
    ///
    /// ```
    /// use uboss_config::UbossConfig;
    ///
    /// let config = UbossConfig::development();
    /// assert_eq!(config.telemetry.logging.level, "debug");
    /// ```
    #[must_use]
    pub fn development() -> Self {
        Self {
            registry: RegistrySettings {
                duplicates: DuplicatePolicy::Overwrite,
            },
            authorization: AuthorizationSettings {
                default_decision: DefaultDecision::Allow,
                require_acl: false,
            },
            telemetry: TelemetrySection {
                logging: LoggingConfig {
                    enabled: true,
                    level: "debug".to_string(),
                    format: LogFormat::Pretty,
                    include_location: true,
                },
                ..TelemetrySection::default()
            },
        }
    }

    /// Create a production configuration preset.
    ///
    /// - JSON info logs
    /// - Duplicate names are rejected
    /// - Every configured method must carry an ACL; anything else is denied
    ///
    /// # Example
    ///
    /// ```
    /// use uboss_config::UbossConfig;
    /// use uboss_core::DuplicatePolicy;
    ///
    /// let config = UbossConfig::production();
    /// assert_eq!(config.registry.duplicates, DuplicatePolicy::Reject);
    /// assert!(config.authorization.require_acl);
    /// ```
    #[must_use]
    pub fn production() -> Self {
        Self {
            registry: RegistrySettings {
                duplicates: DuplicatePolicy::Reject,
            },
            authorization: AuthorizationSettings {
                default_decision: DefaultDecision::Deny,
                require_acl: true,
            },
            telemetry: TelemetrySection::default(),
        }
    }
}

/// Applies the deployment policies to the standalone evaluator.
impl From<&UbossConfig> for EvaluatorSettings {
    fn from(config: &UbossConfig) -> Self {
        Self {
            require_acl: config.authorization.require_acl,
            default_decision: config.authorization.default_decision,
            duplicates: config.registry.duplicates,
        }
    }
}
