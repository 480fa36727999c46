//! Error types for uboss.
//!
//! This module provides the [`UbossError`] type, the single error type flowing
//! through registration, composition and invocation.
//!
//! # Categories
//!
//! | `ErrorCategory` | Raised by | When |
//! |---|---|---|
//! | `Registration` | `Registry`, config loading | synchronously, while loading |
//! | `Composition` | `compose`, `verify`, `ready` | synchronously, before any invocation |
//! | `Authorization` | the authorization gate | at invocation time |
//! | `Execution` | methods and middlewares | at invocation time, passed through unchanged |

use http::StatusCode;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result type alias using [`UbossError`].
pub type UbossResult<T> = Result<T, UbossError>;

/// Categories of errors for classification and handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Invalid names, duplicate entries, malformed declarative config.
    Registration,
    /// Dangling references found while composing or verifying.
    Composition,
    /// Access denied by the authorization gate.
    Authorization,
    /// Raised by a method or middleware during an invocation.
    Execution,
}

/// The kind of a registry entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// A business method.
    Method,
    /// A reusable middleware.
    Middleware,
    /// A named authorization predicate.
    Role,
}

impl EntryKind {
    /// Returns the lowercase name used in error messages.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Method => "method",
            Self::Middleware => "middleware",
            Self::Role => "role",
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Standard error type for uboss.
///
/// Business code raises [`UbossError::MethodExecution`] (usually through
/// [`UbossError::execution`]) and may attach a status code; the executor
/// propagates it to the caller unchanged.
///
/// # Example
///
/// ```
/// use uboss_core::UbossError;
/// use http::StatusCode;
///
/// let err = UbossError::execution("sync Error").with_status(StatusCode::BAD_REQUEST);
/// assert_eq!(err.to_string(), "sync Error");
/// assert_eq!(err.status_code(), Some(StatusCode::BAD_REQUEST));
/// ```
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum UbossError {
    /// A registry entry was registered under an empty or blank name.
    #[error("{kind} name must be a non-empty string, got {name:?}")]
    InvalidName {
        /// Kind of the rejected entry.
        kind: EntryKind,
        /// The rejected name.
        name: String,
    },

    /// A name was registered twice while duplicates are rejected.
    #[error("{kind} {name} has already been loaded")]
    DuplicateRegistration {
        /// Kind of the entry.
        kind: EntryKind,
        /// The duplicated name.
        name: String,
    },

    /// The load request cannot be interpreted.
    #[error("Unsupported load options: {reason}")]
    UnsupportedLoadOptions {
        /// Why the request was rejected.
        reason: String,
    },

    /// The declarative config has the wrong shape.
    #[error("{location}: {reason}")]
    ConfigShape {
        /// Dotted location of the offending entry (e.g. `increase.middlewares.beforeInvoke`).
        location: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A configured method has not been registered.
    #[error("method {name} has not been loaded")]
    MissingMethod {
        /// Name of the missing method.
        name: String,
    },

    /// A configured middleware has not been registered.
    #[error("middleware {name} has not been loaded")]
    MissingMiddleware {
        /// Name of the missing middleware.
        name: String,
        /// Method whose config references it.
        method: String,
        /// Phase in which it is referenced.
        phase: String,
    },

    /// A role referenced by an ACL rule has not been registered.
    #[error("role {name} has not been loaded")]
    MissingRole {
        /// Name of the missing role.
        name: String,
        /// Method whose ACL references it.
        method: String,
    },

    /// A method is not bound to any ACL rule while ACLs are mandatory.
    #[error("unprotected method: {name}")]
    UnprotectedMethod {
        /// Name of the unprotected method.
        name: String,
    },

    /// The evaluator was queried before `ready()` succeeded.
    #[error("evaluator is not ready: ready() must succeed before exec()")]
    NotReady,

    /// The gateway was queried before `verify()` succeeded.
    #[error("gateway is not verified: verify() must succeed before fetch()")]
    NotVerified,

    /// No pipeline is configured under this name.
    #[error("method {name} is not configured")]
    NotConfigured {
        /// The requested method name.
        name: String,
    },

    /// The authorization gate denied the invocation.
    #[error("Unauthorized")]
    Unauthorized {
        /// The method that was denied.
        method: String,
    },

    /// A method or middleware failed.
    #[error("{message}")]
    MethodExecution {
        /// Human-readable error message.
        message: String,
        /// Status code attached by the producer, if any.
        status: Option<StatusCode>,
        /// The underlying error.
        #[source]
        source: Option<anyhow::Error>,
    },
}

impl UbossError {
    /// Creates an invalid name error.
    #[must_use]
    pub fn invalid_name(kind: EntryKind, name: impl Into<String>) -> Self {
        Self::InvalidName {
            kind,
            name: name.into(),
        }
    }

    /// Creates a duplicate registration error.
    #[must_use]
    pub fn duplicate(kind: EntryKind, name: impl Into<String>) -> Self {
        Self::DuplicateRegistration {
            kind,
            name: name.into(),
        }
    }

    /// Creates an unsupported load options error.
    #[must_use]
    pub fn unsupported_load(reason: impl Into<String>) -> Self {
        Self::UnsupportedLoadOptions {
            reason: reason.into(),
        }
    }

    /// Creates a config shape error.
    #[must_use]
    pub fn config_shape(location: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConfigShape {
            location: location.into(),
            reason: reason.into(),
        }
    }

    /// Creates a missing method error.
    #[must_use]
    pub fn missing_method(name: impl Into<String>) -> Self {
        Self::MissingMethod { name: name.into() }
    }

    /// Creates a missing middleware error.
    #[must_use]
    pub fn missing_middleware(
        name: impl Into<String>,
        method: impl Into<String>,
        phase: impl Into<String>,
    ) -> Self {
        Self::MissingMiddleware {
            name: name.into(),
            method: method.into(),
            phase: phase.into(),
        }
    }

    /// Creates a missing role error.
    #[must_use]
    pub fn missing_role(name: impl Into<String>, method: impl Into<String>) -> Self {
        Self::MissingRole {
            name: name.into(),
            method: method.into(),
        }
    }

    /// Creates an unauthorized error for a method.
    #[must_use]
    pub fn unauthorized(method: impl Into<String>) -> Self {
        Self::Unauthorized {
            method: method.into(),
        }
    }

    /// Creates an execution error with a message.
    #[must_use]
    pub fn execution(message: impl Into<String>) -> Self {
        Self::MethodExecution {
            message: message.into(),
            status: None,
            source: None,
        }
    }

    /// Wraps any error as an execution error, keeping it as the source.
    pub fn from_source(source: impl Into<anyhow::Error>) -> Self {
        let source = source.into();
        Self::MethodExecution {
            message: source.to_string(),
            status: None,
            source: Some(source),
        }
    }

    /// Attaches a status code to an execution error.
    ///
    /// Other variants keep their fixed status and are returned unchanged.
    #[must_use]
    pub fn with_status(mut self, code: StatusCode) -> Self {
        if let Self::MethodExecution { status, .. } = &mut self {
            *status = Some(code);
        }
        self
    }

    /// Attaches an underlying error to an execution error.
    #[must_use]
    pub fn with_source(mut self, err: impl Into<anyhow::Error>) -> Self {
        if let Self::MethodExecution { source, .. } = &mut self {
            *source = Some(err.into());
        }
        self
    }

    /// Returns the error category.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidName { .. }
            | Self::DuplicateRegistration { .. }
            | Self::UnsupportedLoadOptions { .. }
            | Self::ConfigShape { .. } => ErrorCategory::Registration,
            Self::MissingMethod { .. }
            | Self::MissingMiddleware { .. }
            | Self::MissingRole { .. }
            | Self::UnprotectedMethod { .. }
            | Self::NotReady
            | Self::NotVerified
            | Self::NotConfigured { .. } => ErrorCategory::Composition,
            Self::Unauthorized { .. } => ErrorCategory::Authorization,
            Self::MethodExecution { .. } => ErrorCategory::Execution,
        }
    }

    /// Returns the status code carried by this error.
    ///
    /// `Unauthorized` is always 403. Execution errors carry whatever status
    /// their producer attached. Registration and composition errors have none.
    #[must_use]
    pub const fn status_code(&self) -> Option<StatusCode> {
        match self {
            Self::Unauthorized { .. } => Some(StatusCode::FORBIDDEN),
            Self::MethodExecution { status, .. } => *status,
            _ => None,
        }
    }

    /// Returns `true` if this is an authorization denial.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }
}
