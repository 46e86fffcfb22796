//! Error types for the field authorization engine

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while building policies or wiring them onto a schema
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ShieldError {
    /// Invalid policy definition
    #[error("Invalid policy: {0}")]
    InvalidPolicy(String),

    /// Policy names a type the schema does not define
    #[error("Unknown type in policy: {0}")]
    UnknownType(String),

    /// Policy names a field the type does not define
    #[error("Unknown field in policy: {type_name}.{field_name}")]
    UnknownField {
        type_name: String,
        field_name: String,
    },

    /// Invalid schema definition
    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Result type for policy construction and wiring
pub type Result<T> = std::result::Result<T, ShieldError>;

/// Failure raised by a rule predicate
///
/// A predicate either answers `Ok(bool)` or fails. `Custom` marks a
/// deliberate denial whose message reaches the caller verbatim; `Internal`
/// is an unexpected failure, masked unless the shield runs in debug mode.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum RuleError {
    /// Deliberate denial carrying an application-supplied message
    #[error("{0}")]
    Custom(String),

    /// Unexpected failure while evaluating the predicate
    #[error("{0}")]
    Internal(String),
}

impl RuleError {
    /// Deny with a message surfaced to the caller as-is
    pub fn custom(message: impl Into<String>) -> Self {
        Self::Custom(message.into())
    }

    /// Wrap any displayable failure as an internal error
    pub fn internal(err: impl std::fmt::Display) -> Self {
        Self::Internal(err.to_string())
    }

    pub fn is_custom(&self) -> bool {
        matches!(self, Self::Custom(_))
    }
}

impl From<anyhow::Error> for RuleError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(format!("{:#}", err))
    }
}

/// Error attached to a single field of the response
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{message}")]
pub struct FieldError {
    pub message: String,
}

impl FieldError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<RuleError> for FieldError {
    fn from(err: RuleError) -> Self {
        Self::new(err.to_string())
    }
}

impl From<anyhow::Error> for FieldError {
    fn from(err: anyhow::Error) -> Self {
        Self::new(err.to_string())
    }
}
