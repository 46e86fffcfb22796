//! Mapping from decisions to the error a caller sees

use crate::config::ShieldOptions;
use crate::error::{FieldError, RuleError};
use crate::policy::Decision;
use tracing::warn;

/// Decides the message surfaced for a denied or errored field
///
/// - plain denial: the denial reason (the fallback message by default)
/// - custom failure: its message verbatim
/// - internal failure: its own message in debug mode, otherwise masked
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorPolicy {
    debug: bool,
    fallback_message: String,
}

impl ErrorPolicy {
    pub fn new(options: &ShieldOptions) -> Self {
        Self {
            debug: options.debug,
            fallback_message: options.fallback_error.clone(),
        }
    }

    pub fn is_debug(&self) -> bool {
        self.debug
    }

    pub fn fallback_message(&self) -> &str {
        &self.fallback_message
    }

    /// Error for a field, or `None` when access is allowed
    pub fn field_error(&self, decision: &Decision) -> Option<FieldError> {
        match decision {
            Decision::Allowed => None,
            Decision::Denied(reason) => Some(FieldError::new(reason.clone())),
            Decision::Errored(RuleError::Custom(message)) => Some(FieldError::new(message.clone())),
            Decision::Errored(RuleError::Internal(message)) => {
                if self.debug {
                    Some(FieldError::new(message.clone()))
                } else {
                    warn!(error = %message, "masking predicate failure");
                    Some(FieldError::new(self.fallback_message.clone()))
                }
            }
        }
    }
}
