//! Decision results and their boolean composition

use crate::error::RuleError;
use serde::{Deserialize, Serialize};

/// Outcome of evaluating a policy node for one field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "detail")]
pub enum Decision {
    /// Access granted
    Allowed,

    /// Predicate answered no; carries the denial reason
    Denied(String),

    /// Predicate failed; carries the cause
    Errored(RuleError),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed)
    }

    /// Map a raw predicate result onto a decision
    pub fn from_predicate(result: std::result::Result<bool, RuleError>, deny_message: &str) -> Self {
        match result {
            Ok(true) => Decision::Allowed,
            Ok(false) => Decision::Denied(deny_message.to_string()),
            Err(err) => Decision::Errored(err),
        }
    }

    /// AND over children in declaration order
    ///
    /// Allowed iff every child is allowed, otherwise the first non-allowed
    /// child decides.
    pub fn all(children: impl IntoIterator<Item = Decision>) -> Self {
        children
            .into_iter()
            .find(|d| !d.is_allowed())
            .unwrap_or(Decision::Allowed)
    }

    /// OR over children in declaration order
    ///
    /// Allowed iff any child is allowed. Otherwise the first errored child
    /// decides; if every child was denied, the last denial reason is kept.
    pub fn any(children: impl IntoIterator<Item = Decision>, deny_message: &str) -> Self {
        let mut first_error = None;
        let mut last_denial = None;

        for child in children {
            match child {
                Decision::Allowed => return Decision::Allowed,
                Decision::Errored(err) => {
                    if first_error.is_none() {
                        first_error = Some(err);
                    }
                }
                Decision::Denied(reason) => last_denial = Some(reason),
            }
        }

        match (first_error, last_denial) {
            (Some(err), _) => Decision::Errored(err),
            (None, Some(reason)) => Decision::Denied(reason),
            (None, None) => Decision::Denied(deny_message.to_string()),
        }
    }

    /// Invert a decision; failures stay failures
    pub fn negate(self, deny_message: &str) -> Self {
        match self {
            Decision::Allowed => Decision::Denied(deny_message.to_string()),
            Decision::Denied(_) => Decision::Allowed,
            errored @ Decision::Errored(_) => errored,
        }
    }
}
