//! Shield configuration

use crate::error::{Result, ShieldError};
use serde::{Deserialize, Serialize};

/// Message surfaced for a plain denial
pub const DEFAULT_DENY_MESSAGE: &str = "Not Authorised!";

/// Options fixed when the policy tree is built
///
/// Environment variables read by [`ShieldOptions::from_env`]:
/// - `SHIELD_DEBUG` - surface internal predicate failures (default: false)
/// - `SHIELD_FALLBACK_ERROR` - denial message (default: "Not Authorised!")
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShieldOptions {
    /// Surface unexpected predicate failures instead of masking them
    #[serde(default)]
    pub debug: bool,

    /// Message used for plain denials and masked failures
    #[serde(default = "default_fallback_error")]
    pub fallback_error: String,
}

fn default_fallback_error() -> String {
    DEFAULT_DENY_MESSAGE.to_string()
}

impl Default for ShieldOptions {
    fn default() -> Self {
        Self {
            debug: false,
            fallback_error: default_fallback_error(),
        }
    }
}

impl ShieldOptions {
    /// Debug-mode options with the default denial message
    pub fn debug() -> Self {
        Self {
            debug: true,
            ..Default::default()
        }
    }

    pub fn with_fallback_error(mut self, message: impl Into<String>) -> Self {
        self.fallback_error = message.into();
        self
    }

    /// Load options from the environment, falling back to defaults
    pub fn from_env() -> Result<Self> {
        let mut options = Self::default();

        if let Ok(raw) = std::env::var("SHIELD_DEBUG") {
            options.debug = parse_flag(&raw)
                .ok_or_else(|| ShieldError::Config(format!("SHIELD_DEBUG: invalid flag '{}'", raw)))?;
        }

        if let Ok(message) = std::env::var("SHIELD_FALLBACK_ERROR") {
            options.fallback_error = message;
        }

        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<()> {
        if self.fallback_error.trim().is_empty() {
            return Err(ShieldError::Config("fallback_error must not be empty".to_string()));
        }
        Ok(())
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}
