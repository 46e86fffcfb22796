//! Atomic rules and their predicates

use crate::error::RuleError;
use crate::types::FieldCall;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// How a rule's outcome is memoized within a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheMode {
    /// Once per request context, whatever the parent value or arguments
    #[default]
    Contextual,

    /// Re-run the predicate at every dispatch site
    NoCache,
}

/// Authorization check behind a rule
///
/// Implement this for predicates that carry their own state; plain async
/// closures can be registered directly with
/// [`PolicyBuilder::rule`](super::PolicyBuilder::rule).
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use cretoai_shield::{FieldCall, Predicate, RuleError};
///
/// struct HasRole(&'static str);
///
/// #[async_trait]
/// impl Predicate for HasRole {
///     async fn check(&self, call: &FieldCall) -> Result<bool, RuleError> {
///         Ok(call.context.data()["role"] == self.0)
///     }
/// }
/// ```
#[async_trait]
pub trait Predicate: Send + Sync {
    async fn check(&self, call: &FieldCall) -> Result<bool, RuleError>;
}

struct FnPredicate<F>(F);

#[async_trait]
impl<F, Fut> Predicate for FnPredicate<F>
where
    F: Fn(FieldCall) -> Fut + Send + Sync,
    Fut: Future<Output = Result<bool, RuleError>> + Send + 'static,
{
    async fn check(&self, call: &FieldCall) -> Result<bool, RuleError> {
        (self.0)(call.clone()).await
    }
}

/// Named predicate with a cache mode
///
/// A rule's identity is the node id it receives when registered, never its
/// name: two rules called "isAdmin" are cached independently.
#[derive(Clone)]
pub struct Rule {
    name: String,
    cache: CacheMode,
    predicate: Arc<dyn Predicate>,
}

impl Rule {
    pub fn new(name: impl Into<String>, cache: CacheMode, predicate: impl Predicate + 'static) -> Self {
        Self {
            name: name.into(),
            cache,
            predicate: Arc::new(predicate),
        }
    }

    pub fn from_fn<F, Fut>(name: impl Into<String>, cache: CacheMode, f: F) -> Self
    where
        F: Fn(FieldCall) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<bool, RuleError>> + Send + 'static,
    {
        Self::new(name, cache, FnPredicate(f))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cache_mode(&self) -> CacheMode {
        self.cache
    }

    /// Run the predicate once, bypassing any cache
    pub async fn check(&self, call: &FieldCall) -> Result<bool, RuleError> {
        self.predicate.check(call).await
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("name", &self.name)
            .field("cache", &self.cache)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FieldInfo, RequestContext};
    use serde_json::{json, Value};

    fn call(data: Value) -> FieldCall {
        FieldCall::new(
            Value::Null,
            Default::default(),
            RequestContext::new(data),
            FieldInfo::new("Query", "me"),
        )
    }

    struct HasRole(&'static str);

    #[async_trait]
    impl Predicate for HasRole {
        async fn check(&self, call: &FieldCall) -> Result<bool, RuleError> {
            Ok(call.context.data()["role"] == self.0)
        }
    }

    #[tokio::test]
    async fn test_closure_rule() {
        let rule = Rule::from_fn("isAuthenticated", CacheMode::Contextual, |call: FieldCall| async move {
            Ok(call.context.data()["user"].is_string())
        });

        assert_eq!(rule.name(), "isAuthenticated");
        assert!(rule.check(&call(json!({"user": "alice"}))).await.unwrap());
        assert!(!rule.check(&call(json!({}))).await.unwrap());
    }

    #[tokio::test]
    async fn test_struct_predicate() {
        let rule = Rule::new("isAdmin", CacheMode::NoCache, HasRole("admin"));

        assert_eq!(rule.cache_mode(), CacheMode::NoCache);
        assert!(rule.check(&call(json!({"role": "admin"}))).await.unwrap());
        assert!(!rule.check(&call(json!({"role": "guest"}))).await.unwrap());
    }

    #[test]
    fn test_cache_mode_serde() {
        assert_eq!(serde_json::to_value(CacheMode::NoCache).unwrap(), json!("no_cache"));
        assert_eq!(CacheMode::default(), CacheMode::Contextual);
    }
}
