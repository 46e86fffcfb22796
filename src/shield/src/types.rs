//! Core types shared by rules, the guard and the executor

use crate::cache::DecisionCache;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Field arguments as passed by the executor
pub type Args = serde_json::Map<String, Value>;

/// Scope token identifying one request context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScopeToken(u64);

impl ScopeToken {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ScopeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scope-{}", self.0)
    }
}

/// One segment of a response path
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    Field(String),
    Index(usize),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Field(name) => write!(f, "{}", name),
            PathSegment::Index(i) => write!(f, "{}", i),
        }
    }
}

/// Metadata about the field being resolved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldInfo {
    /// Parent object type name (e.g., "Query", "User")
    pub type_name: String,

    /// Field name within the parent type
    pub field_name: String,

    /// Response path of this field (aliases applied)
    #[serde(default)]
    pub path: Vec<PathSegment>,
}

impl FieldInfo {
    pub fn new(type_name: impl Into<String>, field_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            field_name: field_name.into(),
            path: Vec::new(),
        }
    }

    pub fn with_path(mut self, path: Vec<PathSegment>) -> Self {
        self.path = path;
        self
    }
}

struct ContextInner {
    scope: ScopeToken,
    data: Value,
    cache: DecisionCache,
}

/// Per-request context shared by reference across every field of a request
///
/// Cloning is cheap and yields a handle to the same request: same scope
/// token, same decision cache. A fresh context means a fresh cache; the cache
/// is dropped together with the last handle.
#[derive(Clone)]
pub struct RequestContext {
    inner: Arc<ContextInner>,
}

impl RequestContext {
    /// Create the context for a new request
    pub fn new(data: Value) -> Self {
        let scope = ScopeToken::next();
        Self {
            inner: Arc::new(ContextInner {
                scope,
                data,
                cache: DecisionCache::new(scope),
            }),
        }
    }

    /// Application data attached to this request (user, headers, ...)
    pub fn data(&self) -> &Value {
        &self.inner.data
    }

    pub fn scope(&self) -> ScopeToken {
        self.inner.scope
    }

    pub fn cache(&self) -> &DecisionCache {
        &self.inner.cache
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new(Value::Null)
    }
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("scope", &self.inner.scope)
            .field("data", &self.inner.data)
            .finish()
    }
}

/// Everything a resolver or rule predicate sees for one field resolution
#[derive(Debug, Clone)]
pub struct FieldCall {
    pub parent: Arc<Value>,
    pub args: Arc<Args>,
    pub context: RequestContext,
    pub info: Arc<FieldInfo>,
}

impl FieldCall {
    pub fn new(parent: Value, args: Args, context: RequestContext, info: FieldInfo) -> Self {
        Self {
            parent: Arc::new(parent),
            args: Arc::new(args),
            context,
            info: Arc::new(info),
        }
    }

    /// Look up a single argument
    pub fn arg(&self, name: &str) -> Option<&Value> {
        self.args.get(name)
    }
}
