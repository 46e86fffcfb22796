//! Per-request decision cache with single-flight semantics
//!
//! Each request context owns one cache. Entries hold a `OnceCell`, not the
//! settled value, so callers racing on the same key join the computation
//! already in flight instead of starting their own. Failures are cached like
//! any other outcome.

use crate::policy::{Decision, NodeId};
use crate::types::ScopeToken;
use dashmap::DashMap;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::debug;

/// Cache key: rule identity plus the request scope
type CacheKey = (NodeId, ScopeToken);

/// Request-scoped memoization of rule outcomes
#[derive(Debug)]
pub struct DecisionCache {
    scope: ScopeToken,
    entries: DashMap<CacheKey, Arc<OnceCell<Decision>>>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl DecisionCache {
    pub fn new(scope: ScopeToken) -> Self {
        Self {
            scope,
            entries: DashMap::new(),
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
        }
    }

    /// Scope this cache was created for
    pub fn scope(&self) -> ScopeToken {
        self.scope
    }

    /// Return the outcome for `(rule, scope)`, running `compute` only if no
    /// caller has started it yet
    pub async fn get_or_compute<F, Fut>(&self, rule: NodeId, scope: ScopeToken, compute: F) -> Decision
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Decision>,
    {
        // Clone the cell out so no map shard lock is held across the await
        let cell = self.entries.entry((rule, scope)).or_default().clone();

        let mut computed = false;
        let decision = cell
            .get_or_init(|| {
                computed = true;
                compute()
            })
            .await
            .clone();

        if computed {
            self.misses.fetch_add(1, Ordering::Relaxed);
            debug!(rule = %rule, scope = %scope, "decision computed");
        } else {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!(rule = %rule, scope = %scope, "decision served from cache");
        }

        decision
    }

    /// Settled outcome for a key, if any
    pub fn get(&self, rule: NodeId, scope: ScopeToken) -> Option<Decision> {
        self.entries
            .get(&(rule, scope))
            .and_then(|cell| cell.get().cloned())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.entries.len(),
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    pub entries: usize,
}

impl CacheStats {
    /// Calculate cache hit rate
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
