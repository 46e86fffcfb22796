//! Policy definition: rule arena, logic nodes and the type/field policy tree
//!
//! Every node (rule, `and`, `or`, `not`, constant) lives in an arena owned by
//! a [`PolicyBuilder`] and is referenced by a generated [`NodeId`]. The id is
//! the node's identity for caching, so rules sharing a display name never
//! share cache entries.
//!
//! # Example
//!
//! ```rust
//! use cretoai_shield::{CacheMode, FieldCall, PolicyBuilder, ShieldOptions};
//!
//! # fn example() -> cretoai_shield::Result<()> {
//! let mut policy = PolicyBuilder::new();
//!
//! let authenticated = policy.rule("isAuthenticated", CacheMode::Contextual, |call: FieldCall| async move {
//!     Ok(call.context.data()["user"].is_string())
//! });
//! let admin = policy.rule("isAdmin", CacheMode::Contextual, |call: FieldCall| async move {
//!     Ok(call.context.data()["role"] == "admin")
//! });
//! let owner_or_admin = policy.or([authenticated, admin]);
//!
//! policy
//!     .field("Query", "me", authenticated)
//!     .field("Mutation", "deleteUser", admin)
//!     .type_default("User", owner_or_admin);
//!
//! let tree = policy.build(ShieldOptions::default())?;
//! assert!(tree.lookup("Query", "me").is_some());
//! assert!(tree.lookup("Query", "health").is_none());
//! # Ok(())
//! # }
//! ```

pub mod decision;
pub mod rule;

pub use decision::Decision;
pub use rule::{CacheMode, Predicate, Rule};

use crate::config::ShieldOptions;
use crate::error::{Result, RuleError, ShieldError};
use crate::error_policy::ErrorPolicy;
use crate::types::FieldCall;
use futures::future::{join_all, BoxFuture, FutureExt};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

/// Identity of a node in a policy arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    arena: u64,
    index: usize,
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.arena, self.index)
    }
}

#[derive(Debug, Clone)]
enum Node {
    Allow,
    Deny,
    Rule(Rule),
    And(Vec<NodeId>),
    Or(Vec<NodeId>),
    Not(NodeId),
}

impl Node {
    fn children(&self) -> &[NodeId] {
        match self {
            Node::And(children) | Node::Or(children) => children,
            Node::Not(child) => std::slice::from_ref(child),
            Node::Allow | Node::Deny | Node::Rule(_) => &[],
        }
    }
}

/// Policies attached to one object type
#[derive(Debug, Clone, Default)]
pub struct TypePolicy {
    /// Field-specific nodes
    pub fields: HashMap<String, NodeId>,

    /// Node for every field without its own entry
    pub default: Option<NodeId>,
}

/// Mutable builder for a [`PolicyTree`]
#[derive(Debug)]
pub struct PolicyBuilder {
    arena: u64,
    nodes: Vec<Node>,
    types: HashMap<String, TypePolicy>,
    fallback: Option<NodeId>,
}

impl Default for PolicyBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PolicyBuilder {
    pub fn new() -> Self {
        static NEXT_ARENA: AtomicU64 = AtomicU64::new(1);

        Self {
            arena: NEXT_ARENA.fetch_add(1, Ordering::Relaxed),
            nodes: Vec::new(),
            types: HashMap::new(),
            fallback: None,
        }
    }

    fn push(&mut self, node: Node) -> NodeId {
        let id = NodeId {
            arena: self.arena,
            index: self.nodes.len(),
        };
        self.nodes.push(node);
        id
    }

    /// Register an async closure as a rule
    pub fn rule<F, Fut>(&mut self, name: impl Into<String>, cache: CacheMode, predicate: F) -> NodeId
    where
        F: Fn(FieldCall) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<bool, RuleError>> + Send + 'static,
    {
        self.push(Node::Rule(Rule::from_fn(name, cache, predicate)))
    }

    /// Register a prebuilt rule; each registration gets a fresh identity
    pub fn add_rule(&mut self, rule: Rule) -> NodeId {
        self.push(Node::Rule(rule))
    }

    /// Constant allow
    pub fn allow(&mut self) -> NodeId {
        self.push(Node::Allow)
    }

    /// Constant deny with the configured denial message
    pub fn deny(&mut self) -> NodeId {
        self.push(Node::Deny)
    }

    pub fn and(&mut self, children: impl IntoIterator<Item = NodeId>) -> NodeId {
        let children = children.into_iter().collect();
        self.push(Node::And(children))
    }

    pub fn or(&mut self, children: impl IntoIterator<Item = NodeId>) -> NodeId {
        let children = children.into_iter().collect();
        self.push(Node::Or(children))
    }

    pub fn not(&mut self, child: NodeId) -> NodeId {
        self.push(Node::Not(child))
    }

    /// Guard `type_name.field_name`; a later call for the same field replaces
    /// the earlier node
    pub fn field(&mut self, type_name: impl Into<String>, field_name: impl Into<String>, node: NodeId) -> &mut Self {
        self.types
            .entry(type_name.into())
            .or_default()
            .fields
            .insert(field_name.into(), node);
        self
    }

    /// Guard every field of `type_name` lacking its own entry
    pub fn type_default(&mut self, type_name: impl Into<String>, node: NodeId) -> &mut Self {
        self.types.entry(type_name.into()).or_default().default = Some(node);
        self
    }

    /// Node applied where neither a field entry nor a type default exists
    pub fn fallback(&mut self, node: NodeId) -> &mut Self {
        self.fallback = Some(node);
        self
    }

    fn check_id(&self, id: NodeId) -> Result<()> {
        if id.arena != self.arena || id.index >= self.nodes.len() {
            return Err(ShieldError::InvalidPolicy(format!(
                "node {} does not belong to this policy",
                id
            )));
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        for node in &self.nodes {
            match node {
                Node::And(children) if children.is_empty() => {
                    return Err(ShieldError::InvalidPolicy("and() needs at least one child".to_string()));
                }
                Node::Or(children) if children.is_empty() => {
                    return Err(ShieldError::InvalidPolicy("or() needs at least one child".to_string()));
                }
                _ => {}
            }
            for child in node.children() {
                self.check_id(*child)?;
            }
        }

        for (type_name, policy) in &self.types {
            for (field_name, id) in &policy.fields {
                self.check_id(*id).map_err(|_| {
                    ShieldError::InvalidPolicy(format!("{}.{} uses a foreign node", type_name, field_name))
                })?;
            }
            if let Some(id) = policy.default {
                self.check_id(id).map_err(|_| {
                    ShieldError::InvalidPolicy(format!("{} default uses a foreign node", type_name))
                })?;
            }
        }

        if let Some(id) = self.fallback {
            self.check_id(id)?;
        }

        Ok(())
    }

    /// Freeze the builder into an immutable tree
    pub fn build(self, options: ShieldOptions) -> Result<PolicyTree> {
        options.validate()?;
        self.validate()?;

        info!(
            "PolicyTree built with {} nodes, {} types, debug={}",
            self.nodes.len(),
            self.types.len(),
            options.debug
        );

        Ok(PolicyTree {
            arena: self.arena,
            nodes: self.nodes,
            types: self.types,
            fallback: self.fallback,
            errors: ErrorPolicy::new(&options),
        })
    }
}

/// Immutable mapping from (type, field) to policy nodes
///
/// Freely shared across concurrent requests; all per-request state lives in
/// the [`RequestContext`](crate::RequestContext).
#[derive(Debug)]
pub struct PolicyTree {
    arena: u64,
    nodes: Vec<Node>,
    types: HashMap<String, TypePolicy>,
    fallback: Option<NodeId>,
    errors: ErrorPolicy,
}

impl PolicyTree {
    /// Node guarding `type_name.field_name`
    ///
    /// Resolution order: field entry, type default, fallback. `None` means
    /// the field is unguarded and resolves as if allowed.
    pub fn lookup(&self, type_name: &str, field_name: &str) -> Option<NodeId> {
        self.types
            .get(type_name)
            .and_then(|policy| policy.fields.get(field_name).copied().or(policy.default))
            .or(self.fallback)
    }

    /// Per-type policies, for validation against a schema
    pub fn types(&self) -> impl Iterator<Item = (&str, &TypePolicy)> {
        self.types.iter().map(|(name, policy)| (name.as_str(), policy))
    }

    pub fn error_policy(&self) -> &ErrorPolicy {
        &self.errors
    }

    /// Display name of a node, for logging
    pub fn node_name(&self, id: NodeId) -> &str {
        match self.node(id) {
            Some(Node::Rule(rule)) => rule.name(),
            Some(Node::Allow) => "allow",
            Some(Node::Deny) => "deny",
            Some(Node::And(_)) => "and",
            Some(Node::Or(_)) => "or",
            Some(Node::Not(_)) => "not",
            None => "unknown",
        }
    }

    fn node(&self, id: NodeId) -> Option<&Node> {
        if id.arena != self.arena {
            return None;
        }
        self.nodes.get(id.index)
    }

    /// Decide access for one field resolution
    pub async fn check(&self, call: &FieldCall) -> Decision {
        match self.lookup(&call.info.type_name, &call.info.field_name) {
            Some(node) => self.evaluate(node, call).await,
            None => Decision::Allowed,
        }
    }

    /// Evaluate a node
    ///
    /// Logic nodes dispatch every child concurrently and combine the results
    /// in declaration order; nothing in flight is ever cancelled.
    pub fn evaluate<'a>(&'a self, id: NodeId, call: &'a FieldCall) -> BoxFuture<'a, Decision> {
        async move {
            let deny_message = self.errors.fallback_message();

            let Some(node) = self.node(id) else {
                return Decision::Errored(RuleError::internal(format!("unknown policy node {}", id)));
            };

            match node {
                Node::Allow => Decision::Allowed,
                Node::Deny => Decision::Denied(deny_message.to_string()),
                Node::Rule(rule) => self.evaluate_rule(id, rule, call).await,
                Node::And(children) => {
                    let results = join_all(children.iter().map(|child| self.evaluate(*child, call))).await;
                    Decision::all(results)
                }
                Node::Or(children) => {
                    let results = join_all(children.iter().map(|child| self.evaluate(*child, call))).await;
                    Decision::any(results, deny_message)
                }
                Node::Not(child) => self.evaluate(*child, call).await.negate(deny_message),
            }
        }
        .boxed()
    }

    async fn evaluate_rule(&self, id: NodeId, rule: &Rule, call: &FieldCall) -> Decision {
        let deny_message = self.errors.fallback_message();
        let run = move || async move {
            debug!(rule = rule.name(), field = %call.info.field_name, "running predicate");
            Decision::from_predicate(rule.check(call).await, deny_message)
        };

        match rule.cache_mode() {
            CacheMode::NoCache => run().await,
            CacheMode::Contextual => {
                let scope = call.context.scope();
                call.context.cache().get_or_compute(id, scope, run).await
            }
        }
    }
}
