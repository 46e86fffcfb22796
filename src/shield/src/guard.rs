//! Field guard: installs policy checks in front of every resolver
//!
//! # Architecture
//!
//! ```text
//! executor → GuardedResolver → PolicyTree::lookup ─ none ─→ real resolver
//!                                   │
//!                                   └─ node → evaluate ─ Allowed ─→ real resolver
//!                                               │   ↑
//!                                               │ [DecisionCache]
//!                                               └─ Denied/Errored → ErrorPolicy → FieldError
//! ```

use crate::error::{FieldError, Result, ShieldError};
use crate::policy::PolicyTree;
use crate::schema::{run_resolver, Resolve, Resolver, Schema};
use crate::types::FieldCall;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tracing::{debug, info};

/// Authorization middleware built from a policy tree
#[derive(Debug, Clone)]
pub struct Shield {
    policy: Arc<PolicyTree>,
}

impl Shield {
    pub fn new(policy: PolicyTree) -> Self {
        Self {
            policy: Arc::new(policy),
        }
    }

    pub fn policy(&self) -> &PolicyTree {
        &self.policy
    }

    /// Wrap every field resolver reachable from the schema roots
    ///
    /// The type graph may be cyclic (`User.friends: [User]`), so it is walked
    /// with a worklist and a visited set.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The schema is already guarded
    /// - The policy names a type or field the schema does not define
    pub fn apply(&self, mut schema: Schema) -> Result<Schema> {
        if schema.is_guarded() {
            return Err(ShieldError::InvalidSchema("schema is already guarded".to_string()));
        }
        self.validate_against(&schema)?;

        let mut visited: HashSet<String> = HashSet::new();
        let mut worklist: VecDeque<String> = schema.roots().map(str::to_string).collect();
        let mut wrapped = 0usize;

        while let Some(type_name) = worklist.pop_front() {
            if !visited.insert(type_name.clone()) {
                continue;
            }

            let mut next_types = Vec::new();
            if let Some(object) = schema.get_type_mut(&type_name) {
                for field in &mut object.fields {
                    field.resolver = Some(Arc::new(GuardedResolver {
                        policy: self.policy.clone(),
                        inner: field.resolver.take(),
                    }));
                    wrapped += 1;
                    next_types.push(field.ty.base_name().to_string());
                }
            }

            for name in next_types {
                if schema.is_object(&name) && !visited.contains(&name) {
                    worklist.push_back(name);
                }
            }
        }

        schema.mark_guarded();
        info!("Shield applied to {} types, {} fields", visited.len(), wrapped);

        Ok(schema)
    }

    fn validate_against(&self, schema: &Schema) -> Result<()> {
        for (type_name, policy) in self.policy.types() {
            let object = schema
                .get_type(type_name)
                .ok_or_else(|| ShieldError::UnknownType(type_name.to_string()))?;

            for field_name in policy.fields.keys() {
                if object.get_field(field_name).is_none() {
                    return Err(ShieldError::UnknownField {
                        type_name: type_name.to_string(),
                        field_name: field_name.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Resolve one field through the policy, calling `inner` only if allowed
    pub async fn guard(&self, call: FieldCall, inner: Option<&Resolver>) -> std::result::Result<Value, FieldError> {
        guard_field(&self.policy, call, inner).await
    }
}

async fn guard_field(
    policy: &PolicyTree,
    call: FieldCall,
    inner: Option<&Resolver>,
) -> std::result::Result<Value, FieldError> {
    let Some(node) = policy.lookup(&call.info.type_name, &call.info.field_name) else {
        return run_resolver(inner, call).await;
    };

    let decision = policy.evaluate(node, &call).await;

    match policy.error_policy().field_error(&decision) {
        None => run_resolver(inner, call).await,
        Some(err) => {
            debug!(
                type_name = %call.info.type_name,
                field = %call.info.field_name,
                rule = policy.node_name(node),
                ?decision,
                "field denied"
            );
            Err(err)
        }
    }
}

/// Resolver that checks the policy before delegating
struct GuardedResolver {
    policy: Arc<PolicyTree>,
    inner: Option<Resolver>,
}

#[async_trait]
impl Resolve for GuardedResolver {
    async fn resolve(&self, call: FieldCall) -> std::result::Result<Value, FieldError> {
        guard_field(&self.policy, call, self.inner.as_ref()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ShieldOptions;
    use crate::policy::{CacheMode, PolicyBuilder};
    use crate::schema::{Field, ObjectType, TypeRef};
    use crate::types::{FieldInfo, RequestContext};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn schema() -> Schema {
        Schema::builder()
            .query(
                ObjectType::new("Query")
                    .field(Field::new("me", TypeRef::named("User")))
                    .field(Field::new("version", TypeRef::named("String"))),
            )
            .object(
                ObjectType::new("User")
                    .field(Field::new("name", TypeRef::named("String")))
                    .field(Field::new("friends", TypeRef::list(TypeRef::named("User")))),
            )
            .object(ObjectType::new("Orphan").field(Field::new("x", TypeRef::named("Int"))))
            .build()
            .unwrap()
    }

    fn call(type_name: &str, field: &str) -> FieldCall {
        FieldCall::new(
            json!({"name": "alice", "version": "1.0"}),
            Default::default(),
            RequestContext::default(),
            FieldInfo::new(type_name, field),
        )
    }

    #[test]
    fn test_apply_wraps_reachable_types_once() {
        let shield = Shield::new(PolicyBuilder::new().build(ShieldOptions::default()).unwrap());
        let guarded = shield.apply(schema()).unwrap();

        assert!(guarded.is_guarded());
        for name in ["Query", "User"] {
            let object = guarded.get_type(name).unwrap();
            assert!(object.fields.iter().all(|f| f.resolver.is_some()));
        }
        // Unreachable from the roots
        assert!(guarded.get_type("Orphan").unwrap().fields[0].resolver.is_none());

        assert!(shield.apply(guarded).is_err());
    }

    #[test]
    fn test_unknown_policy_targets_rejected() {
        let mut builder = PolicyBuilder::new();
        let deny = builder.deny();
        builder.field("User", "emial", deny);
        let shield = Shield::new(builder.build(ShieldOptions::default()).unwrap());
        assert!(matches!(
            shield.apply(schema()),
            Err(ShieldError::UnknownField { .. })
        ));

        let mut builder = PolicyBuilder::new();
        let deny = builder.deny();
        builder.type_default("Usr", deny);
        let shield = Shield::new(builder.build(ShieldOptions::default()).unwrap());
        assert_eq!(shield.apply(schema()).unwrap_err(), ShieldError::UnknownType("Usr".to_string()));
    }

    #[tokio::test]
    async fn test_denied_field_never_calls_resolver() {
        let mut builder = PolicyBuilder::new();
        let deny = builder.deny();
        builder.field("Query", "version", deny);
        let shield = Shield::new(builder.build(ShieldOptions::default()).unwrap());

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let resolver = crate::schema::resolver_fn(move |_call: FieldCall| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(json!("secret"))
            }
        });

        let err = shield
            .guard(call("Query", "version"), Some(&resolver))
            .await
            .unwrap_err();
        assert_eq!(err.message, "Not Authorised!");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_allowed_and_unguarded_pass_through() {
        let mut builder = PolicyBuilder::new();
        let authenticated = builder.rule("yes", CacheMode::Contextual, |_call: FieldCall| async { Ok(true) });
        builder.type_default("User", authenticated);
        let shield = Shield::new(builder.build(ShieldOptions::default()).unwrap());

        assert_eq!(shield.guard(call("User", "name"), None).await.unwrap(), json!("alice"));
        assert_eq!(shield.guard(call("Query", "version"), None).await.unwrap(), json!("1.0"));
    }

    #[tokio::test]
    async fn test_resolver_errors_pass_through_unchanged() {
        let mut builder = PolicyBuilder::new();
        let allow = builder.allow();
        builder.field("Query", "version", allow);
        let shield = Shield::new(builder.build(ShieldOptions::default()).unwrap());

        let failing = crate::schema::resolver_fn(|_call: FieldCall| async {
            Err(FieldError::new("upstream timeout"))
        });

        let err = shield
            .guard(call("Query", "version"), Some(&failing))
            .await
            .unwrap_err();
        assert_eq!(err.message, "upstream timeout");
    }
}
