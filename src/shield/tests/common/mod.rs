//! Shared fixtures for integration tests

#![allow(dead_code)]

use cretoai_shield::{
    CacheMode, Executor, Field, FieldCall, FieldError, NodeId, ObjectType, OperationKind, PolicyBuilder,
    RequestContext, Response, RuleError, Schema, Selection, Shield, ShieldOptions, TypeRef,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Route shield logs to the test writer; honours `RUST_LOG`
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "cretoai_shield=debug".into()),
        )
        .with_test_writer()
        .try_init();
}

/// Counts how often something ran
#[derive(Clone, Default)]
pub struct Counter(Arc<AtomicUsize>);

impl Counter {
    pub fn hit(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// String field resolving to its own name, counting invocations
pub fn named_field(name: &str, calls: &Counter) -> Field {
    let value = name.to_string();
    let calls = calls.clone();
    Field::new(name, TypeRef::named("String")).resolve_with(move |_call: FieldCall| {
        let value = value.clone();
        let calls = calls.clone();
        async move {
            calls.hit();
            Ok::<Value, FieldError>(json!(value))
        }
    })
}

/// Rule with a fixed answer that counts its predicate runs
pub fn counting_rule(policy: &mut PolicyBuilder, name: &str, cache: CacheMode, answer: bool, runs: &Counter) -> NodeId {
    let runs = runs.clone();
    policy.rule(name, cache, move |_call: FieldCall| {
        let runs = runs.clone();
        async move {
            // Yield so sibling fields overlap with this check
            tokio::time::sleep(Duration::from_millis(5)).await;
            runs.hit();
            Ok(answer)
        }
    })
}

/// Rule whose predicate always fails with `error`
pub fn failing_rule(policy: &mut PolicyBuilder, name: &str, error: RuleError) -> NodeId {
    policy.rule(name, CacheMode::Contextual, move |_call: FieldCall| {
        let error = error.clone();
        async move { Err(error) }
    })
}

/// Query type with one String field per name
pub fn flat_schema(fields: &[&str], calls: &Counter) -> Schema {
    let query = fields
        .iter()
        .fold(ObjectType::new("Query"), |object, name| object.field(named_field(name, calls)));
    Schema::builder().query(query).build().expect("valid schema")
}

pub fn guarded(schema: Schema, policy: PolicyBuilder, options: ShieldOptions) -> Executor {
    let shield = Shield::new(policy.build(options).expect("valid policy"));
    Executor::new(shield.apply(schema).expect("policy matches schema"))
}

pub async fn query(executor: &Executor, selections: &[Selection]) -> Response {
    executor
        .execute(OperationKind::Query, selections, RequestContext::default())
        .await
}

pub fn fields(names: &[&str]) -> Vec<Selection> {
    names.iter().map(|name| Selection::field(*name)).collect()
}
