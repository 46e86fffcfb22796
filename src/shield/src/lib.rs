//! # CretoAI Shield
//!
//! Field-level authorization for executors that resolve a tree of named
//! fields against object types.
//!
//! ## Features
//!
//! - **Composable policies**: atomic rules combined with `and`, `or`, `not`
//! - **Per-request caching**: contextual rules run at most once per request,
//!   with concurrent callers joining the in-flight check
//! - **Type defaults**: a node can guard every field of a type at once
//! - **No side effects on denial**: a denied field's resolver never runs
//! - **Error masking**: internal predicate failures stay hidden outside debug
//!   mode; custom denials reach the caller verbatim
//!
//! ## Example
//!
//! ```rust
//! use cretoai_shield::{
//!     CacheMode, Executor, Field, FieldCall, ObjectType, OperationKind, PolicyBuilder,
//!     RequestContext, Schema, Selection, Shield, ShieldOptions, TypeRef,
//! };
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let schema = Schema::builder()
//!         .query(
//!             ObjectType::new("Query")
//!                 .field(Field::new("secret", TypeRef::named("String")).resolve_with(
//!                     |_call: FieldCall| async { Ok(json!("42")) },
//!                 )),
//!         )
//!         .build()?;
//!
//!     let mut policy = PolicyBuilder::new();
//!     let is_admin = policy.rule("isAdmin", CacheMode::Contextual, |call: FieldCall| async move {
//!         Ok(call.context.data()["role"] == "admin")
//!     });
//!     policy.field("Query", "secret", is_admin);
//!
//!     let shield = Shield::new(policy.build(ShieldOptions::default())?);
//!     let executor = Executor::new(shield.apply(schema)?);
//!
//!     let response = executor
//!         .execute(
//!             OperationKind::Query,
//!             &[Selection::field("secret")],
//!             RequestContext::new(json!({"role": "guest"})),
//!         )
//!         .await;
//!
//!     assert_eq!(response.data, json!({"secret": null}));
//!     assert_eq!(response.errors[0].message, "Not Authorised!");
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod error_policy;
pub mod executor;
pub mod guard;
pub mod policy;
pub mod schema;
pub mod types;

// Re-export commonly used types
pub use cache::{CacheStats, DecisionCache};
pub use config::{ShieldOptions, DEFAULT_DENY_MESSAGE};
pub use error::{FieldError, Result, RuleError, ShieldError};
pub use error_policy::ErrorPolicy;
pub use executor::{Executor, OperationKind, Response, ResponseError, Selection};
pub use guard::Shield;
pub use policy::{CacheMode, Decision, NodeId, PolicyBuilder, PolicyTree, Predicate, Rule, TypePolicy};
pub use schema::{Field, ObjectType, Resolve, Resolver, Schema, SchemaBuilder, TypeRef};
pub use types::{Args, FieldCall, FieldInfo, PathSegment, RequestContext, ScopeToken};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
