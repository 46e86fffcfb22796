//! Minimal executor for driving a (guarded) schema
//!
//! Resolves a selection tree against a [`Schema`] for one request context.
//! Sibling fields of a query resolve concurrently, mutation root fields
//! serially; a field's subtree resolves once the field's value is known.
//! Field errors are recorded with their response path, and a null in a
//! non-null position nulls the nearest nullable ancestor.

use crate::error::FieldError;
use crate::schema::{run_resolver, Field, ObjectType, Schema, TypeRef};
use crate::types::{Args, FieldCall, FieldInfo, PathSegment, RequestContext};
use futures::future::{join_all, BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::debug;

/// One selected field, with optional alias, arguments and sub-selections
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,

    #[serde(default)]
    pub args: Args,

    #[serde(default)]
    pub selections: Vec<Selection>,
}

impl Selection {
    pub fn field(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn arg(mut self, name: impl Into<String>, value: Value) -> Self {
        self.args.insert(name.into(), value);
        self
    }

    pub fn select(mut self, selections: impl IntoIterator<Item = Selection>) -> Self {
        self.selections.extend(selections);
        self
    }

    /// Key of this field in the response object
    pub fn response_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

/// Operation root
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Query,
    Mutation,
}

/// Error entry of a response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseError {
    pub message: String,
    pub path: Vec<PathSegment>,
}

/// Execution result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub data: Value,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ResponseError>,
}

impl Response {
    /// Value at a response path, if present
    pub fn get(&self, path: &[&str]) -> Option<&Value> {
        path.iter().try_fold(&self.data, |value, key| value.get(*key))
    }

    /// Messages of errors recorded at exactly `path`
    pub fn errors_at(&self, path: &[&str]) -> Vec<&str> {
        self.errors
            .iter()
            .filter(|e| {
                e.path.len() == path.len()
                    && e.path.iter().zip(path).all(|(segment, key)| match segment {
                        PathSegment::Field(name) => name.as_str() == *key,
                        PathSegment::Index(i) => i.to_string() == *key,
                    })
            })
            .map(|e| e.message.as_str())
            .collect()
    }
}

/// A null that must propagate to the nearest nullable ancestor; its error is
/// already recorded
struct NullBubble;

type Completed = (Result<Value, NullBubble>, Vec<ResponseError>);

/// Executes selections against a schema
#[derive(Debug, Clone)]
pub struct Executor {
    schema: Arc<Schema>,
}

impl Executor {
    pub fn new(schema: Schema) -> Self {
        Self {
            schema: Arc::new(schema),
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Execute one operation within `context`
    pub async fn execute(&self, kind: OperationKind, selections: &[Selection], context: RequestContext) -> Response {
        let root_name = match kind {
            OperationKind::Query => Some(self.schema.query_type()),
            OperationKind::Mutation => self.schema.mutation_type(),
        };

        let Some(root) = root_name.and_then(|name| self.schema.get_type(name)) else {
            return Response {
                data: Value::Null,
                errors: vec![ResponseError {
                    message: format!("Schema does not support {:?} operations", kind),
                    path: Vec::new(),
                }],
            };
        };

        debug!(scope = %context.scope(), root = %root.name, fields = selections.len(), "executing operation");

        let serial = kind == OperationKind::Mutation;
        let (result, mut errors) = self
            .resolve_object(root, Arc::new(Value::Object(Map::new())), selections, Vec::new(), &context, serial)
            .await;

        errors.sort_by_key(|e| e.path.len());

        Response {
            data: result.unwrap_or(Value::Null),
            errors,
        }
    }

    fn resolve_object<'a>(
        &'a self,
        object: &'a ObjectType,
        parent: Arc<Value>,
        selections: &'a [Selection],
        path: Vec<PathSegment>,
        context: &'a RequestContext,
        serial: bool,
    ) -> BoxFuture<'a, Completed> {
        async move {
            let field_futures = selections.iter().map(|selection| {
                let mut field_path = path.clone();
                field_path.push(PathSegment::Field(selection.response_key().to_string()));
                self.resolve_field(object, parent.clone(), selection, field_path, context)
            });

            let results = if serial {
                let mut results = Vec::with_capacity(selections.len());
                for fut in field_futures {
                    results.push(fut.await);
                }
                results
            } else {
                join_all(field_futures).await
            };

            let mut data = Map::new();
            let mut errors = Vec::new();
            let mut bubbled = false;

            for (selection, (result, field_errors)) in selections.iter().zip(results) {
                errors.extend(field_errors);
                match result {
                    Ok(value) => {
                        data.insert(selection.response_key().to_string(), value);
                    }
                    Err(NullBubble) => bubbled = true,
                }
            }

            if bubbled {
                (Err(NullBubble), errors)
            } else {
                (Ok(Value::Object(data)), errors)
            }
        }
        .boxed()
    }

    fn resolve_field<'a>(
        &'a self,
        object: &'a ObjectType,
        parent: Arc<Value>,
        selection: &'a Selection,
        path: Vec<PathSegment>,
        context: &'a RequestContext,
    ) -> BoxFuture<'a, Completed> {
        async move {
            let Some(field) = object.get_field(&selection.name) else {
                let error = ResponseError {
                    message: format!("Cannot query field \"{}\" on type \"{}\"", selection.name, object.name),
                    path,
                };
                return (Ok(Value::Null), vec![error]);
            };

            let info = FieldInfo::new(object.name.clone(), field.name.clone()).with_path(path.clone());
            let call = FieldCall {
                parent,
                args: Arc::new(selection.args.clone()),
                context: context.clone(),
                info: Arc::new(info),
            };

            match run_resolver(field.resolver.as_ref(), call).await {
                Ok(value) => self.complete(field, &field.ty, value, selection, path, context).await,
                Err(FieldError { message }) => {
                    let errors = vec![ResponseError { message, path }];
                    if field.ty.is_non_null() {
                        (Err(NullBubble), errors)
                    } else {
                        (Ok(Value::Null), errors)
                    }
                }
            }
        }
        .boxed()
    }

    /// Complete a value against its type; nullable positions absorb bubbles
    fn complete<'a>(
        &'a self,
        field: &'a Field,
        ty: &'a TypeRef,
        value: Value,
        selection: &'a Selection,
        path: Vec<PathSegment>,
        context: &'a RequestContext,
    ) -> BoxFuture<'a, Completed> {
        async move {
            match ty {
                TypeRef::NonNull(inner) => {
                    let (result, mut errors) = self
                        .complete_inner(field, inner, value, selection, path.clone(), context)
                        .await;
                    match result {
                        Ok(Value::Null) => {
                            errors.push(ResponseError {
                                message: format!("Cannot return null for non-nullable field {}", field.name),
                                path,
                            });
                            (Err(NullBubble), errors)
                        }
                        other => (other, errors),
                    }
                }
                _ => {
                    let (result, errors) = self
                        .complete_inner(field, ty, value, selection, path, context)
                        .await;
                    (Ok(result.unwrap_or(Value::Null)), errors)
                }
            }
        }
        .boxed()
    }

    fn complete_inner<'a>(
        &'a self,
        field: &'a Field,
        ty: &'a TypeRef,
        value: Value,
        selection: &'a Selection,
        path: Vec<PathSegment>,
        context: &'a RequestContext,
    ) -> BoxFuture<'a, Completed> {
        async move {
            if value.is_null() {
                return (Ok(Value::Null), Vec::new());
            }

            match ty {
                TypeRef::NonNull(_) => self.complete(field, ty, value, selection, path, context).await,
                TypeRef::List(item_ty) => {
                    let Value::Array(items) = value else {
                        let error = ResponseError {
                            message: format!("Expected a list for field {}", field.name),
                            path,
                        };
                        return (Err(NullBubble), vec![error]);
                    };

                    let results = join_all(items.into_iter().enumerate().map(|(i, item)| {
                        let mut item_path = path.clone();
                        item_path.push(PathSegment::Index(i));
                        self.complete(field, item_ty, item, selection, item_path, context)
                    }))
                    .await;

                    let mut values = Vec::with_capacity(results.len());
                    let mut errors = Vec::new();
                    let mut bubbled = false;
                    for (result, item_errors) in results {
                        errors.extend(item_errors);
                        match result {
                            Ok(v) => values.push(v),
                            Err(NullBubble) => bubbled = true,
                        }
                    }

                    if bubbled {
                        (Err(NullBubble), errors)
                    } else {
                        (Ok(Value::Array(values)), errors)
                    }
                }
                TypeRef::Named(name) => match self.schema.get_type(name) {
                    Some(object) => {
                        self.resolve_object(object, Arc::new(value), &selection.selections, path, context, false)
                            .await
                    }
                    None => (Ok(value), Vec::new()),
                },
            }
        }
        .boxed()
    }
}
