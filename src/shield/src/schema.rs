//! Minimal object schema: types, fields and their resolvers

use crate::error::{FieldError, Result, ShieldError};
use crate::types::FieldCall;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Produces the value of one field
#[async_trait]
pub trait Resolve: Send + Sync {
    async fn resolve(&self, call: FieldCall) -> std::result::Result<Value, FieldError>;
}

/// Shared handle to a resolver
pub type Resolver = Arc<dyn Resolve>;

struct FnResolver<F>(F);

#[async_trait]
impl<F, Fut> Resolve for FnResolver<F>
where
    F: Fn(FieldCall) -> Fut + Send + Sync,
    Fut: Future<Output = std::result::Result<Value, FieldError>> + Send + 'static,
{
    async fn resolve(&self, call: FieldCall) -> std::result::Result<Value, FieldError> {
        (self.0)(call).await
    }
}

/// Wrap an async closure as a resolver
pub fn resolver_fn<F, Fut>(f: F) -> Resolver
where
    F: Fn(FieldCall) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = std::result::Result<Value, FieldError>> + Send + 'static,
{
    Arc::new(FnResolver(f))
}

/// Resolver used for fields without one: reads `parent[field_name]`
pub fn default_resolve(call: &FieldCall) -> Value {
    call.parent
        .get(&call.info.field_name)
        .cloned()
        .unwrap_or(Value::Null)
}

/// Run `resolver`, or the default property resolver when there is none
pub async fn run_resolver(resolver: Option<&Resolver>, call: FieldCall) -> std::result::Result<Value, FieldError> {
    match resolver {
        Some(resolver) => resolver.resolve(call).await,
        None => Ok(default_resolve(&call)),
    }
}

/// Reference to a field's output type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeRef {
    Named(String),
    List(Box<TypeRef>),
    NonNull(Box<TypeRef>),
}

impl TypeRef {
    pub fn named(name: impl Into<String>) -> Self {
        TypeRef::Named(name.into())
    }

    pub fn list(inner: TypeRef) -> Self {
        TypeRef::List(Box::new(inner))
    }

    pub fn non_null(inner: TypeRef) -> Self {
        TypeRef::NonNull(Box::new(inner))
    }

    pub fn is_non_null(&self) -> bool {
        matches!(self, TypeRef::NonNull(_))
    }

    /// Innermost named type
    pub fn base_name(&self) -> &str {
        match self {
            TypeRef::Named(name) => name,
            TypeRef::List(inner) | TypeRef::NonNull(inner) => inner.base_name(),
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Named(name) => write!(f, "{}", name),
            TypeRef::List(inner) => write!(f, "[{}]", inner),
            TypeRef::NonNull(inner) => write!(f, "{}!", inner),
        }
    }
}

/// Field of an object type
#[derive(Clone)]
pub struct Field {
    pub name: String,
    pub ty: TypeRef,
    pub resolver: Option<Resolver>,
}

impl Field {
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            ty,
            resolver: None,
        }
    }

    pub fn resolve_with<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(FieldCall) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<Value, FieldError>> + Send + 'static,
    {
        self.resolver = Some(resolver_fn(f));
        self
    }

    pub fn with_resolver(mut self, resolver: Resolver) -> Self {
        self.resolver = Some(resolver);
        self
    }
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("name", &self.name)
            .field("ty", &self.ty)
            .field("resolver", &self.resolver.is_some())
            .finish()
    }
}

/// Object type with ordered fields
#[derive(Debug, Clone)]
pub struct ObjectType {
    pub name: String,
    pub fields: Vec<Field>,
}

impl ObjectType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    pub fn get_field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Object schema with a query root and optional mutation root
///
/// Named types that are not registered object types are scalars.
#[derive(Debug, Clone)]
pub struct Schema {
    query: String,
    mutation: Option<String>,
    types: HashMap<String, ObjectType>,
    guarded: bool,
}

impl Schema {
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    pub fn query_type(&self) -> &str {
        &self.query
    }

    pub fn mutation_type(&self) -> Option<&str> {
        self.mutation.as_deref()
    }

    pub fn get_type(&self, name: &str) -> Option<&ObjectType> {
        self.types.get(name)
    }

    pub fn is_object(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    pub fn is_guarded(&self) -> bool {
        self.guarded
    }

    /// Root type names in declaration order
    pub fn roots(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.query.as_str()).chain(self.mutation.as_deref())
    }

    pub(crate) fn get_type_mut(&mut self, name: &str) -> Option<&mut ObjectType> {
        self.types.get_mut(name)
    }

    pub(crate) fn mark_guarded(&mut self) {
        self.guarded = true;
    }
}

/// Builder for [`Schema`]
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    query: Option<String>,
    mutation: Option<String>,
    types: HashMap<String, ObjectType>,
}

impl SchemaBuilder {
    /// Register the query root type
    pub fn query(mut self, object: ObjectType) -> Self {
        self.query = Some(object.name.clone());
        self.object(object)
    }

    /// Register the mutation root type
    pub fn mutation(mut self, object: ObjectType) -> Self {
        self.mutation = Some(object.name.clone());
        self.object(object)
    }

    pub fn object(mut self, object: ObjectType) -> Self {
        self.types.insert(object.name.clone(), object);
        self
    }

    pub fn build(self) -> Result<Schema> {
        let query = self
            .query
            .ok_or_else(|| ShieldError::InvalidSchema("missing query root type".to_string()))?;

        for object in self.types.values() {
            let mut seen = std::collections::HashSet::new();
            for field in &object.fields {
                if !seen.insert(field.name.as_str()) {
                    return Err(ShieldError::InvalidSchema(format!(
                        "duplicate field {}.{}",
                        object.name, field.name
                    )));
                }
            }
        }

        Ok(Schema {
            query,
            mutation: self.mutation,
            types: self.types,
            guarded: false,
        })
    }
}
