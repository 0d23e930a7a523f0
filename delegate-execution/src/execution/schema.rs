use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use apollo_compiler::Name;
use apollo_compiler::Node;
use apollo_compiler::Schema;
use apollo_compiler::ast::OperationType;
use apollo_compiler::schema::ObjectType;
use apollo_compiler::validation::Valid;
use parking_lot::RwLock;

use super::resolver::FieldResolver;
use super::resolver::TypeResolver;
use crate::error::SchemaError;

/// A validated schema together with the resolvers bound to its types.
///
/// Type and field definitions are immutable. Resolvers live in a side table keyed by type
/// name, so they can be bound and rebound through a shared reference while operations
/// execute.
pub struct ExecutableSchema {
    definitions: Valid<Schema>,
    resolvers: RwLock<Resolvers>,
}

#[derive(Default)]
struct Resolvers {
    fields: HashMap<Name, HashMap<Name, Arc<dyn FieldResolver>>>,
    objects: HashMap<Name, Arc<dyn FieldResolver>>,
    abstracts: HashMap<Name, Arc<dyn TypeResolver>>,
}

impl ExecutableSchema {
    /// An executable schema without any resolver: every field reads the property of the same
    /// name from its parent value.
    pub fn new(definitions: Valid<Schema>) -> Self {
        Self {
            definitions,
            resolvers: Default::default(),
        }
    }

    /// Parses and validates `sdl`, then wraps it in an executable schema.
    pub fn parse_and_validate(
        sdl: impl Into<String>,
        path: impl AsRef<Path>,
    ) -> Result<Self, SchemaError> {
        Ok(Self::new(Schema::parse_and_validate(sdl, path)?))
    }

    pub fn definitions(&self) -> &Valid<Schema> {
        &self.definitions
    }

    /// The object type operations of `operation_type` start from, if the schema defines one.
    pub fn root_operation_type(&self, operation_type: OperationType) -> Option<&Node<ObjectType>> {
        self.definitions
            .root_operation(operation_type)
            .and_then(|name| self.definitions.get_object(name))
    }

    pub fn set_field_resolver(
        &self,
        type_name: Name,
        field_name: Name,
        resolver: impl FieldResolver,
    ) {
        self.set_shared_field_resolver(type_name, field_name, Arc::new(resolver))
    }

    pub(crate) fn set_shared_field_resolver(
        &self,
        type_name: Name,
        field_name: Name,
        resolver: Arc<dyn FieldResolver>,
    ) {
        self.resolvers
            .write()
            .fields
            .entry(type_name)
            .or_default()
            .insert(field_name, resolver);
    }

    pub fn field_resolver(
        &self,
        type_name: &str,
        field_name: &str,
    ) -> Option<Arc<dyn FieldResolver>> {
        self.resolvers
            .read()
            .fields
            .get(type_name)
            .and_then(|fields| fields.get(field_name))
            .cloned()
    }

    /// Binds a resolver used for every field of `type_name` that has no resolver of its own.
    pub fn set_object_resolver(&self, type_name: Name, resolver: impl FieldResolver) {
        self.resolvers
            .write()
            .objects
            .insert(type_name, Arc::new(resolver));
    }

    pub fn clear_object_resolver(&self, type_name: &str) {
        self.resolvers.write().objects.remove(type_name);
    }

    pub fn object_resolver(&self, type_name: &str) -> Option<Arc<dyn FieldResolver>> {
        self.resolvers.read().objects.get(type_name).cloned()
    }

    pub fn set_type_resolver(&self, type_name: Name, resolver: impl TypeResolver) {
        self.resolvers
            .write()
            .abstracts
            .insert(type_name, Arc::new(resolver));
    }

    pub fn type_resolver(&self, type_name: &str) -> Option<Arc<dyn TypeResolver>> {
        self.resolvers.read().abstracts.get(type_name).cloned()
    }
}

impl fmt::Debug for ExecutableSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let resolvers = self.resolvers.read();
        f.debug_struct("ExecutableSchema")
            .field("types", &self.definitions.types.len())
            .field(
                "field_resolvers",
                &resolvers.fields.values().map(HashMap::len).sum::<usize>(),
            )
            .field("object_resolvers", &resolvers.objects.len())
            .field("type_resolvers", &resolvers.abstracts.len())
            .finish()
    }
}
