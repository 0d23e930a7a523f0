use std::sync::Arc;

use apollo_compiler::Name;
use apollo_compiler::schema::ExtendedType;
use futures::future::BoxFuture;

use super::Coordinator;
use crate::error::DelegationError;
use crate::execution::ExecutableSchema;
use crate::execution::FieldError;
use crate::execution::FieldResolver;
use crate::execution::ResolveInfo;
use crate::execution::TypeResolver;
use crate::json_ext::Value;

/// Resolves every field of an object type from the delegated response.
pub(crate) struct DelegatedField(pub(crate) Arc<Coordinator>);

impl FieldResolver for DelegatedField {
    fn resolve(
        &self,
        _parent: &Value,
        info: &ResolveInfo,
    ) -> BoxFuture<'static, Result<Value, FieldError>> {
        self.0.resolve_field(info)
    }
}

/// Resolves the concrete type of an interface or union value from its `__typename`.
pub(crate) struct DelegatedType {
    coordinator: Arc<Coordinator>,
    abstract_type: Name,
}

impl TypeResolver for DelegatedType {
    fn resolve_type(&self, value: &Value, info: &ResolveInfo) -> Result<Name, FieldError> {
        let Some(type_name) = value
            .as_object()
            .and_then(|object| object.get("__typename"))
            .and_then(Value::as_str)
        else {
            return Err(DelegationError::MissingTypename(self.abstract_type.clone()).into());
        };
        let Some((type_name, _)) = info.schema.definitions().types.get_key_value(type_name) else {
            let error = DelegationError::UnknownImplementingType {
                type_name: type_name.to_string(),
                abstract_type: self.abstract_type.clone(),
            };
            tracing::error!(path = %info.path, "{error}");
            return Err(error.into());
        };
        self.coordinator.ensure_installed(&info.schema, type_name);
        Ok(type_name.clone())
    }
}

impl Coordinator {
    /// Installs the delegated resolvers of `type_name`, once per coordinator.
    ///
    /// Object types get a delegated resolver on each of their fields, interfaces and unions a
    /// delegated type resolver. Other types need nothing. Nested object types are installed
    /// when a delegated field returning them is resolved.
    pub(crate) fn ensure_installed(
        self: &Arc<Self>,
        schema: &ExecutableSchema,
        type_name: &str,
    ) {
        let definitions = schema.definitions();
        let Some((name, ty)) = definitions.types.get_key_value(type_name) else {
            return;
        };
        // Held until the resolvers are in place, so no field sees a half installed type
        let mut installed = self.installed.lock();
        if !installed.insert(name.clone()) {
            return;
        }
        match ty {
            ExtendedType::Object(object) => {
                let resolver: Arc<dyn FieldResolver> = Arc::new(DelegatedField(self.clone()));
                for field_name in object.fields.keys() {
                    schema.set_shared_field_resolver(
                        name.clone(),
                        field_name.clone(),
                        resolver.clone(),
                    );
                }
                schema.clear_object_resolver(name);
                tracing::debug!(type_name = %name, "delegated object type");
            }
            ExtendedType::Interface(_) | ExtendedType::Union(_) => {
                schema.set_type_resolver(
                    name.clone(),
                    DelegatedType {
                        coordinator: self.clone(),
                        abstract_type: name.clone(),
                    },
                );
                tracing::debug!(type_name = %name, "delegated abstract type");
            }
            ExtendedType::Scalar(_) | ExtendedType::Enum(_) | ExtendedType::InputObject(_) => {}
        }
    }
}
