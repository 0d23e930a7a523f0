use std::collections::HashSet;
use std::sync::Arc;

use apollo_compiler::Name;
use apollo_compiler::Node;
use apollo_compiler::ast::OperationType;
use apollo_compiler::ast::Type;
use apollo_compiler::executable::DirectiveList;
use apollo_compiler::executable::Field;
use apollo_compiler::executable::Selection;
use apollo_compiler::parser::SourceSpan;
use apollo_compiler::schema::ObjectType;
use futures::FutureExt;
use futures::future::BoxFuture;
use futures::future::join_all;
use indexmap::IndexMap;
use parking_lot::Mutex;

use super::OperationContext;
use super::input_coercion::coerce_argument_values;
use super::resolver::FieldError;
use super::resolver::ResolveInfo;
use super::schema::ExecutableSchema;
use crate::error::RequestError;
use crate::graphql;
use crate::graphql::IntoGraphQLErrors;
use crate::json_ext::Object;
use crate::json_ext::Path;
use crate::json_ext::Value;

/// A field error was recorded and the enclosing value must be nulled.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PropagateNull;

#[derive(Clone, Copy, PartialEq)]
pub(crate) enum ExecutionMode {
    /// Sibling fields are resolved concurrently
    Normal,
    /// Sibling fields are resolved one after the other
    Sequential,
}

/// Executes one operation and accumulates its field errors.
pub(crate) struct Engine {
    pub(crate) schema: Arc<ExecutableSchema>,
    pub(crate) operation: Arc<OperationContext>,
    errors: Mutex<Vec<graphql::Error>>,
}

impl Engine {
    pub(crate) fn new(schema: Arc<ExecutableSchema>, operation: Arc<OperationContext>) -> Self {
        Self {
            schema,
            operation,
            errors: Default::default(),
        }
    }

    /// <https://spec.graphql.org/October2021/#sec-Executing-Operations>
    pub(crate) async fn execute(self) -> graphql::Response {
        let operation = self.operation.operation();
        let Some(root_type) = self.schema.root_operation_type(operation.operation_type) else {
            return graphql::Response::from_errors(
                RequestError::UnsupportedOperationType(operation.operation_type)
                    .into_graphql_errors(),
            );
        };
        let mode = if operation.operation_type == OperationType::Mutation {
            ExecutionMode::Sequential
        } else {
            ExecutionMode::Normal
        };
        let root_value = Value::Object(Object::new());
        let path = Path::empty();
        let data = match self
            .execute_selection_set(
                &path,
                mode,
                root_type,
                &root_value,
                operation.selection_set.selections.iter(),
            )
            .await
        {
            Ok(object) => Value::Object(object),
            Err(PropagateNull) => Value::Null,
        };
        tracing::trace!(operation_id = self.operation.id(), "operation executed");
        graphql::Response::builder()
            .data(data)
            .errors(self.errors.into_inner())
            .build()
    }

    /// <https://spec.graphql.org/October2021/#ExecuteSelectionSet()>
    ///
    /// `Err` is a field error being propagated upwards to find a nullable place
    pub(crate) fn execute_selection_set<'a>(
        &'a self,
        path: &'a Path,
        mode: ExecutionMode,
        object_type: &'a ObjectType,
        object_value: &'a Value,
        selections: impl Iterator<Item = &'a Selection>,
    ) -> BoxFuture<'a, Result<Object, PropagateNull>> {
        let mut grouped_field_set = IndexMap::new();
        self.collect_fields(
            object_type,
            selections,
            &mut HashSet::new(),
            &mut grouped_field_set,
        );

        async move {
            let mut response_map = Object::new();
            match mode {
                ExecutionMode::Sequential => {
                    for (response_key, fields) in grouped_field_set {
                        let value = self
                            .execute_field(path, object_type, object_value, fields)
                            .await?;
                        response_map.insert(response_key.as_str(), value);
                    }
                }
                ExecutionMode::Normal => {
                    let results = join_all(grouped_field_set.into_iter().map(
                        |(response_key, fields)| async move {
                            let value = self
                                .execute_field(path, object_type, object_value, fields)
                                .await;
                            (response_key, value)
                        },
                    ))
                    .await;
                    for (response_key, value) in results {
                        response_map.insert(response_key.as_str(), value?);
                    }
                }
            }
            Ok(response_map)
        }
        .boxed()
    }

    /// <https://spec.graphql.org/October2021/#CollectFields()>
    fn collect_fields<'a>(
        &'a self,
        object_type: &ObjectType,
        selections: impl Iterator<Item = &'a Selection>,
        visited_fragments: &mut HashSet<&'a Name>,
        grouped_fields: &mut IndexMap<&'a Name, Vec<&'a Node<Field>>>,
    ) {
        let document = self.operation.document();
        for selection in selections {
            if self.is_excluded(selection.directives()) {
                continue;
            }
            match selection {
                Selection::Field(field) => grouped_fields
                    .entry(field.response_key())
                    .or_default()
                    .push(field),
                Selection::FragmentSpread(spread) => {
                    if !visited_fragments.insert(&spread.fragment_name) {
                        continue;
                    }
                    let Some(fragment) = document.fragments.get(&spread.fragment_name) else {
                        continue;
                    };
                    if !self.does_fragment_type_apply(object_type, fragment.type_condition()) {
                        continue;
                    }
                    self.collect_fields(
                        object_type,
                        fragment.selection_set.selections.iter(),
                        visited_fragments,
                        grouped_fields,
                    )
                }
                Selection::InlineFragment(inline) => {
                    if let Some(condition) = &inline.type_condition
                        && !self.does_fragment_type_apply(object_type, condition)
                    {
                        continue;
                    }
                    self.collect_fields(
                        object_type,
                        inline.selection_set.selections.iter(),
                        visited_fragments,
                        grouped_fields,
                    )
                }
            }
        }
    }

    /// <https://spec.graphql.org/October2021/#DoesFragmentTypeApply()>
    fn does_fragment_type_apply(&self, object_type: &ObjectType, type_condition: &Name) -> bool {
        object_type.name == *type_condition
            || self
                .schema
                .definitions()
                .is_subtype(type_condition, &object_type.name)
    }

    /// `@skip(if: true)` or `@include(if: false)`
    fn is_excluded(&self, directives: &DirectiveList) -> bool {
        let condition = |directive_name: &str| -> Option<bool> {
            let value = directives
                .get(directive_name)?
                .specified_argument_by_name("if")?;
            match value.as_ref() {
                apollo_compiler::ast::Value::Boolean(value) => Some(*value),
                apollo_compiler::ast::Value::Variable(variable) => self
                    .operation
                    .variables()
                    .get(variable.as_str())
                    .and_then(Value::as_bool),
                _ => None,
            }
        };
        condition("skip") == Some(true) || condition("include") == Some(false)
    }

    /// <https://spec.graphql.org/October2021/#ExecuteField()>
    async fn execute_field<'a>(
        &'a self,
        path: &'a Path,
        object_type: &'a ObjectType,
        object_value: &'a Value,
        fields: Vec<&'a Node<Field>>,
    ) -> Result<Value, PropagateNull> {
        let field = fields[0];
        let path = path.join(field.response_key().as_str());
        let location = field.name.location();
        let ty = &field.definition.ty;
        if field.name == "__typename" {
            return Ok(object_type.name.as_str().into());
        }
        if field.name.starts_with("__") {
            self.push_field_error(
                FieldError::new(format!("introspection field `{}` is not supported", field.name)),
                &path,
                location,
            );
            return try_nullify(ty, Err(PropagateNull));
        }
        let arguments = match coerce_argument_values(
            self.schema.definitions(),
            &field.definition,
            &field.arguments,
            self.operation.variables(),
        ) {
            Ok(arguments) => arguments,
            Err(message) => {
                self.push_field_error(FieldError::new(message), &path, location);
                return try_nullify(ty, Err(PropagateNull));
            }
        };
        let info = ResolveInfo {
            schema: self.schema.clone(),
            operation: self.operation.clone(),
            parent_type: object_type.name.clone(),
            field_name: field.name.clone(),
            return_type: ty.clone(),
            path: path.clone(),
            arguments,
        };
        let resolver = self
            .schema
            .field_resolver(&object_type.name, &field.name)
            .or_else(|| self.schema.object_resolver(&object_type.name));
        let resolved = match resolver {
            Some(resolver) => resolver.resolve(object_value, &info).await,
            None => Ok(object_value
                .as_object()
                .and_then(|object| object.get(field.name.as_str()))
                .cloned()
                .unwrap_or_default()),
        };
        let completed = match resolved {
            Ok(resolved) => {
                self.complete_value(&info, path.clone(), ty, resolved, &fields)
                    .await
            }
            Err(error) => {
                self.push_field_error(error, &path, location);
                Err(PropagateNull)
            }
        };
        try_nullify(ty, completed)
    }

    pub(crate) fn push_field_error(
        &self,
        error: FieldError,
        path: &Path,
        location: Option<SourceSpan>,
    ) {
        let error =
            error.into_graphql_error(path.clone(), location, &self.operation.document().sources);
        self.errors.lock().push(error);
    }
}

/// Try to insert a propagated null if possible, or keep propagating it.
///
/// <https://spec.graphql.org/October2021/#sec-Handling-Field-Errors>
pub(crate) fn try_nullify(
    ty: &Type,
    result: Result<Value, PropagateNull>,
) -> Result<Value, PropagateNull> {
    match result {
        Ok(json) => Ok(json),
        Err(PropagateNull) => {
            if ty.is_non_null() {
                Err(PropagateNull)
            } else {
                Ok(Value::Null)
            }
        }
    }
}
