use apollo_compiler::Name;
use apollo_compiler::Node;
use apollo_compiler::ast::Type;
use apollo_compiler::executable::Field;
use apollo_compiler::schema::ExtendedType;
use futures::FutureExt;
use futures::future::BoxFuture;
use futures::future::join_all;

use super::engine::Engine;
use super::engine::ExecutionMode;
use super::engine::PropagateNull;
use super::engine::try_nullify;
use super::resolver::FieldError;
use super::resolver::ResolveInfo;
use crate::json_ext::Path;
use crate::json_ext::Value;

impl Engine {
    /// <https://spec.graphql.org/October2021/#CompleteValue()>
    ///
    /// Returns `Err` for a field error being propagated upwards to find a nullable place
    pub(crate) fn complete_value<'a>(
        &'a self,
        info: &'a ResolveInfo,
        path: Path,
        ty: &'a Type,
        resolved: Value,
        fields: &'a [&'a Node<Field>],
    ) -> BoxFuture<'a, Result<Value, PropagateNull>> {
        async move {
            let location = fields[0].name.location();
            macro_rules! field_error {
                ($($arg: tt)+) => {
                    {
                        self.push_field_error(FieldError::new(format!($($arg)+)), &path, location);
                        return Err(PropagateNull);
                    }
                };
            }
            if resolved.is_null() {
                if ty.is_non_null() {
                    field_error!("Non-null type {ty} resolved to null")
                } else {
                    return Ok(Value::Null);
                }
            }
            let (ty_name, resolved) = match (ty, resolved) {
                (Type::List(inner_ty) | Type::NonNullList(inner_ty), Value::Array(items)) => {
                    let completed = join_all(items.into_iter().enumerate().map(|(index, item)| {
                        self.complete_value(info, path.join(index), inner_ty, item, fields)
                    }))
                    .await;
                    let mut completed_list = Vec::with_capacity(completed.len());
                    for inner_result in completed {
                        // On field error, try to nullify that item
                        completed_list.push(try_nullify(inner_ty, inner_result)?);
                    }
                    return Ok(Value::Array(completed_list));
                }
                (Type::List(_) | Type::NonNullList(_), resolved) => {
                    field_error!("List type {ty} resolved to a non-list value {resolved}")
                }
                (Type::Named(_) | Type::NonNullNamed(_), Value::Array(_)) => {
                    field_error!("Non-list type {ty} resolved to a list")
                }
                (Type::Named(name) | Type::NonNullNamed(name), resolved) => (name, resolved),
            };
            let schema = self.schema.definitions();
            let Some(ty_def) = schema.types.get(ty_name) else {
                field_error!("Undefined type {ty_name}")
            };
            let object_type = match ty_def {
                ExtendedType::InputObject(_) => {
                    field_error!("Field with input object type {ty_name}")
                }
                ExtendedType::Enum(enum_def) => {
                    // https://spec.graphql.org/October2021/#sec-Enums.Result-Coercion
                    if !resolved
                        .as_str()
                        .is_some_and(|str| enum_def.values.contains_key(str))
                    {
                        field_error!("Resolver returned {resolved}, expected enum {ty_name}")
                    }
                    return Ok(resolved);
                }
                ExtendedType::Scalar(_) => {
                    match ty_name.as_str() {
                        "Int" => {
                            // https://spec.graphql.org/October2021/#sec-Int.Result-Coercion
                            if let Some(int) = resolved.as_i64() {
                                if i32::try_from(int).is_err() {
                                    field_error!("Resolver returned {resolved} which overflows Int")
                                }
                            } else {
                                field_error!("Resolver returned {resolved}, expected Int")
                            }
                        }
                        "Float" => {
                            // https://spec.graphql.org/October2021/#sec-Float.Result-Coercion
                            // Integers from JSON transports are valid floats
                            if !resolved.is_number() {
                                field_error!("Resolver returned {resolved}, expected Float")
                            }
                        }
                        "String" => {
                            if !resolved.is_string() {
                                field_error!("Resolver returned {resolved}, expected String")
                            }
                        }
                        "Boolean" => {
                            if !resolved.is_boolean() {
                                field_error!("Resolver returned {resolved}, expected Boolean")
                            }
                        }
                        "ID" => {
                            if !(resolved.is_string() || resolved.is_i64()) {
                                field_error!("Resolver returned {resolved}, expected ID")
                            }
                        }
                        _ => {
                            // Custom scalar: accept any JSON value
                        }
                    }
                    return Ok(resolved);
                }
                _ if !resolved.is_object() => {
                    field_error!(
                        "Resolver returned a leaf value but expected an object for type {ty_name}"
                    )
                }
                ExtendedType::Object(def) => def,
                ExtendedType::Interface(_) | ExtendedType::Union(_) => {
                    let object_type_name = match self.resolve_abstract_type(info, ty_name, &resolved)
                    {
                        Ok(name) => name,
                        Err(error) => {
                            self.push_field_error(error, &path, location);
                            return Err(PropagateNull);
                        }
                    };
                    let Some(def) = schema.get_object(&object_type_name) else {
                        field_error!(
                            "Abstract type {ty_name} resolved to type {object_type_name}, \
                             which is not an object type defined in the schema"
                        )
                    };
                    if !schema.is_subtype(ty_name, &object_type_name) {
                        field_error!(
                            "Runtime object type {object_type_name} is not a possible type for {ty_name}"
                        )
                    }
                    def
                }
            };
            self.execute_selection_set(
                &path,
                ExecutionMode::Normal,
                object_type,
                &resolved,
                fields
                    .iter()
                    .flat_map(|field| &field.selection_set.selections),
            )
            .await
            .map(Value::Object)
        }
        .boxed()
    }

    /// <https://spec.graphql.org/October2021/#ResolveAbstractType()>
    ///
    /// Without a type resolver, the value is expected to carry its `__typename`.
    fn resolve_abstract_type(
        &self,
        info: &ResolveInfo,
        abstract_type: &Name,
        value: &Value,
    ) -> Result<Name, FieldError> {
        if let Some(resolver) = self.schema.type_resolver(abstract_type) {
            return resolver.resolve_type(value, info);
        }
        value
            .as_object()
            .and_then(|object| object.get("__typename"))
            .and_then(Value::as_str)
            .and_then(|name| Name::new(name).ok())
            .ok_or_else(|| {
                FieldError::new(format!(
                    "Abstract type {abstract_type} must resolve to an object type at runtime \
                     for field {}.{}: no type resolver and no `__typename` in the value",
                    info.parent_type, info.field_name
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use apollo_compiler::name;
    use futures::future::ready;
    use serde_json_bytes::json;
    use test_log::test;

    use crate::execution::ExecutableSchema;
    use crate::execution::execute;
    use crate::execution::resolver_fn;
    use crate::execution::type_resolver_fn;
    use crate::graphql;
    use crate::json_ext::Path;

    const SDL: &str = r#"
        type Query {
            hero: Character
            heroes: [Character!]
            count: Int!
            ratio: Float
            kind: Kind
            strict: Droid!
        }
        enum Kind { HUMAN DROID }
        interface Character { name: String! }
        type Human implements Character { name: String! height: Float }
        type Droid implements Character { name: String! primaryFunction: String }
    "#;

    fn schema(root: serde_json_bytes::Value) -> Arc<ExecutableSchema> {
        let schema = ExecutableSchema::parse_and_validate(SDL, "schema.graphql").unwrap();
        let root = Arc::new(root);
        schema.set_object_resolver(
            name!("Query"),
            resolver_fn(move |_, info| {
                let value = root
                    .get(info.field_name.as_str())
                    .cloned()
                    .unwrap_or_default();
                ready(Ok(value))
            }),
        );
        Arc::new(schema)
    }

    async fn run(schema: &Arc<ExecutableSchema>, query: &str) -> graphql::Response {
        execute(schema, &graphql::Request::builder().query(query).build()).await
    }

    #[test(tokio::test)]
    async fn abstract_types_resolve_through_typename() {
        let schema = schema(json!({
            "hero": {"__typename": "Droid", "name": "R2-D2", "primaryFunction": "Astromech"},
            "heroes": [
                {"__typename": "Human", "name": "Luke", "height": 1.72},
                {"__typename": "Droid", "name": "C-3PO", "primaryFunction": "Protocol"}
            ]
        }));
        let response = run(
            &schema,
            r#"{
                hero { __typename name ... on Droid { primaryFunction } }
                heroes { name ... on Human { height } }
            }"#,
        )
        .await;

        assert_eq!(response.errors, vec![]);
        assert_eq!(
            response.data,
            Some(json!({
                "hero": {"__typename": "Droid", "name": "R2-D2", "primaryFunction": "Astromech"},
                "heroes": [{"name": "Luke", "height": 1.72}, {"name": "C-3PO"}]
            }))
        );
    }

    #[test(tokio::test)]
    async fn type_resolvers_take_precedence_over_typename() {
        let schema = schema(json!({"hero": {"__typename": "Droid", "name": "Luke", "height": 2}}));
        schema.set_type_resolver(
            name!("Character"),
            type_resolver_fn(|_, _| Ok(name!("Human"))),
        );
        let response = run(&schema, "{ hero { __typename ... on Human { height } } }").await;
        assert_eq!(
            response.data,
            Some(json!({"hero": {"__typename": "Human", "height": 2}}))
        );
    }

    #[test(tokio::test)]
    async fn errors_inside_lists_nullify_the_nearest_nullable_position() {
        let schema = schema(json!({
            "heroes": [
                {"__typename": "Droid", "name": "R2-D2"},
                {"__typename": "Droid", "name": null}
            ]
        }));
        let response = run(&schema, "{ heroes { name } }").await;

        // `[Character!]`: the null name nulls the item, which nulls the list
        assert_eq!(response.data, Some(json!({"heroes": null})));
        assert_eq!(response.errors.len(), 1);
        assert_eq!(response.errors[0].message, "Non-null type String! resolved to null");
        assert_eq!(
            response.errors[0].path,
            Some(Path(vec!["heroes".into(), 1.into(), "name".into()]))
        );
        assert_eq!(response.errors[0].locations.len(), 1);
    }

    #[test(tokio::test)]
    async fn leaf_values_are_checked() {
        let schema = schema(json!({"count": 1.5, "ratio": 2, "kind": "ROBOT"}));
        let response = run(&schema, "{ ratio kind }").await;
        assert_eq!(response.data, Some(json!({"ratio": 2, "kind": null})));
        assert_eq!(response.errors.len(), 1);
        assert_eq!(
            response.errors[0].message,
            "Resolver returned \"ROBOT\", expected enum Kind"
        );

        // A non-null root field nulls the whole data
        let response = run(&schema, "{ count }").await;
        assert_eq!(response.data, Some(json!(null)));
        assert_eq!(response.errors[0].message, "Resolver returned 1.5, expected Int");
    }

    #[test(tokio::test)]
    async fn abstract_values_need_a_possible_type() {
        let schema = schema(json!({
            "hero": {"name": "nobody"},
            "strict": {"__typename": "Human", "name": "Luke"}
        }));
        let response = run(&schema, "{ hero { name } }").await;
        assert_eq!(response.data, Some(json!({"hero": null})));
        assert_eq!(
            response.errors[0].message,
            "Abstract type Character must resolve to an object type at runtime for field \
             Query.hero: no type resolver and no `__typename` in the value"
        );

        let schema = schema_with_hero(json!({"__typename": "Kind", "name": "x"}));
        let response = run(&schema, "{ hero { name } }").await;
        assert_eq!(
            response.errors[0].message,
            "Abstract type Character resolved to type Kind, which is not an object type defined in the schema"
        );
    }

    fn schema_with_hero(hero: serde_json_bytes::Value) -> Arc<ExecutableSchema> {
        schema(json!({ "hero": hero }))
    }
}
