use apollo_compiler::Node;
use apollo_compiler::Schema;
use apollo_compiler::ast;
use apollo_compiler::ast::Type;
use apollo_compiler::executable::Operation;
use apollo_compiler::schema::ExtendedType;
use apollo_compiler::schema::FieldDefinition;
use apollo_compiler::validation::Valid;

use crate::error::RequestError;
use crate::json_ext::Object;
use crate::json_ext::Value;

/// <https://spec.graphql.org/October2021/#sec-Coercing-Variable-Values>
pub(crate) fn coerce_variable_values(
    schema: &Valid<Schema>,
    operation: &Operation,
    values: &Object,
) -> Result<Object, RequestError> {
    let mut coerced_values = Object::new();
    for variable_def in &operation.variables {
        let name = &variable_def.name;
        let invalid = |reason: String| RequestError::InvalidVariable {
            name: name.clone(),
            reason,
        };
        if let Some(value) = values.get(name.as_str()) {
            let value = coerce_input_value(schema, &variable_def.ty, value).map_err(invalid)?;
            coerced_values.insert(name.as_str(), value);
        } else if let Some(default) = &variable_def.default_value {
            coerced_values.insert(name.as_str(), value_to_json(default, &Object::new()));
        } else if variable_def.ty.is_non_null() {
            return Err(invalid(format!(
                "missing value for non-null variable of type {}",
                variable_def.ty
            )));
        }
    }
    Ok(coerced_values)
}

/// <https://spec.graphql.org/October2021/#sec-Coercing-Field-Arguments>
pub(crate) fn coerce_argument_values(
    schema: &Valid<Schema>,
    field_def: &FieldDefinition,
    arguments: &[Node<ast::Argument>],
    variables: &Object,
) -> Result<Object, String> {
    let mut coerced_values = Object::new();
    for arg_def in &field_def.arguments {
        let name = &arg_def.name;
        let provided = arguments
            .iter()
            .find(|argument| argument.name == *name)
            .and_then(|argument| match argument.value.as_ref() {
                ast::Value::Variable(variable) => variables.get(variable.as_str()).cloned(),
                value => Some(value_to_json(value, variables)),
            });
        if let Some(value) = provided {
            let value = coerce_input_value(schema, &arg_def.ty, &value)
                .map_err(|reason| format!("invalid value for argument `{name}`: {reason}"))?;
            coerced_values.insert(name.as_str(), value);
        } else if let Some(default) = &arg_def.default_value {
            coerced_values.insert(name.as_str(), value_to_json(default, variables));
        } else if arg_def.ty.is_non_null() {
            return Err(format!("missing value for required argument `{name}`"));
        }
    }
    Ok(coerced_values)
}

/// <https://spec.graphql.org/October2021/#sec-Input-Values>
fn coerce_input_value(schema: &Valid<Schema>, ty: &Type, value: &Value) -> Result<Value, String> {
    if value.is_null() {
        return if ty.is_non_null() {
            Err(format!("null value for non-null type {ty}"))
        } else {
            Ok(Value::Null)
        };
    }
    let ty_name = match ty {
        Type::List(inner) | Type::NonNullList(inner) => {
            return match value {
                Value::Array(items) => items
                    .iter()
                    .map(|item| coerce_input_value(schema, inner, item))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::Array),
                // A single value is coerced to a list of one item
                item => Ok(Value::Array(vec![coerce_input_value(schema, inner, item)?])),
            };
        }
        Type::Named(name) | Type::NonNullNamed(name) => name,
    };
    let expected = || Err(format!("expected a value of type {ty}, found {value}"));
    match schema.types.get(ty_name) {
        Some(ExtendedType::Scalar(_)) => match ty_name.as_str() {
            "Int" => match value.as_i64() {
                Some(int) if i32::try_from(int).is_ok() => Ok(value.clone()),
                _ => expected(),
            },
            "Float" if value.is_number() => Ok(value.clone()),
            "String" | "ID" if value.is_string() => Ok(value.clone()),
            "ID" if value.is_i64() => Ok(value.clone()),
            "Boolean" if value.is_boolean() => Ok(value.clone()),
            "Float" | "String" | "ID" | "Boolean" => expected(),
            // Custom scalars are passed through
            _ => Ok(value.clone()),
        },
        Some(ExtendedType::Enum(enum_def)) => {
            if value
                .as_str()
                .is_some_and(|str| enum_def.values.contains_key(str))
            {
                Ok(value.clone())
            } else {
                expected()
            }
        }
        Some(ExtendedType::InputObject(input_def)) => {
            let Some(object) = value.as_object() else {
                return expected();
            };
            if let Some(unknown) = object
                .keys()
                .find(|key| !input_def.fields.contains_key(key.as_str()))
            {
                return Err(format!(
                    "unknown field `{}` for input type {ty_name}",
                    unknown.as_str()
                ));
            }
            let mut coerced = Object::new();
            for (field_name, field_def) in &input_def.fields {
                if let Some(field_value) = object.get(field_name.as_str()) {
                    let field_value = coerce_input_value(schema, &field_def.ty, field_value)?;
                    coerced.insert(field_name.as_str(), field_value);
                } else if let Some(default) = &field_def.default_value {
                    coerced.insert(field_name.as_str(), value_to_json(default, &Object::new()));
                } else if field_def.ty.is_non_null() {
                    return Err(format!(
                        "missing value for required field `{field_name}` of input type {ty_name}"
                    ));
                }
            }
            Ok(Value::Object(coerced))
        }
        Some(ExtendedType::Object(_))
        | Some(ExtendedType::Interface(_))
        | Some(ExtendedType::Union(_))
        | None => Err(format!("{ty_name} is not an input type")),
    }
}

/// Converts a GraphQL literal to JSON, substituting variables with their coerced values.
pub(crate) fn value_to_json(value: &ast::Value, variables: &Object) -> Value {
    match value {
        ast::Value::Null => Value::Null,
        ast::Value::Enum(name) => name.as_str().into(),
        ast::Value::Variable(name) => variables.get(name.as_str()).cloned().unwrap_or_default(),
        ast::Value::String(string) => string.as_str().into(),
        ast::Value::Boolean(boolean) => (*boolean).into(),
        ast::Value::Int(int) => match int.try_to_i32() {
            Ok(int) => int.into(),
            Err(_) => float_to_json(int.try_to_f64().ok()),
        },
        ast::Value::Float(float) => float_to_json(float.try_to_f64().ok()),
        ast::Value::List(items) => items
            .iter()
            .map(|item| value_to_json(item, variables))
            .collect::<Vec<_>>()
            .into(),
        ast::Value::Object(fields) => Value::Object(
            fields
                .iter()
                .map(|(name, value)| (name.as_str().into(), value_to_json(value, variables)))
                .collect(),
        ),
    }
}

fn float_to_json(float: Option<f64>) -> Value {
    float
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .unwrap_or_default()
}
