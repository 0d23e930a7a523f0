//! Delegation errors.
use apollo_compiler::Name;
use apollo_compiler::ast::OperationType;
use apollo_compiler::validation::DiagnosticList;
use apollo_compiler::validation::WithErrors;
use displaydoc::Display;
use thiserror::Error;

pub use crate::configuration::ConfigurationError;
use crate::graphql;
use crate::graphql::ErrorSource;
use crate::graphql::IntoGraphQLErrors;
use crate::json_ext::Path;

/// Failures raised while resolving a field through a delegated execution.
///
/// Each one is a field-level error: the host engine nulls the field and records the error
/// at the field's path, without aborting the rest of the operation.
#[derive(Error, Display, Debug)]
#[non_exhaustive]
pub enum DelegationError {
    /// Error during delegate execution
    DelegateFailed(#[source] ErrorSource),

    /// {0}
    Located(#[source] graphql::Error),

    /// Delegated execution result is missing field value at path: `{0}`
    MissingValue(Path),

    /// expected type `{type_name}` implementing `{abstract_type}` to exist in schema
    UnknownImplementingType {
        /// The `__typename` reported by the delegate.
        type_name: String,
        /// The abstract type the value was resolved for.
        abstract_type: Name,
    },

    /// delegated value of abstract type `{0}` does not report its `__typename`
    MissingTypename(Name),
}

impl DelegationError {
    /// The `extensions.code` attached to the GraphQL error built from this error.
    pub fn extension_code(&self) -> &'static str {
        match self {
            DelegationError::DelegateFailed(_) => "DELEGATE_EXECUTION_FAILED",
            DelegationError::Located(_) => "DELEGATED_FIELD_ERROR",
            DelegationError::MissingValue(_) => "DELEGATED_VALUE_MISSING",
            DelegationError::UnknownImplementingType { .. } => "DELEGATED_TYPE_NOT_FOUND",
            DelegationError::MissingTypename(_) => "DELEGATED_TYPENAME_MISSING",
        }
    }

    /// Convert the error to a GraphQL error, keeping the original fault as its cause.
    pub(crate) fn to_graphql_error(&self, path: Option<Path>) -> graphql::Error {
        let error = graphql::Error::builder()
            .message(self.to_string())
            .and_path(path)
            .extension_code(self.extension_code())
            .build();
        match self {
            DelegationError::DelegateFailed(source) => error.with_source(source.clone()),
            _ => error,
        }
    }
}

/// Errors building an executable schema.
#[derive(Debug, Error, Display)]
#[non_exhaustive]
pub enum SchemaError {
    /// GraphQL validation error: {0}
    Validate(ValidationErrors),
}

impl<T> From<WithErrors<T>> for SchemaError {
    fn from(errors: WithErrors<T>) -> Self {
        SchemaError::Validate(errors.into())
    }
}

/// Errors rejecting a request before any field is executed.
#[derive(Debug, Error, Display)]
#[non_exhaustive]
pub enum RequestError {
    /// must provide query string
    MissingQuery,

    /// schema does not define a root type for {0} operations
    UnsupportedOperationType(OperationType),

    /// invalid value for variable `${name}`: {reason}
    InvalidVariable {
        /// Name of the variable.
        name: Name,
        /// Why the provided value was rejected.
        reason: String,
    },
}

impl RequestError {
    pub(crate) fn extension_code(&self) -> &'static str {
        match self {
            RequestError::MissingQuery => "GRAPHQL_PARSE_FAILED",
            RequestError::UnsupportedOperationType(_) => "OPERATION_NOT_SUPPORTED",
            RequestError::InvalidVariable { .. } => "VALIDATION_INVALID_TYPE_VARIABLE",
        }
    }
}

impl IntoGraphQLErrors for RequestError {
    fn into_graphql_errors(self) -> Vec<graphql::Error> {
        let mut error = graphql::Error::builder()
            .message(self.to_string())
            .extension_code(self.extension_code())
            .build();
        if let RequestError::InvalidVariable { name, .. } = &self {
            error.extensions.insert("name", name.as_str().into());
        }
        vec![error]
    }
}

/// Collection of GraphQL validation errors.
#[derive(Debug, Clone)]
pub struct ValidationErrors {
    pub(crate) errors: Vec<apollo_compiler::response::GraphQLError>,
}

impl IntoGraphQLErrors for ValidationErrors {
    fn into_graphql_errors(self) -> Vec<graphql::Error> {
        self.errors
            .into_iter()
            .map(|diagnostic| {
                let mut error = graphql::Error::from(diagnostic);
                error
                    .extensions
                    .entry("code")
                    .or_insert_with(|| "GRAPHQL_VALIDATION_FAILED".into());
                error
            })
            .collect()
    }
}

impl From<DiagnosticList> for ValidationErrors {
    fn from(errors: DiagnosticList) -> Self {
        Self {
            errors: errors.iter().map(|e| e.to_json()).collect(),
        }
    }
}

impl<T> From<WithErrors<T>> for ValidationErrors {
    fn from(WithErrors { errors, .. }: WithErrors<T>) -> Self {
        errors.into()
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (index, error) in self.errors.iter().enumerate() {
            if index > 0 {
                f.write_str("\n")?;
            }
            if let Some(location) = error.locations.first() {
                write!(
                    f,
                    "[{}:{}] {}",
                    location.line, location.column, error.message
                )?;
            } else {
                write!(f, "{}", error.message)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use apollo_compiler::name;

    use super::*;
    use crate::json_ext::PathElement;

    #[test]
    fn delegate_failure_keeps_the_fault_as_cause() {
        let fault: ErrorSource = Arc::new(std::io::Error::other("Bad execution delegator"));
        let error = DelegationError::DelegateFailed(fault).to_graphql_error(None);

        assert_eq!(error.message, "Error during delegate execution");
        assert_eq!(
            error.extension_code().as_deref(),
            Some("DELEGATE_EXECUTION_FAILED")
        );
        let cause = std::error::Error::source(&error).unwrap();
        assert_eq!(cause.to_string(), "Bad execution delegator");
    }

    #[test]
    fn missing_value_names_the_dotted_path() {
        let path = Path(vec![
            PathElement::Key("hero".to_string()),
            PathElement::Index(2),
            PathElement::Key("name".to_string()),
        ]);
        let error = DelegationError::MissingValue(path.clone());
        assert_eq!(
            error.to_string(),
            "Delegated execution result is missing field value at path: `hero.2.name`"
        );
        let error = error.to_graphql_error(Some(path.clone()));
        assert_eq!(error.path, Some(path));
        assert_eq!(
            error.extension_code().as_deref(),
            Some("DELEGATED_VALUE_MISSING")
        );
    }

    #[test]
    fn unknown_implementing_type_names_both_types() {
        let error = DelegationError::UnknownImplementingType {
            type_name: "DummyObject".to_string(),
            abstract_type: name!("Unknown"),
        };
        assert_eq!(
            error.to_string(),
            "expected type `DummyObject` implementing `Unknown` to exist in schema"
        );
    }

    #[test]
    fn invalid_variable_carries_its_name() {
        let errors = RequestError::InvalidVariable {
            name: name!("id"),
            reason: "expected a value of type ID!".to_string(),
        }
        .into_graphql_errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors[0].message,
            "invalid value for variable `$id`: expected a value of type ID!"
        );
        assert_eq!(
            errors[0].extension_code().as_deref(),
            Some("VALIDATION_INVALID_TYPE_VARIABLE")
        );
        assert_eq!(
            errors[0].extensions.get("name"),
            Some(&serde_json_bytes::Value::from("id"))
        );
    }
}
