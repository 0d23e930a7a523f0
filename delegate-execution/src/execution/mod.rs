//! GraphQL execution against an [`ExecutableSchema`].
//!
//! Fields are resolved through the resolvers bound on the schema; fields without one read the
//! property of the same name from their parent value. Sibling fields of queries and
//! subscriptions are resolved concurrently, root fields of mutations one after the other.
//! Subscriptions produce a single response.

mod context;
mod engine;
mod input_coercion;
mod resolver;
mod result_coercion;
mod schema;

use std::sync::Arc;

use apollo_compiler::ExecutableDocument;
pub use context::Extensions;
pub use context::ExtensionsGuard;
pub use context::ExtensionsMutex;
pub use context::OperationContext;
pub use resolver::FieldError;
pub use resolver::FieldResolver;
pub use resolver::ResolveInfo;
pub use resolver::TypeResolver;
pub use resolver::resolver_fn;
pub use resolver::type_resolver_fn;
pub use schema::ExecutableSchema;

use self::engine::Engine;
use self::input_coercion::coerce_variable_values;
use crate::error::RequestError;
use crate::error::ValidationErrors;
use crate::graphql;
use crate::graphql::IntoGraphQLErrors;

/// Parses, validates and executes `request` against `schema`.
///
/// Request errors (an invalid document, an unknown operation, invalid variables) produce a
/// response without data. Field errors produce a partial response.
pub async fn execute(
    schema: &Arc<ExecutableSchema>,
    request: &graphql::Request,
) -> graphql::Response {
    let Some(query) = request.query.as_deref() else {
        return graphql::Response::from_errors(RequestError::MissingQuery.into_graphql_errors());
    };
    let document =
        match ExecutableDocument::parse_and_validate(schema.definitions(), query, "query.graphql") {
            Ok(document) => document,
            Err(errors) => {
                return graphql::Response::from_errors(
                    ValidationErrors::from(errors).into_graphql_errors(),
                );
            }
        };
    let operation = match document.operations.get(request.operation_name.as_deref()) {
        Ok(operation) => operation.clone(),
        Err(error) => {
            let mut error = graphql::Error::from(error.to_graphql_error(&document.sources));
            error
                .extensions
                .entry("code")
                .or_insert_with(|| "GRAPHQL_UNKNOWN_OPERATION_NAME".into());
            return graphql::Response::from_errors(vec![error]);
        }
    };
    let variables =
        match coerce_variable_values(schema.definitions(), &operation, &request.variables) {
            Ok(variables) => variables,
            Err(error) => return graphql::Response::from_errors(error.into_graphql_errors()),
        };
    let operation = Arc::new(OperationContext::new(document, operation, variables));
    execute_operation(schema, operation).await
}

/// Executes an operation that has already been selected and whose variables are coerced.
pub async fn execute_operation(
    schema: &Arc<ExecutableSchema>,
    operation: Arc<OperationContext>,
) -> graphql::Response {
    Engine::new(schema.clone(), operation).execute().await
}
