//! Execution backends that delegated operations are sent to.

mod http;
mod schema;

use std::sync::Arc;

use apollo_compiler::Node;
use apollo_compiler::executable::Fragment;
use apollo_compiler::executable::Operation;
use tower::BoxError;

pub use self::http::HttpDelegate;
pub use self::schema::SchemaDelegate;
use crate::configuration::ErrorsReporting;
use crate::execution::ExecutableSchema;
use crate::graphql;
use crate::json_ext::Object;

/// An operation handed to a [`Delegate`].
///
/// Every selection set of the operation and its fragments below the root type selects
/// `__typename`, and the fragments are those the operation references.
#[derive(Clone, Debug)]
pub struct DelegatedRequest {
    pub operation: Node<Operation>,
    pub fragments: Vec<Node<Fragment>>,
    /// Coerced variable values of the host operation.
    pub variables: Object,
}

impl DelegatedRequest {
    pub(crate) fn new(
        operation: Node<Operation>,
        fragments: Vec<Node<Fragment>>,
        variables: Object,
    ) -> Self {
        Self {
            operation,
            fragments,
            variables,
        }
    }

    /// The operation and its fragments, as a single GraphQL document.
    pub fn document(&self) -> String {
        let mut document = self.operation.serialize().no_indent().to_string();
        for fragment in &self.fragments {
            document.push(' ');
            document.push_str(&fragment.serialize().no_indent().to_string());
        }
        document
    }

    /// A GraphQL request for this operation, suitable for any GraphQL endpoint.
    pub fn to_graphql_request(&self) -> graphql::Request {
        graphql::Request::builder()
            .query(self.document())
            .and_operation_name(self.operation.name.as_ref().map(|name| name.to_string()))
            .variables(self.variables.clone())
            .build()
    }
}

/// Executes delegated operations.
///
/// The delegate returns the complete result of the operation. Failures that are not part of
/// a GraphQL response (a transport error, a malformed response) are returned as `Err` and
/// reported as a single error, with every delegated field left without a value.
#[async_trait::async_trait]
pub trait Delegate: Send + Sync + 'static {
    /// `schema` is the schema of the host operation.
    async fn delegate(
        &self,
        schema: Arc<ExecutableSchema>,
        request: DelegatedRequest,
    ) -> Result<graphql::Response, BoxError>;
}

/// Receives the errors of each delegated execution, once per execution.
pub trait ErrorsReporter: Send + Sync + 'static {
    fn report(&self, errors: &[graphql::Error]);
}

/// Reports delegated errors as `tracing` events.
#[derive(Clone, Debug, Default)]
pub struct TracingErrorsReporter {
    include_causes: bool,
}

impl TracingErrorsReporter {
    pub fn new(include_causes: bool) -> Self {
        Self { include_causes }
    }

    /// `None` when reporting is disabled.
    pub(crate) fn from_configuration(configuration: &ErrorsReporting) -> Option<Self> {
        configuration
            .log
            .then(|| Self::new(configuration.include_causes))
    }
}

impl ErrorsReporter for TracingErrorsReporter {
    fn report(&self, errors: &[graphql::Error]) {
        for error in errors {
            let path = error.path.as_ref().map(|path| path.to_string());
            let code = error.extension_code();
            if self.include_causes {
                tracing::error!(
                    path = path.as_deref(),
                    code = code.as_deref(),
                    causes = %causes(error),
                    "delegated error: {}",
                    error.message
                );
            } else {
                tracing::error!(
                    path = path.as_deref(),
                    code = code.as_deref(),
                    "delegated error: {}",
                    error.message
                );
            }
        }
    }
}

/// The chain of causes of `error`, outermost first.
fn causes(error: &graphql::Error) -> String {
    let mut causes = Vec::new();
    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        causes.push(cause.to_string());
        source = cause.source();
    }
    causes.join(": ")
}

#[cfg(test)]
mod tests {
    use apollo_compiler::ExecutableDocument;
    use apollo_compiler::Schema;
    use serde_json_bytes::json;

    use super::*;
    use crate::delegation::with_typenames;
    use crate::error::DelegationError;
    use crate::graphql::ErrorSource;

    #[test]
    fn requests_carry_the_rewritten_document() {
        let schema = Schema::parse_and_validate(
            "type Query { hero(id: ID!): Hero } type Hero { name: String friend: Hero }",
            "schema.graphql",
        )
        .unwrap();
        let document = ExecutableDocument::parse_and_validate(
            &schema,
            "query Hero($id: ID!) { hero(id: $id) { ...Named friend { name } } } \
             query Other { hero(id: 1) { ...Unused } } \
             fragment Named on Hero { name } \
             fragment Unused on Hero { name }",
            "query.graphql",
        )
        .unwrap();
        let operation = document.operations.get(Some("Hero")).unwrap();
        let (operation, fragments) = with_typenames(operation, &document.fragments);
        let variables = json!({"id": "1000"});
        let request = DelegatedRequest::new(
            operation,
            fragments,
            variables.as_object().unwrap().clone(),
        )
        .to_graphql_request();

        assert_eq!(request.operation_name.as_deref(), Some("Hero"));
        assert_eq!(serde_json_bytes::Value::Object(request.variables), variables);
        let query = request.query.unwrap();
        assert!(query.contains("fragment Named on Hero"));
        assert!(!query.contains("Unused"));

        // The delegated document is valid against the same schema
        let document =
            ExecutableDocument::parse_and_validate(&schema, query.as_str(), "delegated.graphql")
                .unwrap();
        let hero = document
            .operations
            .get(None)
            .unwrap()
            .selection_set
            .fields()
            .next()
            .unwrap();
        assert!(
            hero.selection_set
                .fields()
                .any(|field| field.name == "__typename")
        );
    }

    #[test]
    fn causes_are_listed_outermost_first() {
        let fault: ErrorSource = Arc::new(std::io::Error::other("Bad execution delegator"));
        let error = DelegationError::DelegateFailed(fault).to_graphql_error(None);
        assert_eq!(causes(&error), "Bad execution delegator");

        let error = graphql::Error::builder().message("no cause").build();
        assert_eq!(causes(&error), "");
    }

    #[test]
    fn reporting_is_opt_in() {
        assert!(TracingErrorsReporter::from_configuration(&ErrorsReporting::default()).is_none());
        let configuration = ErrorsReporting {
            log: true,
            include_causes: true,
        };
        let reporter = TracingErrorsReporter::from_configuration(&configuration).unwrap();
        assert!(reporter.include_causes);
    }
}
