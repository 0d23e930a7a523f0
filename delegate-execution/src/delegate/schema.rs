use std::sync::Arc;

use tower::BoxError;

use super::Delegate;
use super::DelegatedRequest;
use crate::execution;
use crate::execution::ExecutableSchema;
use crate::graphql;

/// Executes delegated operations against another in-process schema.
///
/// The operation is validated against that schema first: selections it does not know are
/// reported as validation errors in the response, not as a failure of the delegate.
#[derive(Clone, Debug)]
pub struct SchemaDelegate {
    schema: Arc<ExecutableSchema>,
}

impl SchemaDelegate {
    pub fn new(schema: Arc<ExecutableSchema>) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &Arc<ExecutableSchema> {
        &self.schema
    }
}

#[async_trait::async_trait]
impl Delegate for SchemaDelegate {
    async fn delegate(
        &self,
        _schema: Arc<ExecutableSchema>,
        request: DelegatedRequest,
    ) -> Result<graphql::Response, BoxError> {
        let request = request.to_graphql_request();
        tracing::trace!(query = request.query.as_deref(), "executing delegated operation");
        Ok(execution::execute(&self.schema, &request).await)
    }
}
