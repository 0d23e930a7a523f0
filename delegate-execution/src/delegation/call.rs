use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use futures::future::Shared;
use tracing::Instrument;

use crate::delegate::Delegate;
use crate::delegate::DelegatedRequest;
use crate::delegate::ErrorsReporter;
use crate::error::DelegationError;
use crate::execution::ExecutableSchema;
use crate::graphql;
use crate::graphql::ErrorSource;

/// The result of one delegated execution, awaited by every field it resolves.
pub(crate) type SharedDelegation = Shared<BoxFuture<'static, Arc<graphql::Response>>>;

/// The delegate panicked instead of returning.
#[derive(Debug, thiserror::Error)]
#[error("delegate panicked: {0}")]
struct DelegatePanicked(String);

/// Sends `request` to `delegate` once, the first time the returned future is polled.
///
/// The future never fails: a delegate error or panic becomes a response without data
/// carrying a single error, whose cause is the original fault. When the response carries
/// errors they are passed to `errors_reporter`.
pub(crate) fn call(
    delegate: Arc<dyn Delegate>,
    schema: Arc<ExecutableSchema>,
    request: DelegatedRequest,
    errors_reporter: Option<Arc<dyn ErrorsReporter>>,
) -> SharedDelegation {
    let span = tracing::info_span!(
        "delegated_operation",
        "graphql.operation.name" = request.operation.name.as_ref().map(|name| name.as_str()),
        "graphql.operation.type" = %request.operation.operation_type,
    );
    async move {
        let outcome = AssertUnwindSafe(async move { delegate.delegate(schema, request).await })
            .catch_unwind()
            .await;
        let response = match outcome {
            Ok(Ok(response)) => response,
            Ok(Err(error)) => failed(Arc::from(error)),
            Err(panic) => failed(Arc::new(DelegatePanicked(panic_message(panic)))),
        };
        if !response.errors.is_empty() {
            tracing::debug!(
                errors = response.errors.len(),
                "delegated operation returned errors"
            );
            if let Some(reporter) = &errors_reporter {
                reporter.report(&response.errors);
            }
        }
        Arc::new(response)
    }
    .instrument(span)
    .boxed()
    .shared()
}

fn failed(fault: ErrorSource) -> graphql::Response {
    tracing::error!(error = %fault, "delegated operation failed");
    graphql::Response::builder()
        .error(DelegationError::DelegateFailed(fault).to_graphql_error(None))
        .build()
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    match panic.downcast::<String>() {
        Ok(message) => *message,
        Err(panic) => panic
            .downcast_ref::<&str>()
            .map(|message| message.to_string())
            .unwrap_or_else(|| "unknown panic payload".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering;

    use apollo_compiler::ExecutableDocument;
    use parking_lot::Mutex;
    use serde_json_bytes::json;
    use test_log::test;
    use tower::BoxError;

    use super::*;
    use crate::delegation::with_typenames;
    use crate::json_ext::Object;

    const SDL: &str = "type Query { dummy: String }";

    struct Counting {
        calls: AtomicUsize,
        response: fn() -> Result<graphql::Response, BoxError>,
    }

    #[async_trait::async_trait]
    impl Delegate for Counting {
        async fn delegate(
            &self,
            _schema: Arc<ExecutableSchema>,
            _request: DelegatedRequest,
        ) -> Result<graphql::Response, BoxError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.response)()
        }
    }

    #[derive(Default)]
    struct Recording(Mutex<Vec<Vec<graphql::Error>>>);

    impl ErrorsReporter for Recording {
        fn report(&self, errors: &[graphql::Error]) {
            self.0.lock().push(errors.to_vec());
        }
    }

    fn inputs() -> (Arc<ExecutableSchema>, DelegatedRequest) {
        let schema =
            Arc::new(ExecutableSchema::parse_and_validate(SDL, "schema.graphql").unwrap());
        let document = ExecutableDocument::parse_and_validate(
            schema.definitions(),
            "{ dummy }",
            "query.graphql",
        )
        .unwrap();
        let operation = document.operations.get(None).unwrap();
        let (operation, fragments) = with_typenames(operation, &document.fragments);
        (schema, DelegatedRequest::new(operation, fragments, Object::new()))
    }

    #[test(tokio::test)]
    async fn the_delegate_runs_once_for_every_waiter() {
        let delegate = Arc::new(Counting {
            calls: AtomicUsize::new(0),
            response: || Ok(graphql::Response::builder().data(json!({"dummy": "x"})).build()),
        });
        let (schema, request) = inputs();
        let shared = call(delegate.clone(), schema, request, None);

        // Nothing is sent before the first poll
        assert_eq!(delegate.calls.load(Ordering::SeqCst), 0);
        let (first, second) = futures::join!(shared.clone(), shared.clone());
        let third = shared.await;

        assert_eq!(delegate.calls.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert!(Arc::ptr_eq(&first, &third));
        assert_eq!(first.data, Some(json!({"dummy": "x"})));
    }

    #[test(tokio::test)]
    async fn delegate_errors_become_a_response() {
        let delegate = Arc::new(Counting {
            calls: AtomicUsize::new(0),
            response: || Err("Bad execution delegator".into()),
        });
        let reporter = Arc::new(Recording::default());
        let (schema, request) = inputs();

        let reporter_handle: Arc<dyn ErrorsReporter> = reporter.clone();
        let response = call(delegate, schema, request, Some(reporter_handle)).await;

        assert_eq!(response.data, None);
        assert_eq!(response.errors.len(), 1);
        let error = &response.errors[0];
        assert_eq!(error.message, "Error during delegate execution");
        assert_eq!(error.path, None);
        assert_eq!(
            error.cause().map(|cause| cause.to_string()).as_deref(),
            Some("Bad execution delegator")
        );

        let reported = reporter.0.lock();
        assert_eq!(reported.len(), 1);
        assert_eq!(reported[0], response.errors);
    }

    #[test(tokio::test)]
    async fn delegate_panics_become_a_response() {
        struct Panicking;

        #[async_trait::async_trait]
        impl Delegate for Panicking {
            async fn delegate(
                &self,
                _schema: Arc<ExecutableSchema>,
                _request: DelegatedRequest,
            ) -> Result<graphql::Response, BoxError> {
                panic!("delegate is broken")
            }
        }

        let (schema, request) = inputs();
        let response = call(Arc::new(Panicking), schema, request, None).await;
        assert_eq!(response.errors[0].message, "Error during delegate execution");
        assert_eq!(
            response.errors[0]
                .cause()
                .map(|cause| cause.to_string())
                .as_deref(),
            Some("delegate panicked: delegate is broken")
        );
    }

    #[test(tokio::test)]
    async fn successful_responses_are_not_reported() {
        let delegate = Arc::new(Counting {
            calls: AtomicUsize::new(0),
            response: || Ok(graphql::Response::builder().data(json!({"dummy": "x"})).build()),
        });
        let reporter = Arc::new(Recording::default());
        let (schema, request) = inputs();

        let reporter_handle: Arc<dyn ErrorsReporter> = reporter.clone();
        call(delegate, schema, request, Some(reporter_handle)).await;
        assert!(reporter.0.lock().is_empty());
    }
}
