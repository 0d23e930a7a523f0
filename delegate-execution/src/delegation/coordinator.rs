use std::collections::HashMap;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use apollo_compiler::Name;
use futures::FutureExt;
use futures::future::BoxFuture;
use parking_lot::Mutex;

use super::call::SharedDelegation;
use super::call::call;
use super::path::extract_at;
use super::with_typenames;
use crate::configuration::Configuration;
use crate::delegate::Delegate;
use crate::delegate::DelegatedRequest;
use crate::delegate::ErrorsReporter;
use crate::delegate::TracingErrorsReporter;
use crate::execution::ExecutableSchema;
use crate::execution::FieldError;
use crate::execution::ResolveInfo;
use crate::json_ext::Value;

static NEXT_COORDINATOR_ID: AtomicU64 = AtomicU64::new(1);

/// Delegated executions started during one operation, by coordinator.
#[derive(Clone, Default)]
struct Delegations(HashMap<u64, SharedDelegation>);

/// Resolves the fields of a schema by delegating whole operations to a [`Delegate`].
///
/// The first delegated field resolved in an operation sends the entire operation to the
/// delegate. Every other delegated field of that operation is then read from the same
/// response, at its own path.
///
/// A coordinator is installed on a single schema.
pub struct Coordinator {
    id: u64,
    delegate: Arc<dyn Delegate>,
    errors_reporter: Option<Arc<dyn ErrorsReporter>>,
    configuration: Configuration,
    pub(super) installed: Mutex<HashSet<Name>>,
}

impl Coordinator {
    /// A coordinator with the default configuration.
    ///
    /// Without an explicit reporter, errors of delegated executions are not reported unless
    /// `errors.log` is enabled in the configuration.
    pub fn new(delegate: Arc<dyn Delegate>) -> Self {
        Self {
            id: NEXT_COORDINATOR_ID.fetch_add(1, Ordering::Relaxed),
            delegate,
            errors_reporter: None,
            configuration: Configuration::default(),
            installed: Default::default(),
        }
    }

    pub fn with_errors_reporter(mut self, errors_reporter: Arc<dyn ErrorsReporter>) -> Self {
        self.errors_reporter = Some(errors_reporter);
        self
    }

    pub fn with_configuration(mut self, configuration: Configuration) -> Self {
        self.configuration = configuration;
        self
    }

    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    /// Installs delegated resolvers on the root types of `schema`.
    ///
    /// Installing twice has no further effect.
    pub fn install(self: &Arc<Self>, schema: &ExecutableSchema) {
        for operation_type in self.configuration.delegated_operation_types() {
            if let Some(root) = schema.root_operation_type(operation_type) {
                self.ensure_installed(schema, &root.name);
            }
        }
    }

    fn errors_reporter(&self) -> Option<Arc<dyn ErrorsReporter>> {
        self.errors_reporter.clone().or_else(|| {
            TracingErrorsReporter::from_configuration(&self.configuration.errors)
                .map(|reporter| Arc::new(reporter) as Arc<dyn ErrorsReporter>)
        })
    }

    /// Resolves one delegated field from the delegated response of its operation.
    pub(crate) fn resolve_field(
        self: &Arc<Self>,
        info: &ResolveInfo,
    ) -> BoxFuture<'static, Result<Value, FieldError>> {
        let delegation = self.delegation(info);
        // Nested selections of this field are resolved from the same response
        self.ensure_installed(&info.schema, info.return_type.inner_named_type());
        let path = info.path.clone();
        async move {
            let response = delegation.await;
            extract_at(&path, &response).map_err(FieldError::from)
        }
        .boxed()
    }

    /// The delegated execution of the operation `info` belongs to, started on first use.
    fn delegation(&self, info: &ResolveInfo) -> SharedDelegation {
        info.operation.extensions().with_lock(|mut extensions| {
            extensions
                .get_or_insert_default::<Delegations>()
                .0
                .entry(self.id)
                .or_insert_with(|| {
                    tracing::debug!(
                        operation_id = info.operation.id(),
                        field = %info.path,
                        "starting delegated execution"
                    );
                    let (operation, fragments) =
                        with_typenames(info.operation.operation(), info.operation.fragments());
                    let request = DelegatedRequest::new(
                        operation,
                        fragments,
                        info.operation.variables().clone(),
                    );
                    call(
                        self.delegate.clone(),
                        info.schema.clone(),
                        request,
                        self.errors_reporter(),
                    )
                })
                .clone()
        })
    }
}

impl fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coordinator")
            .field("id", &self.id)
            .field("configuration", &self.configuration)
            .field("installed", &self.installed.lock().len())
            .finish_non_exhaustive()
    }
}
