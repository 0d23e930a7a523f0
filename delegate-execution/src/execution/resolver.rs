use std::future::Future;
use std::sync::Arc;

use apollo_compiler::Name;
use apollo_compiler::ast::Type;
use apollo_compiler::parser::SourceMap;
use apollo_compiler::parser::SourceSpan;
use apollo_compiler::response::GraphQLError;
use futures::FutureExt;
use futures::future::BoxFuture;

use super::OperationContext;
use super::schema::ExecutableSchema;
use crate::error::DelegationError;
use crate::graphql;
use crate::graphql::ErrorSource;
use crate::json_ext::Object;
use crate::json_ext::Path;
use crate::json_ext::Value;

/// What a resolver knows about the field it is resolving.
#[derive(Clone, Debug)]
pub struct ResolveInfo {
    /// The schema the operation is executed against.
    pub schema: Arc<ExecutableSchema>,
    /// The operation being executed. Shared by every field of that operation.
    pub operation: Arc<OperationContext>,
    /// The object type the field belongs to.
    pub parent_type: Name,
    /// The name (not the alias) of the field.
    pub field_name: Name,
    /// The declared type of the field, with its list and non-null wrappers.
    pub return_type: Type,
    /// Where the field's value goes in the response.
    pub path: Path,
    /// Coerced field arguments.
    pub arguments: Object,
}

/// An error raised by a resolver.
///
/// The engine turns it into a GraphQL error at the field's path and location,
/// and nulls the field.
#[derive(Clone, Debug)]
pub struct FieldError {
    /// The error message.
    pub message: String,
    /// Extensions copied to the GraphQL error.
    pub extensions: Object,
    source: Option<ErrorSource>,
}

impl FieldError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            extensions: Object::new(),
            source: None,
        }
    }

    /// A field error with the message of `error`, which is kept as its cause.
    pub fn from_error(error: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::new(error.to_string()).with_source(Arc::new(error))
    }

    pub fn with_source(mut self, source: ErrorSource) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_extension_code(mut self, code: &str) -> Self {
        self.extensions.insert("code", code.into());
        self
    }

    /// The cause of this error, if any.
    pub fn cause(&self) -> Option<&ErrorSource> {
        self.source.as_ref()
    }

    pub(crate) fn into_graphql_error(
        self,
        path: Path,
        location: Option<SourceSpan>,
        sources: &SourceMap,
    ) -> graphql::Error {
        let mut error = graphql::Error::from(GraphQLError::new(self.message, location, sources))
            .with_path(path);
        error.extensions = self.extensions;
        match self.source {
            Some(source) => error.with_source(source),
            None => error,
        }
    }
}

impl From<DelegationError> for FieldError {
    fn from(error: DelegationError) -> Self {
        let message = error.to_string();
        let code = error.extension_code();
        match error {
            // The location of a delegated error points into the rewritten operation,
            // so only its message and extensions are kept.
            DelegationError::Located(located) => FieldError {
                message: located.message.clone(),
                extensions: located.extensions.clone(),
                source: Some(Arc::new(located)),
            },
            DelegationError::DelegateFailed(fault) => FieldError::new(message)
                .with_extension_code(code)
                .with_source(fault),
            _ => FieldError::new(message).with_extension_code(code),
        }
    }
}

/// Resolves the value of a field from its parent value.
pub trait FieldResolver: Send + Sync + 'static {
    fn resolve(
        &self,
        parent: &Value,
        info: &ResolveInfo,
    ) -> BoxFuture<'static, Result<Value, FieldError>>;
}

/// Resolves the concrete object type of a value of an interface or union type.
pub trait TypeResolver: Send + Sync + 'static {
    fn resolve_type(&self, value: &Value, info: &ResolveInfo) -> Result<Name, FieldError>;
}

struct FnFieldResolver<F>(F);

impl<F, Fut> FieldResolver for FnFieldResolver<F>
where
    F: Fn(&Value, &ResolveInfo) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, FieldError>> + Send + 'static,
{
    fn resolve(
        &self,
        parent: &Value,
        info: &ResolveInfo,
    ) -> BoxFuture<'static, Result<Value, FieldError>> {
        (self.0)(parent, info).boxed()
    }
}

/// Returns a [`FieldResolver`] calling `f`.
///
/// `f` runs synchronously when the field is reached; only the future it returns is awaited.
pub fn resolver_fn<F, Fut>(f: F) -> impl FieldResolver
where
    F: Fn(&Value, &ResolveInfo) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, FieldError>> + Send + 'static,
{
    FnFieldResolver(f)
}

struct FnTypeResolver<F>(F);

impl<F> TypeResolver for FnTypeResolver<F>
where
    F: Fn(&Value, &ResolveInfo) -> Result<Name, FieldError> + Send + Sync + 'static,
{
    fn resolve_type(&self, value: &Value, info: &ResolveInfo) -> Result<Name, FieldError> {
        (self.0)(value, info)
    }
}

/// Returns a [`TypeResolver`] calling `f`.
pub fn type_resolver_fn<F>(f: F) -> impl TypeResolver
where
    F: Fn(&Value, &ResolveInfo) -> Result<Name, FieldError> + Send + Sync + 'static,
{
    FnTypeResolver(f)
}
