use std::ops::Deref;
use std::ops::DerefMut;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use apollo_compiler::ExecutableDocument;
use apollo_compiler::Node;
use apollo_compiler::executable::FragmentMap;
use apollo_compiler::executable::Operation;
use apollo_compiler::validation::Valid;

use crate::json_ext::Object;

/// Typed storage, keyed by type.
pub type Extensions = http::Extensions;

static NEXT_OPERATION_ID: AtomicU64 = AtomicU64::new(1);

/// One execution of one operation.
///
/// Every field resolved while executing the operation sees the same context, and it is
/// dropped once the response is built. Per-operation state is kept in its
/// [`extensions`](Self::extensions).
#[derive(Debug)]
pub struct OperationContext {
    id: u64,
    document: Valid<ExecutableDocument>,
    operation: Node<Operation>,
    variables: Object,
    extensions: ExtensionsMutex,
}

impl OperationContext {
    pub(crate) fn new(
        document: Valid<ExecutableDocument>,
        operation: Node<Operation>,
        variables: Object,
    ) -> Self {
        Self {
            id: NEXT_OPERATION_ID.fetch_add(1, Ordering::Relaxed),
            document,
            operation,
            variables,
            extensions: ExtensionsMutex::default(),
        }
    }

    /// Unique within the process.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn document(&self) -> &Valid<ExecutableDocument> {
        &self.document
    }

    /// The selected operation.
    pub fn operation(&self) -> &Node<Operation> {
        &self.operation
    }

    /// Every fragment of the document, including those the operation does not reference.
    pub fn fragments(&self) -> &FragmentMap {
        &self.document.fragments
    }

    /// Coerced variable values.
    pub fn variables(&self) -> &Object {
        &self.variables
    }

    pub fn extensions(&self) -> &ExtensionsMutex {
        &self.extensions
    }
}

/// Non-serializable data attached to an operation.
///
/// Extensions are thread safe, and must be locked for mutation.
///
/// For example:
/// `operation.extensions().with_lock(|mut lock| lock.insert::<MyData>(data));`
#[derive(Default, Clone, Debug)]
pub struct ExtensionsMutex {
    extensions: Arc<parking_lot::Mutex<Extensions>>,
}

impl ExtensionsMutex {
    /// Locks the extensions for interaction.
    ///
    /// The lock will be dropped once the closure completes.
    pub fn with_lock<'a, T, F: FnOnce(ExtensionsGuard<'a>) -> T>(&'a self, func: F) -> T {
        let locked = ExtensionsGuard::new(&self.extensions);
        func(locked)
    }
}

pub struct ExtensionsGuard<'a> {
    guard: parking_lot::MutexGuard<'a, Extensions>,
}

impl<'a> ExtensionsGuard<'a> {
    fn new(guard: &'a parking_lot::Mutex<Extensions>) -> Self {
        Self {
            guard: guard.lock(),
        }
    }
}

impl Deref for ExtensionsGuard<'_> {
    type Target = Extensions;

    fn deref(&self) -> &Extensions {
        &self.guard
    }
}

impl DerefMut for ExtensionsGuard<'_> {
    fn deref_mut(&mut self) -> &mut Extensions {
        &mut self.guard
    }
}

#[cfg(test)]
mod tests {
    use apollo_compiler::Schema;

    use super::*;

    fn context(query: &str) -> OperationContext {
        let schema = Schema::parse_and_validate("type Query { a: Int }", "schema.graphql").unwrap();
        let document =
            ExecutableDocument::parse_and_validate(&schema, query, "query.graphql").unwrap();
        let operation = document.operations.get(None).unwrap().clone();
        OperationContext::new(document, operation, Object::new())
    }

    #[test]
    fn every_execution_gets_its_own_id() {
        let first = context("{ a }");
        let second = context("{ a }");
        assert_ne!(first.id(), second.id());
    }

    #[test]
    fn extensions_are_shared_between_clones() {
        let operation = context("{ a }");
        let extensions = operation.extensions().clone();
        extensions.with_lock(|mut lock| lock.insert(42u8));
        assert_eq!(
            operation
                .extensions()
                .with_lock(|lock| lock.get::<u8>().copied()),
            Some(42)
        );
    }
}
