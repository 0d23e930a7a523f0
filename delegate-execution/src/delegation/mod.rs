//! Delegation of whole operations.
//!
//! Installing a [`Coordinator`] on a schema replaces the resolvers of its root types. When an
//! operation runs, the first delegated field sends the entire operation, rewritten to select
//! `__typename` below its root, to the delegate. Every delegated field then reads its value from
//! that single response by its path, and the resolvers of nested types are installed as the
//! values returned by the delegate reach them.

mod call;
mod coordinator;
mod installer;
mod path;
mod typename;

use std::sync::Arc;

pub use self::coordinator::Coordinator;
pub(crate) use self::typename::with_typenames;
use crate::delegate::Delegate;
use crate::delegate::ErrorsReporter;
use crate::execution::ExecutableSchema;

/// Delegates the execution of `schema` to `delegate`.
///
/// Errors of each delegated execution are passed to `errors_reporter`, or logged when there
/// is none.
pub fn delegate(
    schema: &ExecutableSchema,
    delegate: Arc<dyn Delegate>,
    errors_reporter: Option<Arc<dyn ErrorsReporter>>,
) -> Arc<Coordinator> {
    let mut coordinator = Coordinator::new(delegate);
    if let Some(errors_reporter) = errors_reporter {
        coordinator = coordinator.with_errors_reporter(errors_reporter);
    }
    let coordinator = Arc::new(coordinator);
    coordinator.install(schema);
    coordinator
}
