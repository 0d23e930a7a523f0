//! Delegated execution of GraphQL operations.
//!
//! A [`Coordinator`] installed on an [`ExecutableSchema`] sends each operation executed
//! against that schema, whole, to a [`Delegate`] exactly once, and resolves every field
//! from the delegated response.
//!
//! ```ignore
//! let schema = Arc::new(ExecutableSchema::parse_and_validate(sdl, "schema.graphql")?);
//! delegate(&schema, Arc::new(HttpDelegate::new(&http_configuration)?), None);
//! let response = execute(&schema, &request).await;
//! ```

#![warn(unreachable_pub)]

#[macro_use]
pub mod json_ext;

pub mod configuration;
pub mod delegate;
pub mod delegation;
pub mod error;
pub mod execution;
pub mod graphql;

pub use crate::configuration::Configuration;
pub use crate::delegate::Delegate;
pub use crate::delegate::DelegatedRequest;
pub use crate::delegate::ErrorsReporter;
pub use crate::delegate::HttpDelegate;
pub use crate::delegate::SchemaDelegate;
pub use crate::delegate::TracingErrorsReporter;
pub use crate::delegation::Coordinator;
pub use crate::delegation::delegate;
pub use crate::error::DelegationError;
pub use crate::execution::ExecutableSchema;
pub use crate::execution::execute;
