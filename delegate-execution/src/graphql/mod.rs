//! Types related to GraphQL requests, responses, etc.

mod request;
mod response;

use std::fmt;
use std::sync::Arc;

use apollo_compiler::response::GraphQLError as CompilerExecutionError;
use derivative::Derivative;
pub use request::Request;
pub use response::MalformedResponseError;
pub use response::Response;
use serde::Deserialize;
use serde::Serialize;
use serde_json_bytes::ByteString;
use serde_json_bytes::Map as JsonMap;
use serde_json_bytes::Value;

use crate::json_ext::Object;
use crate::json_ext::Path;

/// The cause attached to an [`Error`]. Never serialized.
pub type ErrorSource = Arc<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(rename_all = "camelCase")]
/// The error location
pub struct Location {
    /// The line number
    pub line: u32,
    /// The column number
    pub column: u32,
}

/// A [GraphQL error](https://spec.graphql.org/October2021/#sec-Errors)
/// as may be found in the `errors` field of a GraphQL [`Response`].
///
/// Converted to (or from) JSON with serde. The [`source`][std::error::Error::source]
/// of an error is kept in memory only, so that whoever observes a delegated error
/// can walk back to the original fault.
#[derive(Clone, Derivative, Serialize, Deserialize, Default)]
#[derivative(Debug, PartialEq)]
#[serde(rename_all = "camelCase", default)]
#[non_exhaustive]
pub struct Error {
    /// The error message.
    pub message: String,

    /// The locations of the error in the GraphQL document of the originating request.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub locations: Vec<Location>,

    /// If this is a field error, the JSON path to that field in [`Response::data`]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<Path>,

    /// The optional GraphQL extensions for this error.
    #[serde(skip_serializing_if = "Object::is_empty")]
    pub extensions: Object,

    #[serde(skip)]
    #[derivative(PartialEq = "ignore")]
    source: Option<ErrorSource>,
}

#[buildstructor::buildstructor]
impl Error {
    /// Returns a builder that builds a GraphQL [`Error`] from its components.
    ///
    /// Builder methods:
    ///
    /// * `.message(impl Into<`[`String`]`>)`
    ///   Required.
    ///   Sets [`Error::message`].
    ///
    /// * `.locations(impl Into<`[`Vec`]`<`[`Location`]`>>)`
    ///   Optional.
    ///   Sets the entire `Vec` of [`Error::locations`], which defaults to the empty.
    ///
    /// * `.path(impl Into<`[`Path`]`>)`
    ///   Optional.
    ///   Sets [`Error::path`].
    ///
    /// * `.extension(impl Into<`[`ByteString`]`>, impl Into<`[`Value`]`>)`
    ///   Optional, may be called multiple times.
    ///   Adds one item to the [`Error::extensions`] map.
    ///
    /// * `.extension_code(impl Into<`[`String`]`>)`
    ///   Optional.
    ///   Sets the "code" in the extension map. Will be ignored if extension already has this key
    ///   set.
    ///
    /// * `.build()`
    ///   Finishes the builder and returns a GraphQL [`Error`].
    #[builder(visibility = "pub")]
    fn new(
        message: String,
        locations: Vec<Location>,
        path: Option<Path>,
        extension_code: Option<String>,
        // Skip the `Object` type alias in order to use buildstructor's map special-casing
        mut extensions: JsonMap<ByteString, Value>,
    ) -> Self {
        if let Some(code) = extension_code {
            extensions
                .entry("code")
                .or_insert(Value::String(ByteString::from(code)));
        }
        Self {
            message,
            locations,
            path,
            extensions,
            source: None,
        }
    }

    /// Returns the error with its cause set to `source`.
    pub fn with_source(mut self, source: ErrorSource) -> Self {
        self.source = Some(source);
        self
    }

    /// Returns the error with its path set to `path`.
    pub fn with_path(mut self, path: Path) -> Self {
        self.path = Some(path);
        self
    }

    /// The cause of this error, if any.
    pub fn cause(&self) -> Option<&ErrorSource> {
        self.source.as_ref()
    }

    /// Extract the error code from [`Error::extensions`] as a String if it is set.
    pub fn extension_code(&self) -> Option<String> {
        self.extensions.get("code").and_then(|c| match c {
            Value::String(s) => Some(s.as_str().to_owned()),
            Value::Number(n) => Some(n.to_string()),
            Value::Null | Value::Array(_) | Value::Object(_) | Value::Bool(_) => None,
        })
    }
}

/// Displays (only) the error message.
impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.message.fmt(f)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|source| source as &(dyn std::error::Error + 'static))
    }
}

/// Trait used to convert expected errors into a list of GraphQL errors
pub(crate) trait IntoGraphQLErrors
where
    Self: Sized,
{
    fn into_graphql_errors(self) -> Vec<Error>;
}

impl From<CompilerExecutionError> for Error {
    fn from(error: CompilerExecutionError) -> Self {
        let CompilerExecutionError {
            message,
            locations,
            path,
            extensions,
        } = error;
        let locations = locations
            .into_iter()
            .map(|location| Location {
                line: location.line as u32,
                column: location.column as u32,
            })
            .collect::<Vec<_>>();
        let path = if !path.is_empty() {
            Some(Path::from(path))
        } else {
            None
        };
        Self {
            message,
            locations,
            path,
            extensions,
            source: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json_bytes::json;

    use super::*;
    use crate::json_ext::PathElement;

    #[test]
    fn error_round_trips_through_json_without_its_source() {
        let source = std::io::Error::other("connection reset");
        let error = Error::builder()
            .message("Name for character with ID 1002 could not be fetched.")
            .location(Location { line: 6, column: 7 })
            .path(Path(vec![
                PathElement::Key("hero".to_string()),
                PathElement::Index(1),
                PathElement::Key("name".to_string()),
            ]))
            .extension_code("FETCH_FAILED")
            .build()
            .with_source(Arc::new(source));

        let value = serde_json_bytes::to_value(&error).unwrap();
        assert_eq!(
            value,
            json!({
                "message": "Name for character with ID 1002 could not be fetched.",
                "locations": [{ "line": 6, "column": 7 }],
                "path": ["hero", 1, "name"],
                "extensions": { "code": "FETCH_FAILED" }
            })
        );

        let parsed: Error = serde_json_bytes::from_value(value).unwrap();
        assert!(parsed.cause().is_none());
        assert_eq!(parsed, error);
    }

    #[test]
    fn source_is_exposed_through_std_error() {
        let error = Error::builder()
            .message("outer")
            .build()
            .with_source(Arc::new(std::io::Error::other("inner")));
        let source = std::error::Error::source(&error).unwrap();
        assert_eq!(source.to_string(), "inner");
        assert_eq!(error.to_string(), "outer");
    }

    #[test]
    fn extension_code_does_not_override_explicit_code() {
        let error = Error::builder()
            .message("oops")
            .extension("code", "EXPLICIT")
            .extension_code("IGNORED")
            .build();
        assert_eq!(error.extension_code().as_deref(), Some("EXPLICIT"));
    }
}
