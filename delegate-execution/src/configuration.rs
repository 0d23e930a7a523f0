//! Logic for loading configuration in to an object model
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use apollo_compiler::ast::OperationType;
use derivative::Derivative;
use displaydoc::Display;
use schemars::JsonSchema;
use schemars::r#gen::SchemaSettings;
use schemars::schema::RootSchema;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use url::Url;

/// Configuration error.
#[derive(Debug, Error, Display)]
#[non_exhaustive]
pub enum ConfigurationError {
    /// {message}: {error}
    InvalidConfiguration {
        /// What was being configured.
        message: &'static str,
        /// Why it was rejected.
        error: String,
    },
    /// could not deserialize configuration: {0}
    DeserializeConfigError(serde_yaml::Error),
}

/// The configuration of a delegated execution.
///
/// Can be created through `serde::Deserialize` from various formats,
/// or parsed from YAML with [`Configuration::from_str`].
#[derive(Clone, Derivative, Deserialize, Serialize, JsonSchema)]
#[derivative(Debug, PartialEq)]
#[serde(deny_unknown_fields, default)]
pub struct Configuration {
    /// Root operation types whose fields are delegated. Defaults to all three.
    pub operation_types: Vec<OperationKind>,

    /// Reporting of the errors returned by delegated calls.
    pub errors: ErrorsReporting,

    /// Remote GraphQL endpoint used by the HTTP delegate.
    pub http: Option<HttpDelegateConfig>,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            operation_types: default_operation_types(),
            errors: ErrorsReporting::default(),
            http: None,
        }
    }
}

fn default_operation_types() -> Vec<OperationKind> {
    vec![
        OperationKind::Query,
        OperationKind::Mutation,
        OperationKind::Subscription,
    ]
}

/// A GraphQL root operation type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// `query` operations.
    Query,
    /// `mutation` operations.
    Mutation,
    /// `subscription` operations.
    Subscription,
}

impl From<OperationKind> for OperationType {
    fn from(kind: OperationKind) -> Self {
        match kind {
            OperationKind::Query => OperationType::Query,
            OperationKind::Mutation => OperationType::Mutation,
            OperationKind::Subscription => OperationType::Subscription,
        }
    }
}

/// Reporting of delegated errors
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields, default)]
pub struct ErrorsReporting {
    /// Log every error returned by a delegated call when no reporter is given; defaults to false
    pub log: bool,

    /// Also log the chain of causes of each error; defaults to false
    pub include_causes: bool,
}

impl Default for ErrorsReporting {
    fn default() -> Self {
        Self {
            log: false,
            include_causes: false,
        }
    }
}

/// Configuration of the HTTP delegate
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct HttpDelegateConfig {
    /// URL of the GraphQL endpoint the operations are posted to.
    pub url: Url,

    /// Request timeout in human-readable format, e.g. `30s`
    #[serde(deserialize_with = "humantime_serde::deserialize", default)]
    #[schemars(with = "Option<String>", default)]
    pub timeout: Option<Duration>,

    /// Static headers added to every delegated request.
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

#[buildstructor::buildstructor]
impl Configuration {
    #[builder]
    pub fn new(
        operation_types: Vec<OperationKind>,
        errors: Option<ErrorsReporting>,
        http: Option<HttpDelegateConfig>,
    ) -> Result<Self, ConfigurationError> {
        let configuration = Self {
            operation_types: if operation_types.is_empty() {
                default_operation_types()
            } else {
                operation_types
            },
            errors: errors.unwrap_or_default(),
            http,
        };
        configuration.validate()
    }

    /// The root operation types to delegate, in `query`, `mutation`, `subscription` order.
    pub fn delegated_operation_types(&self) -> impl Iterator<Item = OperationType> + '_ {
        [
            OperationKind::Query,
            OperationKind::Mutation,
            OperationKind::Subscription,
        ]
        .into_iter()
        .filter(|kind| self.operation_types.contains(kind))
        .map(OperationType::from)
    }

    pub(crate) fn validate(self) -> Result<Self, ConfigurationError> {
        if self.operation_types.is_empty() {
            return Err(ConfigurationError::InvalidConfiguration {
                message: "operation_types",
                error: "at least one root operation type must be delegated".to_string(),
            });
        }
        if let Some(http) = &self.http {
            if !matches!(http.url.scheme(), "http" | "https") {
                return Err(ConfigurationError::InvalidConfiguration {
                    message: "http.url",
                    error: format!("unsupported scheme `{}`", http.url.scheme()),
                });
            }
            if http.timeout.is_some_and(|timeout| timeout.is_zero()) {
                return Err(ConfigurationError::InvalidConfiguration {
                    message: "http.timeout",
                    error: "timeout must be greater than zero".to_string(),
                });
            }
        }
        Ok(self)
    }
}

/// Parse configuration from a YAML string.
impl FromStr for Configuration {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let configuration: Configuration =
            serde_yaml::from_str(s).map_err(ConfigurationError::DeserializeConfigError)?;
        configuration.validate()
    }
}

/// Generate a JSON schema for the configuration.
pub fn generate_config_schema() -> RootSchema {
    let settings = SchemaSettings::draft07().with(|s| {
        s.option_nullable = true;
        s.option_add_null_type = false;
        s.inline_subschemas = true;
    });
    let generator = settings.into_generator();
    generator.into_root_schema_for::<Configuration>()
}
