use std::sync::Arc;

use bytes::Bytes;
use reqwest::header::ACCEPT;
use reqwest::header::CONTENT_TYPE;
use reqwest::header::HeaderMap;
use reqwest::header::HeaderName;
use reqwest::header::HeaderValue;
use tower::BoxError;
use url::Url;

use super::Delegate;
use super::DelegatedRequest;
use crate::configuration::ConfigurationError;
use crate::configuration::HttpDelegateConfig;
use crate::execution::ExecutableSchema;
use crate::graphql;

const GRAPHQL_RESPONSE: &str = "application/graphql-response+json, application/json";

/// Posts delegated operations to a remote GraphQL endpoint.
///
/// Responses with a non-success status are still read as GraphQL responses when their body
/// is one. Any other failure of the exchange is returned as an error.
#[derive(Clone, Debug)]
pub struct HttpDelegate {
    client: reqwest::Client,
    url: Arc<Url>,
}

impl HttpDelegate {
    pub fn new(configuration: &HttpDelegateConfig) -> Result<Self, ConfigurationError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(GRAPHQL_RESPONSE));
        for (name, value) in &configuration.headers {
            let name = HeaderName::try_from(name.as_str()).map_err(|error| {
                ConfigurationError::InvalidConfiguration {
                    message: "http.headers: invalid header name",
                    error: error.to_string(),
                }
            })?;
            let value = HeaderValue::try_from(value.as_str()).map_err(|error| {
                ConfigurationError::InvalidConfiguration {
                    message: "http.headers: invalid header value",
                    error: error.to_string(),
                }
            })?;
            headers.insert(name, value);
        }

        let mut builder = reqwest::Client::builder()
            .default_headers(headers)
            .tcp_keepalive(Some(std::time::Duration::from_secs(5)));
        if let Some(timeout) = configuration.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|error| ConfigurationError::InvalidConfiguration {
                message: "could not create the http client",
                error: error.to_string(),
            })?;
        Ok(Self {
            client,
            url: Arc::new(configuration.url.clone()),
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait::async_trait]
impl Delegate for HttpDelegate {
    async fn delegate(
        &self,
        _schema: Arc<ExecutableSchema>,
        request: DelegatedRequest,
    ) -> Result<graphql::Response, BoxError> {
        let body = serde_json::to_vec(&request.to_graphql_request())?;
        tracing::debug!(url = %self.url, "posting delegated operation");
        let response = self
            .client
            .post(self.url.as_str())
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;
        let status = response.status();
        let body: Bytes = response.bytes().await?;
        tracing::trace!(%status, "delegated operation response");

        match graphql::Response::from_bytes(body) {
            Ok(response) => Ok(response),
            Err(error) if status.is_success() => Err(error.into()),
            Err(_) => Err(format!("delegate endpoint responded with status {status}").into()),
        }
    }
}
