//! GraphQL transport backend.
//!
//! This module provides the executor that talks to the directory's public
//! GraphQL endpoint over HTTPS.
//!
//! # Requirements
//!
//! - Network access to the configured endpoint
//!
//! # Outcome Classification
//!
//! Each round trip is classified by [`classify_response`]:
//! 1. Non-200 statuses are soft failures (429 and 5xx get their own variants)
//! 2. A 200 whose body is not a JSON object with `data` is malformed (hard)
//! 3. A 200 carrying a non-empty `errors` array is rejected (hard)
//! 4. Anything else is a success and the parsed body is returned

use crate::core::{HarvestError, QueryDescriptor, QueryExecutor};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE, ORIGIN, REFERER, USER_AGENT};
use serde_json::Value;
use std::time::Duration;

/// Default GraphQL endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://www.ratemyprofessors.com/graphql";

const DEFAULT_ORIGIN: &str = "https://www.ratemyprofessors.com";
const DEFAULT_REFERER: &str = "https://www.ratemyprofessors.com/";
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// GraphQL executor configuration.
#[derive(Debug, Clone)]
pub struct GraphQlConfig {
    /// Endpoint URL.
    pub endpoint: String,

    /// Request timeout.
    pub timeout: Duration,

    /// `User-Agent` header value.
    pub user_agent: String,

    /// `Origin` header value.
    pub origin: String,

    /// `Referer` header value.
    pub referer: String,
}

impl Default for GraphQlConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout: Duration::from_secs(30),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            origin: DEFAULT_ORIGIN.to_string(),
            referer: DEFAULT_REFERER.to_string(),
        }
    }
}

impl GraphQlConfig {
    /// Creates a configuration with default headers for the given endpoint.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }

    /// Sets the timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the `User-Agent` header.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Sets the `Origin` header.
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self
    }

    /// Sets the `Referer` header.
    pub fn with_referer(mut self, referer: impl Into<String>) -> Self {
        self.referer = referer.into();
        self
    }

    fn headers(&self) -> Result<HeaderMap, HarvestError> {
        let value = |name: &str, v: &str| {
            HeaderValue::from_str(v)
                .map_err(|e| HarvestError::configuration(format!("invalid {name} header: {e}")))
        };

        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, value("User-Agent", &self.user_agent)?);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ORIGIN, value("Origin", &self.origin)?);
        headers.insert(REFERER, value("Referer", &self.referer)?);
        Ok(headers)
    }
}

/// Executor that POSTs GraphQL queries over HTTP.
///
/// # Example
///
/// ```rust,ignore
/// use roster_harvest::backends::{GraphQlConfig, GraphQlExecutor};
///
/// let executor = GraphQlExecutor::new(GraphQlConfig::default())?;
/// ```
#[derive(Debug)]
pub struct GraphQlExecutor {
    config: GraphQlConfig,
    client: reqwest::Client,
}

impl GraphQlExecutor {
    /// Creates a new executor with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a header value is invalid or the
    /// HTTP client cannot be built.
    pub fn new(config: GraphQlConfig) -> Result<Self, HarvestError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .default_headers(config.headers()?)
            .build()
            .map_err(|e| HarvestError::configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    /// Returns the executor configuration.
    pub fn config(&self) -> &GraphQlConfig {
        &self.config
    }

    fn transport_error(&self, error: reqwest::Error) -> HarvestError {
        if error.is_timeout() {
            HarvestError::timeout(&self.config.endpoint, self.config.timeout)
        } else {
            HarvestError::connection_failed(&self.config.endpoint, error.to_string())
        }
    }
}

#[async_trait]
impl QueryExecutor for GraphQlExecutor {
    fn name(&self) -> &str {
        "graphql"
    }

    async fn execute(&self, query: &QueryDescriptor) -> Result<Value, HarvestError> {
        let response = self
            .client
            .post(&self.config.endpoint)
            .json(&query.to_body())
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs);

        let body = response.text().await.map_err(|e| self.transport_error(e))?;

        tracing::trace!(query = %query.label(), status, bytes = body.len(), "GraphQL response");

        classify_response(&self.config.endpoint, status, &body, retry_after)
    }
}

/// Classifies one HTTP exchange into a success payload or a classified failure.
pub fn classify_response(
    endpoint: &str,
    status: u16,
    body: &str,
    retry_after: Option<Duration>,
) -> Result<Value, HarvestError> {
    if status != 200 {
        return Err(match HarvestError::from_status(endpoint, status) {
            HarvestError::RateLimited { endpoint, .. } => HarvestError::RateLimited {
                endpoint,
                retry_after,
            },
            other => other,
        });
    }

    let payload: Value = serde_json::from_str(body)
        .map_err(|e| HarvestError::malformed(endpoint, format!("body is not JSON: {e}")))?;

    let Some(object) = payload.as_object() else {
        return Err(HarvestError::malformed(endpoint, "body is not a JSON object"));
    };

    if let Some(errors) = object.get("errors") {
        let has_errors = match errors {
            Value::Null => false,
            Value::Array(items) => !items.is_empty(),
            _ => true,
        };
        if has_errors {
            return Err(HarvestError::rejected(endpoint, errors.to_string()));
        }
    }

    if !object.contains_key("data") {
        return Err(HarvestError::malformed(endpoint, "response has no data"));
    }

    Ok(payload)
}
