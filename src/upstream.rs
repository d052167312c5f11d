//! Client for the third-party item-search API.
//!
//! One [`UpstreamClient::fetch`] call makes up to `max_attempts` sequential
//! requests. The first 2xx answer is parsed, sanitized into products,
//! appended to the result store as one batch, and returned. Non-2xx answers,
//! transport failures, and per-attempt timeouts are logged and retried after
//! a fixed delay.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::error::Error;
use crate::logging::RequestLog;
use crate::product::{ProductSanitizer, SearchPayload};
use crate::store::ResultStore;
use crate::{Product, Secret, Verified};

/// Default number of items requested per search.
pub const DEFAULT_RESULT_LIMIT: u32 = 10;

/// How many times to try the upstream and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. At least 1.
    pub max_attempts: u32,
    /// Fixed wait between two attempts.
    pub delay: Duration,
    /// Deadline for a single attempt; `None` leaves it to the transport.
    pub attempt_timeout: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(2),
            attempt_timeout: None,
        }
    }
}

/// One outbound search request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamRequest {
    /// Sanitized query text.
    pub query: String,
    /// Maximum number of items to return.
    pub limit: u32,
}

/// Raw upstream answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body.
    pub body: Vec<u8>,
}

impl UpstreamResponse {
    /// Returns `true` for a 2xx status.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Transport-level failure of one attempt.
#[derive(Debug, Error)]
#[error("transport error: {0}")]
pub struct TransportError(String);

impl TransportError {
    /// Creates a transport error with the given description.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        // Strip the URL: it carries the query string.
        Self(e.without_url().to_string())
    }
}

/// Sends one request to the upstream search API.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Performs a single attempt.
    ///
    /// # Errors
    ///
    /// Returns `TransportError` when no HTTP response was obtained.
    async fn send(&self, request: &UpstreamRequest) -> Result<UpstreamResponse, TransportError>;
}

/// `reqwest`-backed transport issuing
/// `GET <endpoint>?q=<query>&limit=<limit>` with a bearer credential.
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
    api_key: Secret<String>,
}

impl HttpTransport {
    /// Creates a transport for `endpoint` authenticating with `api_key`.
    ///
    /// # Errors
    ///
    /// Returns `TransportError` if the HTTP client cannot be built.
    pub fn new(endpoint: impl Into<String>, api_key: Secret<String>) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key,
        })
    }

    /// Returns the endpoint requests are sent to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTransport")
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key)
            .finish()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &UpstreamRequest) -> Result<UpstreamResponse, TransportError> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("q", request.query.as_str())])
            .query(&[("limit", request.limit)])
            .bearer_auth(self.api_key.expose_secret())
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.bytes().await?.to_vec();

        Ok(UpstreamResponse { status, body })
    }
}

/// Fetches, sanitizes, and persists search results.
pub struct UpstreamClient {
    transport: Arc<dyn Transport>,
    store: Arc<dyn ResultStore>,
    products: ProductSanitizer,
    retry: RetryPolicy,
    limit: u32,
}

impl UpstreamClient {
    /// Creates a client with the default retry policy and result limit.
    pub fn new(transport: Arc<dyn Transport>, store: Arc<dyn ResultStore>) -> Self {
        Self {
            transport,
            store,
            products: ProductSanitizer::new(),
            retry: RetryPolicy::default(),
            limit: DEFAULT_RESULT_LIMIT,
        }
    }

    /// Replaces the retry policy. `max_attempts` is raised to at least 1.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = RetryPolicy {
            max_attempts: retry.max_attempts.max(1),
            ..retry
        };
        self
    }

    /// Replaces the number of items requested per search.
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    /// Returns the active retry policy.
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Searches the upstream for `query`.
    ///
    /// # Errors
    ///
    /// - [`Error::UpstreamExhausted`] when every attempt failed
    /// - [`Error::UpstreamMalformed`] when a 2xx body has the wrong shape
    /// - [`Error::Storage`] when the batch could not be persisted
    pub async fn fetch(
        &self,
        query: &Verified<String>,
        log: &RequestLog<'_>,
    ) -> Result<Vec<Product>, Error> {
        let request = UpstreamRequest {
            query: query.as_ref().clone(),
            limit: self.limit,
        };
        let max_attempts = self.retry.max_attempts;

        for attempt in 1..=max_attempts {
            match self.attempt(&request).await {
                Ok(response) if response.is_success() => {
                    let products = self.ingest(&response.body).await?;
                    log.info(format_args!(
                        "upstream returned {} items on attempt {}/{}",
                        products.len(),
                        attempt,
                        max_attempts
                    ));
                    return Ok(products);
                }
                Ok(response) => log.warn(format_args!(
                    "upstream returned status {} on attempt {}/{}",
                    response.status, attempt, max_attempts
                )),
                Err(e) => log.warn(format_args!(
                    "upstream request failed on attempt {}/{}: {}",
                    attempt, max_attempts, e
                )),
            }

            if attempt < max_attempts {
                tokio::time::sleep(self.retry.delay).await;
            }
        }

        log.error(format_args!(
            "upstream unavailable after {} attempts",
            max_attempts
        ));
        Err(Error::UpstreamExhausted)
    }

    async fn attempt(&self, request: &UpstreamRequest) -> Result<UpstreamResponse, TransportError> {
        match self.retry.attempt_timeout {
            Some(deadline) => tokio::time::timeout(deadline, self.transport.send(request))
                .await
                .map_err(|_| TransportError::new(format!("timed out after {deadline:?}")))?,
            None => self.transport.send(request).await,
        }
    }

    async fn ingest(&self, body: &[u8]) -> Result<Vec<Product>, Error> {
        let payload: SearchPayload =
            serde_json::from_slice(body).map_err(|e| Error::UpstreamMalformed(e.to_string()))?;

        let batch = payload
            .item_summaries
            .into_iter()
            .map(|item| self.products.sanitize_item(item))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| Error::UpstreamMalformed(e.to_string()))?;

        self.store.append(&batch).await?;

        Ok(batch.into_iter().map(Verified::into_inner).collect())
    }
}

impl fmt::Debug for UpstreamClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpstreamClient")
            .field("retry", &self.retry)
            .field("limit", &self.limit)
            .finish_non_exhaustive()
    }
}
