use crate::config::FetchConfig;
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while fetching the target page.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// A single attempt exceeded the configured timeout
    #[error("Request timed out")]
    Timeout,
    /// Every attempt failed with a connection error or timeout
    #[error("Gave up after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: Box<FetchError>,
    },
    /// Response body exceeded the configured size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// A configured request header could not be sent
    #[error("Invalid request header: {0}")]
    InvalidHeader(String),
}

/// How often, how long and how patiently to retry a page fetch.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Bound on one attempt: connect, send and full body read.
    pub attempt_timeout: Duration,
    /// Delay before the first retry after a connection error.
    pub connect_backoff: Duration,
    /// Delay before the first retry after a timeout.
    pub timeout_backoff: Duration,
    pub max_page_bytes: usize,
}

impl From<&FetchConfig> for RetryPolicy {
    fn from(config: &FetchConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            attempt_timeout: config.timeout(),
            connect_backoff: config.connect_backoff(),
            timeout_backoff: config.timeout_backoff(),
            max_page_bytes: config.max_page_bytes,
        }
    }
}

/// Retrieves page HTML with browser-like headers and backoff on transient failures.
///
/// Connection errors and timeouts are retried, with the delay doubling after
/// each failed attempt. HTTP error statuses and oversized responses fail
/// immediately; retrying them would only repeat the same answer.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: reqwest::Client,
    policy: RetryPolicy,
}

impl Fetcher {
    /// Builds a fetcher whose client sends the configured headers on every request.
    pub fn new(config: &FetchConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .default_headers(default_headers(config)?)
            .build()?;
        Ok(Self::with_client(client, RetryPolicy::from(config)))
    }

    /// Uses a caller-configured client as-is.
    pub fn with_client(client: reqwest::Client, policy: RetryPolicy) -> Self {
        Self { client, policy }
    }

    /// Fetches `url` and returns its body decoded as UTF-8.
    ///
    /// Invalid UTF-8 sequences are replaced rather than rejected; the
    /// extractor only needs the markup to be roughly right.
    ///
    /// # Errors
    ///
    /// - [`FetchError::HttpStatus`] - Non-2xx response, not retried
    /// - [`FetchError::ResponseTooLarge`] - Body exceeded `max_page_bytes`, not retried
    /// - [`FetchError::RetriesExhausted`] - Every attempt hit a connection error or timeout
    /// - [`FetchError::Network`] - Any other client error, not retried
    pub async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let bytes = self.retry(url, || self.fetch_once(url)).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Runs `attempt_once` until it succeeds, fails for good, or the policy runs out.
    ///
    /// The delay before retry `n` (1-based) is `base * 2^(n-1)`, where `base`
    /// depends on whether the failure was a timeout or a connection error.
    async fn retry<F, Fut>(&self, url: &str, mut attempt_once: F) -> Result<Vec<u8>, FetchError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Vec<u8>, FetchError>>,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            tracing::info!(url = %url, attempt, max_attempts, "Fetching page");

            let err = match attempt_once().await {
                Ok(bytes) => {
                    tracing::info!(url = %url, bytes = bytes.len(), attempt, "Fetched page");
                    return Ok(bytes);
                }
                Err(e) => e,
            };

            let Some(base) = self.backoff_base(&err) else {
                tracing::warn!(url = %url, error = %err, "Fetch failed, not retrying");
                return Err(err);
            };

            if attempt >= max_attempts {
                tracing::error!(
                    url = %url,
                    attempts = attempt,
                    error = %err,
                    "Fetch retries exhausted"
                );
                return Err(FetchError::RetriesExhausted {
                    attempts: attempt,
                    last: Box::new(err),
                });
            }

            let delay = base.saturating_mul(2u32.saturating_pow(attempt - 1));
            tracing::warn!(
                url = %url,
                attempt,
                error = %err,
                delay_ms = delay.as_millis() as u64,
                "Transient fetch failure, backing off"
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// One request, bounded by the attempt timeout.
    async fn fetch_once(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let request = async {
            let response = self.client.get(url).send().await?;

            if !response.status().is_success() {
                return Err(FetchError::HttpStatus(response.status().as_u16()));
            }

            let bytes = read_limited_bytes(response, self.policy.max_page_bytes).await?;
            Ok::<_, FetchError>(bytes)
        };

        tokio::time::timeout(self.policy.attempt_timeout, request)
            .await
            .map_err(|_| FetchError::Timeout)?
    }

    /// Backoff base for a retryable error, `None` when the error is final.
    fn backoff_base(&self, err: &FetchError) -> Option<Duration> {
        match err {
            FetchError::Timeout => Some(self.policy.timeout_backoff),
            FetchError::Network(e) if e.is_timeout() => Some(self.policy.timeout_backoff),
            FetchError::Network(e) if e.is_connect() => Some(self.policy.connect_backoff),
            _ => None,
        }
    }
}

fn default_headers(config: &FetchConfig) -> Result<HeaderMap, FetchError> {
    let mut headers = HeaderMap::new();

    for (name, value) in [
        (USER_AGENT, &config.user_agent),
        (ACCEPT, &config.accept),
        (ACCEPT_LANGUAGE, &config.accept_language),
    ] {
        let value = HeaderValue::from_str(value)
            .map_err(|_| FetchError::InvalidHeader(name.as_str().to_string()))?;
        headers.insert(name, value);
    }

    for (name, value) in &config.headers {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| FetchError::InvalidHeader(name.clone()))?;
        let header_value =
            HeaderValue::from_str(value).map_err(|_| FetchError::InvalidHeader(name.clone()))?;
        headers.insert(header_name, header_value);
    }

    Ok(headers)
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    // Fast path: check Content-Length header
    if let Some(len) = response.content_length() {
        if len > limit as u64 {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}
