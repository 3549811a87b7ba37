//! Retry-aware HTTP request execution.

use rand::Rng;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, Response, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::Identity;

/// Production catalog domain.
pub const DEFAULT_DOMAIN: &str = "https://www.eodms-sgdot.nrcan-rncan.gc.ca";

/// Catalog queried when none is specified.
pub const DEFAULT_CATALOG: &str = "EODMS";

/// Catalog deployment to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    /// The public production service.
    #[default]
    Prod,
    /// Staging; the domain comes from the `DOMAIN` environment variable when set.
    Staging,
}

/// Configuration for catalog requests.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the catalog service.
    pub domain: String,
    /// Catalog name used in item URLs.
    pub catalog: String,
    /// Request timeout.
    pub timeout: Duration,
    /// Connection timeout (separate from request timeout).
    pub connect_timeout: Duration,
    /// User agent string.
    pub user_agent: String,
    /// Retry policy for item requests.
    pub retry: RetryPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            domain: DEFAULT_DOMAIN.to_string(),
            catalog: DEFAULT_CATALOG.to_string(),
            timeout: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(10),
            user_agent: format!("dds/{}", env!("CARGO_PKG_VERSION")),
            retry: RetryPolicy::default(),
        }
    }
}

impl ClientConfig {
    /// Creates a configuration for the given deployment.
    #[must_use]
    pub fn for_environment(environment: Environment) -> Self {
        let mut config = Self::default();
        if environment == Environment::Staging {
            if let Some(domain) = std::env::var("DOMAIN").ok().filter(|d| !d.is_empty()) {
                config.domain = domain;
            }
        }
        config
    }

    /// Builds an HTTP client from this configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn http_client(&self) -> Result<Client, reqwest::Error> {
        Client::builder()
            .timeout(self.timeout)
            .connect_timeout(self.connect_timeout)
            .tcp_keepalive(Duration::from_secs(60))
            .user_agent(&self.user_agent)
            .gzip(true)
            .build()
    }
}

/// Errors that escape the retry loop.
///
/// HTTP-level failures are never errors; the executor hands back the last
/// response instead.
#[derive(Error, Debug)]
pub enum FetchError {
    /// Transport failure (DNS, connect, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The identity collaborator could not supply credentials.
    #[error("Authentication error: {0}")]
    Auth(String),

    /// A header value could not be built (e.g., token with invalid characters).
    #[error("Invalid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),
}

/// Jittered exponential backoff settings for a single request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first.
    pub max_retries: u32,
    /// Delay before the first retry; doubles on each further attempt.
    pub backoff_factor: Duration,
    /// Upper bound for the computed (pre-jitter) delay.
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            backoff_factor: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Creates a retry policy.
    #[must_use]
    pub const fn new(max_retries: u32, backoff_factor: Duration, max_backoff: Duration) -> Self {
        Self {
            max_retries,
            backoff_factor,
            max_backoff,
        }
    }

    /// Returns true for statuses worth retrying: 429 and any 5xx.
    #[must_use]
    pub fn is_retryable(status: StatusCode) -> bool {
        status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
    }

    /// Pre-jitter delay after the given (1-based) attempt:
    /// `min(max_backoff, backoff_factor * 2^(attempt - 1))`.
    #[must_use]
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(62) as i32;
        let secs = self.backoff_factor.as_secs_f64() * 2f64.powi(exponent);
        Duration::try_from_secs_f64(secs).map_or(self.max_backoff, |d| d.min(self.max_backoff))
    }

    /// Pre-jitter delay for a retryable response.
    ///
    /// A `Retry-After` value on a 429 is honoured exactly.
    #[must_use]
    pub fn delay_for(
        &self,
        status: StatusCode,
        retry_after: Option<Duration>,
        attempt: u32,
    ) -> Duration {
        match retry_after {
            Some(delay) if status == StatusCode::TOO_MANY_REQUESTS => delay,
            _ => self.base_delay(attempt),
        }
    }
}

/// Scales a delay by a uniform random factor in `[0.5, 1.0]`.
#[must_use]
pub fn jittered(delay: Duration) -> Duration {
    let factor: f64 = rand::thread_rng().gen_range(0.5..=1.0);
    delay.mul_f64(factor)
}

/// Reads a `Retry-After` header expressed in seconds.
#[must_use]
pub fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<f64>().ok())
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
}

/// Issues authenticated GETs, retrying rate-limited and server-error responses.
#[derive(Debug, Clone)]
pub struct RequestExecutor {
    identity: Arc<dyn Identity>,
    policy: RetryPolicy,
}

impl RequestExecutor {
    /// Creates an executor over the given identity collaborator.
    #[must_use]
    pub fn new(identity: Arc<dyn Identity>, policy: RetryPolicy) -> Self {
        Self { identity, policy }
    }

    /// Returns the identity collaborator.
    #[must_use]
    pub fn identity(&self) -> &dyn Identity {
        self.identity.as_ref()
    }

    /// Returns the retry policy.
    #[must_use]
    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Performs a GET with this executor's retry policy.
    ///
    /// # Errors
    ///
    /// Returns an error only for transport failures.
    pub async fn execute(&self, url: &str, headers: &HeaderMap) -> Result<Response, FetchError> {
        self.execute_with(url, headers, &self.policy).await
    }

    /// Performs a GET with an explicit retry policy.
    ///
    /// 200 and 202 return immediately. 429 and 5xx are retried while attempts
    /// remain; any other response, or the last failing one, is returned as is.
    ///
    /// # Errors
    ///
    /// Returns an error only for transport failures.
    pub async fn execute_with(
        &self,
        url: &str,
        headers: &HeaderMap,
        policy: &RetryPolicy,
    ) -> Result<Response, FetchError> {
        let mut attempt = 1;

        loop {
            let response = self.identity.get(url, headers).await?;
            let status = response.status();

            if status == StatusCode::OK || status == StatusCode::ACCEPTED {
                return Ok(response);
            }

            if RetryPolicy::is_retryable(status) && attempt < policy.max_retries {
                let delay = jittered(policy.delay_for(
                    status,
                    retry_after(response.headers()),
                    attempt,
                ));
                debug!(
                    url,
                    attempt,
                    status = status.as_u16(),
                    delay_ms = delay.as_millis() as u64,
                    "Retrying request"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
                continue;
            }

            return Ok(response);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BearerIdentity;
    use reqwest::header::HeaderValue;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy::new(
            max_retries,
            Duration::from_millis(1),
            Duration::from_millis(5),
        )
    }

    fn executor(policy: RetryPolicy) -> RequestExecutor {
        let identity = BearerIdentity::new(Client::new(), "token");
        RequestExecutor::new(Arc::new(identity), policy)
    }

    #[test]
    fn test_retry_policy_default() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 5);
        assert_eq!(policy.backoff_factor, Duration::from_secs(1));
        assert_eq!(policy.max_backoff, Duration::from_secs(30));
    }

    #[test]
    fn test_client_config_default() {
        let config = ClientConfig::default();
        assert_eq!(config.domain, DEFAULT_DOMAIN);
        assert_eq!(config.catalog, "EODMS");
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert!(config.user_agent.starts_with("dds/"));
    }

    #[test]
    fn test_base_delay_doubles_then_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.base_delay(1), Duration::from_secs(1));
        assert_eq!(policy.base_delay(2), Duration::from_secs(2));
        assert_eq!(policy.base_delay(3), Duration::from_secs(4));
        assert_eq!(policy.base_delay(5), Duration::from_secs(16));
        assert_eq!(policy.base_delay(6), Duration::from_secs(30));
        assert_eq!(policy.base_delay(200), Duration::from_secs(30));
    }

    #[test]
    fn test_base_delay_monotonic() {
        let policy = RetryPolicy::new(50, Duration::from_millis(250), Duration::from_secs(20));
        let delays: Vec<_> = (1..=50).map(|a| policy.base_delay(a)).collect();
        assert!(delays.windows(2).all(|w| w[0] <= w[1]));
        assert!(delays.iter().all(|d| *d <= policy.max_backoff));
    }

    #[test]
    fn test_retry_after_only_for_429() {
        let policy = RetryPolicy::default();
        let hint = Some(Duration::from_secs(7));
        assert_eq!(
            policy.delay_for(StatusCode::TOO_MANY_REQUESTS, hint, 1),
            Duration::from_secs(7)
        );
        assert_eq!(
            policy.delay_for(StatusCode::SERVICE_UNAVAILABLE, hint, 1),
            Duration::from_secs(1)
        );
        assert_eq!(
            policy.delay_for(StatusCode::TOO_MANY_REQUESTS, None, 3),
            Duration::from_secs(4)
        );
    }

    #[test]
    fn test_retry_after_header_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(retry_after(&headers), None);

        headers.insert(RETRY_AFTER, HeaderValue::from_static("3"));
        assert_eq!(retry_after(&headers), Some(Duration::from_secs(3)));

        headers.insert(RETRY_AFTER, HeaderValue::from_static("1.5"));
        assert_eq!(retry_after(&headers), Some(Duration::from_millis(1500)));

        headers.insert(
            RETRY_AFTER,
            HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"),
        );
        assert_eq!(retry_after(&headers), None);
    }

    #[test]
    fn test_jitter_range() {
        let delay = Duration::from_secs(10);
        for _ in 0..100 {
            let j = jittered(delay);
            assert!(j >= Duration::from_secs(5));
            assert!(j <= delay);
        }
    }

    #[test]
    fn test_retryable_statuses() {
        assert!(RetryPolicy::is_retryable(StatusCode::TOO_MANY_REQUESTS));
        assert!(RetryPolicy::is_retryable(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(RetryPolicy::is_retryable(StatusCode::BAD_GATEWAY));
        assert!(!RetryPolicy::is_retryable(StatusCode::NOT_FOUND));
        assert!(!RetryPolicy::is_retryable(StatusCode::UNAUTHORIZED));
    }

    #[tokio::test]
    async fn test_execute_recovers_after_server_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/item"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(4)
            .expect(4)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/item"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let response = executor(fast_policy(5))
            .execute(&format!("{}/item", server.uri()), &HeaderMap::new())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_execute_returns_last_failure_when_exhausted() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&server)
            .await;

        let response = executor(fast_policy(3))
            .execute(&format!("{}/item", server.uri()), &HeaderMap::new())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_execute_does_not_retry_client_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let response = executor(fast_policy(5))
            .execute(&format!("{}/item", server.uri()), &HeaderMap::new())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_execute_accepts_202() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;

        let response = executor(fast_policy(5))
            .execute(&format!("{}/item", server.uri()), &HeaderMap::new())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }

    #[tokio::test]
    async fn test_execute_honours_retry_after() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        // A large backoff factor would stall the test if Retry-After were ignored.
        let policy = RetryPolicy::new(2, Duration::from_secs(600), Duration::from_secs(600));
        let response = executor(policy)
            .execute(&format!("{}/item", server.uri()), &HeaderMap::new())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_transport_error_propagates() {
        // Nothing listens on port 9 of localhost in the test environment.
        let result = executor(fast_policy(3))
            .execute("http://127.0.0.1:9/item", &HeaderMap::new())
            .await;
        assert!(matches!(result, Err(FetchError::Http(_))));
    }
}
