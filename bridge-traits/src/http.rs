//! HTTP Client Abstraction
//!
//! Async request/response types shared by provider adapters, the outbound
//! fetch guard and host transports.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::time::Duration;

use crate::error::{BridgeError, Result};

/// HTTP method types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Head,
}

/// Bound on how much of a response body a transport buffers.
///
/// Transports that can stream stop reading as soon as the bound is reached;
/// the rest of the body is never pulled off the socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyLimit {
    /// Keep the first `n` bytes and stop reading.
    Truncate(u64),
    /// Fail with [`BridgeError::BodyTooLarge`] once more than `n` bytes arrive.
    Reject(u64),
}

impl BodyLimit {
    pub fn bytes(&self) -> u64 {
        match *self {
            BodyLimit::Truncate(n) | BodyLimit::Reject(n) => n,
        }
    }

    /// Enforce the limit on a body that is already buffered.
    pub fn apply(&self, body: Bytes) -> Result<Bytes> {
        let size = body.len() as u64;
        match *self {
            BodyLimit::Truncate(n) if size > n => Ok(body.slice(..n as usize)),
            BodyLimit::Reject(limit) if size > limit => {
                Err(BridgeError::BodyTooLarge { size, limit })
            }
            _ => Ok(body),
        }
    }
}

/// HTTP request builder
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub timeout: Option<Duration>,
    pub body_limit: Option<BodyLimit>,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HashMap::new(),
            timeout: None,
            body_limit: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, url)
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Request only the first `len` bytes of the resource. Servers that
    /// ignore `Range` are cut off after `len` bytes.
    pub fn range_prefix(self, len: usize) -> Self {
        let end = len.saturating_sub(1);
        let mut request = self.header("Range", format!("bytes=0-{}", end));
        request.body_limit = Some(BodyLimit::Truncate(len as u64));
        request
    }

    /// Fail instead of buffering more than `bytes` of response body.
    pub fn max_body(mut self, bytes: u64) -> Self {
        self.body_limit = Some(BodyLimit::Reject(bytes));
        self
    }

    pub fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }
}

/// HTTP response
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Content type without parameters, lowercased.
    pub fn content_type(&self) -> Option<String> {
        self.header("content-type").map(|value| {
            value
                .split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .to_ascii_lowercase()
        })
    }

    pub fn content_length(&self) -> Option<u64> {
        self.header("content-length")
            .and_then(|value| value.trim().parse().ok())
    }

    /// Check if response status is successful (2xx)
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Retry policy configuration
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts
    pub max_attempts: u32,
    /// Base delay between retries
    pub base_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// No retries at all.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Exponential backoff for the given (1-based) attempt.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Async HTTP client trait
///
/// Provider adapters and the image paths talk to the network only through
/// this trait, so a host (or a test) can swap the transport and the outbound
/// fetch guard can wrap it.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::http::{HttpClient, HttpRequest};
///
/// async fn fetch(client: &dyn HttpClient) -> Result<Bytes> {
///     let response = client.execute(HttpRequest::get("https://musicbrainz.org/ws/2/")).await?;
///     Ok(response.body)
/// }
/// ```
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Execute an HTTP request
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The target is refused by an outbound guard
    /// - Network connection fails
    /// - Request times out
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;

    /// Execute an HTTP request with custom retry policy
    async fn execute_with_retry(
        &self,
        request: HttpRequest,
        policy: RetryPolicy,
    ) -> Result<HttpResponse> {
        let _ = policy;
        self.execute(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_request_builder() {
        let request = HttpRequest::get("https://example.com/a.jpg")
            .header("User-Agent", "test")
            .range_prefix(65536)
            .timeout(Duration::from_secs(10));

        assert_eq!(request.method, HttpMethod::Get);
        assert_eq!(request.url, "https://example.com/a.jpg");
        assert_eq!(
            request.headers.get("Range"),
            Some(&"bytes=0-65535".to_string())
        );
        assert_eq!(request.timeout, Some(Duration::from_secs(10)));
        assert_eq!(request.body_limit, Some(BodyLimit::Truncate(65536)));
    }

    #[test]
    fn test_body_limit_truncates_or_rejects() {
        let body = Bytes::from_static(b"0123456789");

        let cut = BodyLimit::Truncate(4).apply(body.clone()).unwrap();
        assert_eq!(&cut[..], b"0123");
        assert_eq!(BodyLimit::Truncate(64).apply(body.clone()).unwrap(), body);

        assert!(matches!(
            BodyLimit::Reject(4).apply(body.clone()),
            Err(BridgeError::BodyTooLarge { size: 10, limit: 4 })
        ));
        assert_eq!(BodyLimit::Reject(10).apply(body.clone()).unwrap(), body);
        assert_eq!(HttpRequest::get("https://x").max_body(10).body_limit, Some(BodyLimit::Reject(10)));
    }

    #[test]
    fn test_response_headers_are_case_insensitive() {
        let response = HttpResponse::new(200, "x")
            .with_header("Content-Type", "image/JPEG; charset=binary")
            .with_header("Content-Length", "1024");

        assert!(response.is_success());
        assert_eq!(response.content_type().as_deref(), Some("image/jpeg"));
        assert_eq!(response.content_length(), Some(1024));
        assert!(response.header("x-missing").is_none());
    }

    #[test]
    fn test_retry_backoff_is_capped() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for(2), Duration::from_millis(400));
        assert_eq!(policy.delay_for(20), Duration::from_secs(10));
    }
}
