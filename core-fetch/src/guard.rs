//! Outbound fetch guard.
//!
//! [`GuardedHttpClient`] decorates any [`HttpClient`] and refuses requests
//! whose target host is, or resolves to, a non-public address. The check runs
//! before the inner client sees the request, so a refused fetch never opens a
//! connection.

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    http::{BodyLimit, HttpClient, HttpRequest, HttpResponse, RetryPolicy},
    net::{is_blocked_address, HostResolver},
};
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use core_runtime::logging::redact_url;
use tracing::{debug, warn};
use url::{Host, Url};

/// [`HttpClient`] that enforces the outbound address policy.
#[derive(Clone)]
pub struct GuardedHttpClient {
    inner: Arc<dyn HttpClient>,
    resolver: Arc<dyn HostResolver>,
    timeout: Option<Duration>,
}

impl GuardedHttpClient {
    pub fn new(inner: Arc<dyn HttpClient>, resolver: Arc<dyn HostResolver>) -> Self {
        Self {
            inner,
            resolver,
            timeout: None,
        }
    }

    /// Bound every request that does not carry its own timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Validate `url` against the address policy without fetching it.
    pub async fn check_url(&self, url: &str) -> Result<()> {
        let parsed = Url::parse(url)
            .map_err(|e| BridgeError::BlockedTarget(format!("invalid URL '{}': {}", url, e)))?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(BridgeError::BlockedTarget(format!(
                "scheme '{}' is not allowed",
                parsed.scheme()
            )));
        }

        let addrs = match parsed.host() {
            Some(Host::Ipv4(v4)) => vec![IpAddr::V4(v4)],
            Some(Host::Ipv6(v6)) => vec![IpAddr::V6(v6)],
            Some(Host::Domain(domain)) => self.resolver.resolve(domain).await?,
            None => {
                return Err(BridgeError::BlockedTarget(format!("{} has no host", url)));
            }
        };

        let host = parsed.host_str().unwrap_or_default();
        if addrs.is_empty() {
            warn!(host, "Refusing fetch: host resolved to no addresses");
            return Err(BridgeError::BlockedTarget(format!(
                "{} resolved to no addresses",
                host
            )));
        }
        if let Some(addr) = addrs.iter().copied().find(|addr| is_blocked_address(*addr)) {
            warn!(host, address = %addr, "Refusing fetch to non-public address");
            return Err(BridgeError::BlockedTarget(format!(
                "{} resolves to non-public address {}",
                host, addr
            )));
        }

        debug!(host, addresses = addrs.len(), "Outbound target allowed");
        Ok(())
    }

    fn prepare(&self, mut request: HttpRequest) -> HttpRequest {
        if request.timeout.is_none() {
            request.timeout = self.timeout;
        }
        request
    }

    async fn bounded<F>(&self, timeout: Option<Duration>, url: &str, call: F) -> Result<HttpResponse>
    where
        F: std::future::Future<Output = Result<HttpResponse>> + Send,
    {
        match timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| BridgeError::Timeout(format!("{} after {:?}", redact_url(url), limit)))?,
            None => call.await,
        }
    }
}

#[async_trait]
impl HttpClient for GuardedHttpClient {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.check_url(&request.url).await?;
        let request = self.prepare(request);
        let (timeout, limit, url) = (request.timeout, request.body_limit, request.url.clone());
        debug!(url = %redact_url(&url), method = ?request.method, "Outbound request");
        let response = self.bounded(timeout, &url, self.inner.execute(request)).await?;
        limit_body(response, limit)
    }

    async fn execute_with_retry(
        &self,
        request: HttpRequest,
        policy: RetryPolicy,
    ) -> Result<HttpResponse> {
        self.check_url(&request.url).await?;
        let request = self.prepare(request);
        let (timeout, limit, url) = (request.timeout, request.body_limit, request.url.clone());
        let response = self
            .bounded(timeout, &url, self.inner.execute_with_retry(request, policy))
            .await?;
        limit_body(response, limit)
    }
}

/// Transports that cannot stream hand back the whole body; hold them to the
/// same bound.
fn limit_body(mut response: HttpResponse, limit: Option<BodyLimit>) -> Result<HttpResponse> {
    if let Some(limit) = limit {
        response.body = limit.apply(response.body)?;
    }
    Ok(response)
}

/// Fixed host table, for tests and hosts that pin DNS answers.
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    entries: HashMap<String, Vec<IpAddr>>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_host(mut self, host: impl Into<String>, addrs: &[IpAddr]) -> Self {
        self.entries
            .insert(host.into().to_ascii_lowercase(), addrs.to_vec());
        self
    }
}

#[async_trait]
impl HostResolver for StaticResolver {
    async fn resolve(&self, host: &str) -> Result<Vec<IpAddr>> {
        Ok(self
            .entries
            .get(&host.to_ascii_lowercase())
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::mock;

    mock! {
        pub Transport {}

        #[async_trait]
        impl HttpClient for Transport {
            async fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;
        }
    }

    fn guard(inner: MockTransport, resolver: StaticResolver) -> GuardedHttpClient {
        GuardedHttpClient::new(Arc::new(inner), Arc::new(resolver))
    }

    #[tokio::test]
    async fn test_blocked_literals_never_reach_transport() {
        let mut inner = MockTransport::new();
        inner.expect_execute().never();
        let client = guard(inner, StaticResolver::new());

        for url in [
            "http://127.0.0.1/a.png",
            "http://[::1]/a.png",
            "http://10.0.0.8/a.png",
            "http://172.16.4.4/a.png",
            "http://192.168.0.10/a.png",
            "http://169.254.169.254/latest/meta-data",
            "http://0.0.0.0:8080/",
        ] {
            let err = client.execute(HttpRequest::get(url)).await.unwrap_err();
            assert!(err.is_blocked_target(), "{url} should be blocked");
        }
    }

    #[tokio::test]
    async fn test_non_http_schemes_are_blocked() {
        let mut inner = MockTransport::new();
        inner.expect_execute().never();
        let client = guard(inner, StaticResolver::new());

        for url in ["file:///etc/passwd", "ftp://example.com/x", "not a url"] {
            let err = client.check_url(url).await.unwrap_err();
            assert!(err.is_blocked_target());
        }
    }

    #[tokio::test]
    async fn test_domain_resolving_to_private_address_is_blocked() {
        let mut inner = MockTransport::new();
        inner.expect_execute().never();
        let resolver = StaticResolver::new().with_host(
            "img.example.com",
            &["93.184.216.34".parse().unwrap(), "10.1.2.3".parse().unwrap()],
        );
        let client = guard(inner, resolver);

        let err = client
            .execute(HttpRequest::get("https://img.example.com/a.jpg"))
            .await
            .unwrap_err();
        assert!(err.is_blocked_target());
    }

    #[tokio::test]
    async fn test_unresolvable_host_is_blocked() {
        let mut inner = MockTransport::new();
        inner.expect_execute().never();
        let client = guard(inner, StaticResolver::new());

        let err = client
            .execute(HttpRequest::get("https://nowhere.invalid/a.jpg"))
            .await
            .unwrap_err();
        assert!(err.is_blocked_target());
    }

    #[tokio::test]
    async fn test_public_target_passes_through_unchanged() {
        let mut inner = MockTransport::new();
        inner
            .expect_execute()
            .withf(|req| {
                req.url == "https://assets.fanart.tv/a.jpg"
                    && req.headers.get("Range").map(String::as_str) == Some("bytes=0-9")
            })
            .times(1)
            .returning(|_| Ok(HttpResponse::new(206, "0123456789")));
        let resolver = StaticResolver::new()
            .with_host("assets.fanart.tv", &["93.184.216.34".parse().unwrap()]);
        let client = guard(inner, resolver);

        let response = client
            .execute(HttpRequest::get("https://assets.fanart.tv/a.jpg").range_prefix(10))
            .await
            .unwrap();
        assert_eq!(response.status, 206);
        assert_eq!(&response.body[..], b"0123456789");
    }

    fn public_guard(inner: MockTransport) -> GuardedHttpClient {
        let resolver = StaticResolver::new()
            .with_host("assets.fanart.tv", &["93.184.216.34".parse().unwrap()]);
        guard(inner, resolver)
    }

    #[tokio::test]
    async fn test_prefix_is_cut_when_range_is_ignored() {
        let mut inner = MockTransport::new();
        inner
            .expect_execute()
            .returning(|_| Ok(HttpResponse::new(200, vec![7u8; 4096])));
        let client = public_guard(inner);

        let response = client
            .execute(HttpRequest::get("https://assets.fanart.tv/a.jpg").range_prefix(16))
            .await
            .unwrap();
        assert_eq!(response.body.len(), 16);
    }

    #[tokio::test]
    async fn test_oversized_body_is_rejected() {
        let mut inner = MockTransport::new();
        inner
            .expect_execute()
            .returning(|_| Ok(HttpResponse::new(200, vec![0u8; 2048])));
        let client = public_guard(inner);

        let err = client
            .execute(HttpRequest::get("https://assets.fanart.tv/a.jpg").max_body(1024))
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::BodyTooLarge { size: 2048, limit: 1024 }));
    }

    /// Transport whose retry loop never finishes.
    struct StalledRetries;

    #[async_trait]
    impl HttpClient for StalledRetries {
        async fn execute(&self, _request: HttpRequest) -> Result<HttpResponse> {
            Ok(HttpResponse::new(200, ""))
        }

        async fn execute_with_retry(
            &self,
            _request: HttpRequest,
            _policy: RetryPolicy,
        ) -> Result<HttpResponse> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_covers_the_retry_loop() {
        let resolver = StaticResolver::new()
            .with_host("assets.fanart.tv", &["93.184.216.34".parse().unwrap()]);
        let client = GuardedHttpClient::new(Arc::new(StalledRetries), Arc::new(resolver))
            .with_timeout(Duration::from_secs(1));

        let err = client
            .execute_with_retry(
                HttpRequest::get("https://assets.fanart.tv/a.jpg"),
                RetryPolicy::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_default_timeout_is_applied() {
        let mut inner = MockTransport::new();
        inner
            .expect_execute()
            .withf(|req| req.timeout == Some(Duration::from_secs(7)))
            .returning(|_| Ok(HttpResponse::new(200, "")));
        let client = guard(inner, StaticResolver::new()).with_timeout(Duration::from_secs(7));

        client
            .execute(HttpRequest::get("http://93.184.216.34/"))
            .await
            .unwrap();
    }
}
