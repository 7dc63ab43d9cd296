//! HTTP Client Implementation using Reqwest

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    http::{BodyLimit, HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy},
    net::is_blocked_address,
};
use bytes::{Bytes, BytesMut};
use reqwest::{redirect, Client, Url};
use std::collections::HashMap;
use std::error::Error as StdError;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::net::{ip_literal, BlockedAddress, GuardedDnsResolver};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_REDIRECTS: usize = 10;
const DEFAULT_USER_AGENT: &str = concat!("artist-meta/", env!("CARGO_PKG_VERSION"));

/// Reqwest-based HTTP client
///
/// Built with [`ReqwestHttpClient::new`] the client applies the outbound
/// address policy at three points: IP-literal request URLs, every DNS answer
/// used to connect, and every redirect hop.
pub struct ReqwestHttpClient {
    client: Client,
}

impl ReqwestHttpClient {
    /// Guarded client with default timeout and user agent.
    pub fn new() -> Result<Self> {
        Self::with_options(DEFAULT_USER_AGENT, DEFAULT_TIMEOUT)
    }

    /// Guarded client with a custom user agent and overall request timeout.
    pub fn with_options(user_agent: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(CONNECT_TIMEOUT)
            .pool_max_idle_per_host(10)
            .user_agent(user_agent)
            .dns_resolver(Arc::new(GuardedDnsResolver))
            .redirect(guarded_redirect_policy())
            .build()
            .map_err(|e| BridgeError::OperationFailed(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self { client })
    }

    /// Wrap an already configured client. The caller owns its network policy.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    fn convert_method(method: HttpMethod) -> reqwest::Method {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Head => reqwest::Method::HEAD,
        }
    }

    fn build_request(&self, request: &HttpRequest) -> reqwest::RequestBuilder {
        let mut req = self
            .client
            .request(Self::convert_method(request.method), &request.url);

        for (key, value) in &request.headers {
            req = req.header(key, value);
        }
        if let Some(timeout) = request.timeout {
            req = req.timeout(timeout);
        }
        req
    }

    async fn execute_with_retry_internal(
        &self,
        request: HttpRequest,
        policy: RetryPolicy,
    ) -> Result<HttpResponse> {
        reject_blocked_literal(&request.url)?;

        let mut attempt = 0;
        let mut last_error = None;

        while attempt < policy.max_attempts {
            attempt += 1;
            debug!(attempt, max_attempts = policy.max_attempts, url = %request.url, "Executing HTTP request");

            match self.build_request(&request).send().await {
                Ok(response) => {
                    let status = response.status().as_u16();
                    if status >= 500 || status == 429 {
                        warn!(status, attempt, "HTTP request failed with retryable status");
                        last_error = Some(BridgeError::OperationFailed(format!("HTTP {status}")));
                    } else {
                        return read_response(response, request.body_limit).await;
                    }
                }
                Err(e) => {
                    let mapped = map_reqwest_error(e);
                    if matches!(mapped, BridgeError::BlockedTarget(_)) {
                        return Err(mapped);
                    }
                    warn!(error = %mapped, attempt, "HTTP request failed");
                    last_error = Some(mapped);
                }
            }

            if attempt < policy.max_attempts {
                let delay = policy.delay_for(attempt);
                debug!(delay_ms = delay.as_millis() as u64, "Retrying after delay");
                sleep(delay).await;
            }
        }

        Err(last_error.unwrap_or_else(|| {
            BridgeError::OperationFailed("All retry attempts exhausted".to_string())
        }))
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.execute_with_retry_internal(request, RetryPolicy::default())
            .await
    }

    async fn execute_with_retry(
        &self,
        request: HttpRequest,
        policy: RetryPolicy,
    ) -> Result<HttpResponse> {
        self.execute_with_retry_internal(request, policy).await
    }
}

async fn read_response(
    response: reqwest::Response,
    limit: Option<BodyLimit>,
) -> Result<HttpResponse> {
    let status = response.status().as_u16();
    let headers: HashMap<String, String> = response
        .headers()
        .iter()
        .filter_map(|(k, v)| v.to_str().ok().map(|s| (k.to_string(), s.to_string())))
        .collect();
    let body = match limit {
        Some(limit) => read_limited(response, limit).await?,
        None => response.bytes().await.map_err(map_reqwest_error)?,
    };

    Ok(HttpResponse {
        status,
        headers,
        body,
    })
}

/// Pull chunks until the body ends or `limit` is reached. Dropping the
/// response abandons whatever the server has not sent yet.
async fn read_limited(mut response: reqwest::Response, limit: BodyLimit) -> Result<Bytes> {
    let cap = limit.bytes();
    if let (BodyLimit::Reject(_), Some(declared)) = (limit, response.content_length()) {
        if declared > cap {
            return Err(BridgeError::BodyTooLarge {
                size: declared,
                limit: cap,
            });
        }
    }

    let mut body = BytesMut::new();
    while let Some(chunk) = response.chunk().await.map_err(map_reqwest_error)? {
        let room = cap.saturating_sub(body.len() as u64);
        if chunk.len() as u64 > room {
            match limit {
                BodyLimit::Truncate(_) => {
                    body.extend_from_slice(&chunk[..room as usize]);
                    break;
                }
                BodyLimit::Reject(_) => {
                    let size = body.len() as u64 + chunk.len() as u64;
                    debug!(size, limit = cap, "Response body over limit, aborting read");
                    return Err(BridgeError::BodyTooLarge { size, limit: cap });
                }
            }
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body.freeze())
}

/// IP-literal hosts never reach the DNS hook, so check them up front.
fn reject_blocked_literal(url: &str) -> Result<()> {
    let parsed = Url::parse(url)
        .map_err(|e| BridgeError::OperationFailed(format!("Invalid URL '{url}': {e}")))?;
    if let Some(ip) = parsed.host_str().and_then(ip_literal) {
        if is_blocked_address(ip) {
            return Err(BridgeError::BlockedTarget(format!(
                "{url} targets non-public address {ip}"
            )));
        }
    }
    Ok(())
}

fn guarded_redirect_policy() -> redirect::Policy {
    redirect::Policy::custom(|attempt| {
        if attempt.previous().len() >= MAX_REDIRECTS {
            return attempt.error("too many redirects");
        }
        let url = attempt.url();
        if !matches!(url.scheme(), "http" | "https") {
            let reason = format!("redirect to unsupported scheme {}", url.scheme());
            return attempt.error(reason);
        }
        let blocked = url
            .host_str()
            .and_then(ip_literal)
            .filter(|ip| is_blocked_address(*ip));
        match blocked {
            Some(ip) => {
                let err = BlockedAddress {
                    target: url.to_string(),
                    reason: format!("redirect to non-public address {ip}"),
                };
                attempt.error(err)
            }
            None => attempt.follow(),
        }
    })
}

fn find_blocked<'a>(err: &'a (dyn StdError + 'static)) -> Option<&'a BlockedAddress> {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(blocked) = e.downcast_ref::<BlockedAddress>() {
            return Some(blocked);
        }
        current = e.source();
    }
    None
}

fn map_reqwest_error(e: reqwest::Error) -> BridgeError {
    if let Some(blocked) = find_blocked(&e) {
        return BridgeError::BlockedTarget(blocked.to_string());
    }
    if e.is_timeout() {
        BridgeError::Timeout(e.to_string())
    } else if e.is_connect() {
        BridgeError::OperationFailed(format!("Connection failed: {e}"))
    } else {
        BridgeError::OperationFailed(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    const CHUNK: usize = 8 * 1024;

    /// One chunked response of `total` bytes with no Content-Length.
    /// Returns the port, the running count of bytes written and the server task.
    async fn serve_chunked(total: usize) -> (u16, Arc<AtomicUsize>, JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let sent = Arc::new(AtomicUsize::new(0));
        let counter = sent.clone();

        let server = tokio::spawn(async move {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            let mut request = [0u8; 2048];
            let _ = socket.read(&mut request).await;

            let head = "HTTP/1.1 200 OK\r\nContent-Type: image/png\r\nTransfer-Encoding: chunked\r\n\r\n";
            if socket.write_all(head.as_bytes()).await.is_err() {
                return;
            }
            let data = vec![0xABu8; CHUNK];
            let frame = [format!("{:x}\r\n", CHUNK).as_bytes(), &data[..], &b"\r\n"[..]].concat();
            while counter.load(Ordering::SeqCst) < total {
                if socket.write_all(&frame).await.is_err() {
                    return;
                }
                counter.fetch_add(CHUNK, Ordering::SeqCst);
            }
            let _ = socket.write_all(b"0\r\n\r\n").await;
        });
        (port, sent, server)
    }

    fn loopback_client() -> ReqwestHttpClient {
        // The guarded resolver refuses localhost; these tests exercise body reading only.
        ReqwestHttpClient::with_client(Client::new())
    }

    #[tokio::test]
    async fn test_undeclared_body_is_abandoned_past_the_limit() {
        let total = 32 * 1024 * 1024;
        let (port, sent, server) = serve_chunked(total).await;

        let err = loopback_client()
            .execute_with_retry(
                HttpRequest::get(format!("http://localhost:{port}/huge.png")).max_body(64 * 1024),
                RetryPolicy::none(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, BridgeError::BodyTooLarge { limit: 65536, .. }));
        let _ = tokio::time::timeout(Duration::from_secs(10), server).await;
        assert!(sent.load(Ordering::SeqCst) < total);
    }

    #[tokio::test]
    async fn test_prefix_read_stops_at_the_limit() {
        let (port, _sent, _server) = serve_chunked(1024 * 1024).await;

        let response = loopback_client()
            .execute_with_retry(
                HttpRequest::get(format!("http://localhost:{port}/big.png")).range_prefix(10_000),
                RetryPolicy::none(),
            )
            .await
            .unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.body.len(), 10_000);
    }

    #[test]
    fn test_method_conversion() {
        assert_eq!(
            ReqwestHttpClient::convert_method(HttpMethod::Get),
            reqwest::Method::GET
        );
        assert_eq!(
            ReqwestHttpClient::convert_method(HttpMethod::Head),
            reqwest::Method::HEAD
        );
    }

    #[test]
    fn test_literal_check() {
        assert!(reject_blocked_literal("http://127.0.0.1/x.png").is_err());
        assert!(reject_blocked_literal("http://[::1]:8080/").is_err());
        assert!(reject_blocked_literal("http://169.254.169.254/latest/meta-data").is_err());
        assert!(reject_blocked_literal("https://93.184.216.34/a.jpg").is_ok());
        assert!(reject_blocked_literal("https://assets.fanart.tv/a.jpg").is_ok());
    }

    #[tokio::test]
    async fn test_blocked_literal_is_not_sent() {
        let client = ReqwestHttpClient::new().unwrap();
        let err = client
            .execute(HttpRequest::get("http://10.0.0.1/private"))
            .await
            .unwrap_err();
        assert!(err.is_blocked_target());
    }
}
