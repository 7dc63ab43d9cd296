//! Host resolution for desktop hosts.
//!
//! [`SystemResolver`] answers the outbound fetch guard's lookups;
//! [`GuardedDnsResolver`] plugs the same address policy into reqwest so the
//! address actually connected to is checked too (DNS rebinding).

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    net::{is_blocked_address, HostResolver},
};
use reqwest::dns::{Addrs, Name, Resolve, Resolving};
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use tracing::warn;

/// Resolver backed by the operating system (`getaddrinfo` via tokio).
#[derive(Debug, Clone, Default)]
pub struct SystemResolver;

#[async_trait]
impl HostResolver for SystemResolver {
    async fn resolve(&self, host: &str) -> Result<Vec<IpAddr>> {
        let addrs = tokio::net::lookup_host((host, 0))
            .await
            .map_err(|e| BridgeError::OperationFailed(format!("DNS lookup for {host} failed: {e}")))?;
        Ok(addrs.map(|addr| addr.ip()).collect())
    }
}

/// Raised inside reqwest when a connection target violates the address policy.
#[derive(Debug, Clone)]
pub struct BlockedAddress {
    pub target: String,
    pub reason: String,
}

impl fmt::Display for BlockedAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.target, self.reason)
    }
}

impl std::error::Error for BlockedAddress {}

/// reqwest DNS hook that refuses non-public answers.
#[derive(Debug, Clone, Default)]
pub struct GuardedDnsResolver;

impl Resolve for GuardedDnsResolver {
    fn resolve(&self, name: Name) -> Resolving {
        let host = name.as_str().to_string();
        Box::pin(async move {
            let addrs: Vec<SocketAddr> = tokio::net::lookup_host((host.as_str(), 0))
                .await?
                .collect();

            if addrs.is_empty() {
                return Err(Box::new(BlockedAddress {
                    target: host,
                    reason: "resolved to no addresses".to_string(),
                }) as Box<dyn std::error::Error + Send + Sync>);
            }
            if let Some(bad) = addrs.iter().find(|addr| is_blocked_address(addr.ip())) {
                warn!(host = %host, address = %bad.ip(), "Refusing connection to non-public address");
                return Err(Box::new(BlockedAddress {
                    reason: format!("resolves to non-public address {}", bad.ip()),
                    target: host,
                }) as Box<dyn std::error::Error + Send + Sync>);
            }

            let addrs: Addrs = Box::new(addrs.into_iter());
            Ok(addrs)
        })
    }
}

/// Parse the host part of a URL as an IP literal (`[::1]` brackets allowed).
pub(crate) fn ip_literal(host: &str) -> Option<IpAddr> {
    host.trim_start_matches('[')
        .trim_end_matches(']')
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ip_literal_parsing() {
        assert_eq!(ip_literal("127.0.0.1"), Some("127.0.0.1".parse().unwrap()));
        assert_eq!(ip_literal("[::1]"), Some("::1".parse().unwrap()));
        assert_eq!(ip_literal("example.com"), None);
    }

    #[tokio::test]
    async fn test_system_resolver_resolves_localhost() {
        let addrs = SystemResolver.resolve("localhost").await.unwrap();
        assert!(addrs.iter().all(|addr| addr.is_loopback()));
    }
}
