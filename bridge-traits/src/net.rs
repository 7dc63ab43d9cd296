//! Outbound Address Policy
//!
//! Classifies IP addresses an outbound fetch may connect to and abstracts host
//! name resolution so the policy can be enforced before any byte is sent.

use async_trait::async_trait;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use crate::error::Result;

/// Returns `true` when an outbound fetch must not connect to `addr`.
///
/// Blocked: loopback, unspecified, private (RFC 1918 / IPv6 ULA), link-local,
/// carrier-grade NAT, `0.0.0.0/8`, broadcast and multicast. IPv4-mapped IPv6
/// addresses are judged by their embedded IPv4 address.
pub fn is_blocked_address(addr: IpAddr) -> bool {
    match addr {
        IpAddr::V4(v4) => is_blocked_v4(v4),
        IpAddr::V6(v6) => is_blocked_v6(v6),
    }
}

fn is_blocked_v4(addr: Ipv4Addr) -> bool {
    let [a, b, ..] = addr.octets();
    addr.is_loopback()
        || addr.is_private()
        || addr.is_link_local()
        || addr.is_unspecified()
        || addr.is_broadcast()
        || addr.is_multicast()
        || a == 0
        // 100.64.0.0/10
        || (a == 100 && (b & 0xc0) == 64)
}

fn is_blocked_v6(addr: Ipv6Addr) -> bool {
    if let Some(mapped) = addr.to_ipv4_mapped() {
        return is_blocked_v4(mapped);
    }
    let first = addr.segments()[0];
    addr.is_loopback()
        || addr.is_unspecified()
        || addr.is_multicast()
        // fc00::/7 unique local
        || (first & 0xfe00) == 0xfc00
        // fe80::/10 link-local
        || (first & 0xffc0) == 0xfe80
}

/// Resolves a host name to the addresses a connection would use.
#[async_trait]
pub trait HostResolver: Send + Sync {
    /// Resolve `host` (never an IP literal) to zero or more addresses.
    async fn resolve(&self, host: &str) -> Result<Vec<IpAddr>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blocked(s: &str) -> bool {
        is_blocked_address(s.parse().unwrap())
    }

    #[test]
    fn test_blocks_local_and_private_v4() {
        for addr in [
            "127.0.0.1",
            "127.8.9.10",
            "10.0.0.1",
            "10.255.255.255",
            "172.16.0.1",
            "172.31.255.254",
            "192.168.1.1",
            "169.254.169.254",
            "0.0.0.0",
            "0.1.2.3",
            "100.64.0.1",
            "255.255.255.255",
            "224.0.0.1",
        ] {
            assert!(blocked(addr), "{addr} should be blocked");
        }
    }

    #[test]
    fn test_blocks_local_and_private_v6() {
        for addr in ["::1", "::", "fd00::1", "fc12::3", "fe80::1", "ff02::1", "::ffff:127.0.0.1", "::ffff:10.1.1.1"] {
            assert!(blocked(addr), "{addr} should be blocked");
        }
    }

    #[test]
    fn test_allows_public_addresses() {
        for addr in [
            "93.184.216.34",
            "8.8.8.8",
            "172.32.0.1",
            "100.128.0.1",
            "2606:4700:4700::1111",
            "::ffff:93.184.216.34",
        ] {
            assert!(!blocked(addr), "{addr} should be allowed");
        }
    }
}
