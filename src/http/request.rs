//! Request attributes shared by the middleware and handlers.

use std::net::{IpAddr, SocketAddr};

use axum::http::HeaderMap;

pub const X_REQUEST_ID: &str = "x-request-id";
pub const X_FORWARDED_FOR: &str = "x-forwarded-for";
pub const X_VISITOR_ID: &str = "x-visitor-id";

/// Client address as the gateway keys it.
///
/// The peer address is used unless `trust_proxy` is set, in which case the
/// first `X-Forwarded-For` hop wins. IPv4-mapped IPv6 peers are reported as IPv4.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>, trust_proxy: bool) -> String {
    if trust_proxy {
        let forwarded = headers
            .get(X_FORWARDED_FOR)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(hop) = forwarded {
            return match hop.parse::<IpAddr>() {
                Ok(ip) => normalize(ip).to_string(),
                Err(_) => hop.to_string(),
            };
        }
    }

    peer.map(|addr| normalize(addr.ip()).to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn normalize(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(v6) => v6
            .to_ipv4_mapped()
            .map(IpAddr::V4)
            .unwrap_or(IpAddr::V6(v6)),
        v4 => v4,
    }
}

pub fn request_id(headers: &HeaderMap) -> String {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_peer_address_used_by_default() {
        let mut headers = HeaderMap::new();
        headers.insert(X_FORWARDED_FOR, HeaderValue::from_static("198.51.100.1"));
        let peer: SocketAddr = "203.0.113.5:4410".parse().unwrap();
        assert_eq!(client_ip(&headers, Some(peer), false), "203.0.113.5");
    }

    #[test]
    fn test_forwarded_for_first_hop_when_trusted() {
        let mut headers = HeaderMap::new();
        headers.insert(
            X_FORWARDED_FOR,
            HeaderValue::from_static("198.51.100.1, 10.0.0.2"),
        );
        let peer: SocketAddr = "127.0.0.1:4410".parse().unwrap();
        assert_eq!(client_ip(&headers, Some(peer), true), "198.51.100.1");
    }

    #[test]
    fn test_mapped_ipv6_normalized() {
        let peer: SocketAddr = "[::ffff:203.0.113.5]:80".parse().unwrap();
        assert_eq!(client_ip(&HeaderMap::new(), Some(peer), false), "203.0.113.5");
        assert_eq!(client_ip(&HeaderMap::new(), None, true), "unknown");
    }
}
