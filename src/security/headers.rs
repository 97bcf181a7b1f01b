//! Header manipulation and security headers.
//!
//! # Responsibilities
//! - Identify hop-by-hop headers that never cross the proxy
//! - Identify upstream security headers that would break proxied pages
//! - Resolve the client IP for `X-Forwarded-For`
//!
//! # Design Decisions
//! - Client IP priority: trusted headers in configured order, then the
//!   rightmost `X-Forwarded-For` entry, then the socket peer
//! - Unparseable header values are skipped, never forwarded verbatim

use std::net::{IpAddr, SocketAddr};

use axum::extract::ConnectInfo;
use axum::http::{header, HeaderMap, HeaderName, Request};

/// Headers scoped to a single connection.
pub const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Upstream response headers that prevent the proxied page from working
/// under the proxy's origin.
pub static STRIPPED_SECURITY: [HeaderName; 4] = [
    header::CONTENT_SECURITY_POLICY,
    header::CONTENT_SECURITY_POLICY_REPORT_ONLY,
    header::X_FRAME_OPTIONS,
    header::X_CONTENT_TYPE_OPTIONS,
];

/// True for hop-by-hop headers, including any listed in `Connection`.
pub fn is_hop_by_hop(name: &HeaderName, headers: &HeaderMap) -> bool {
    if HOP_BY_HOP.contains(&name.as_str()) {
        return true;
    }
    headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|token| token.trim().eq_ignore_ascii_case(name.as_str()))
}

/// True for upstream security headers removed from proxied responses.
pub fn is_stripped_security_header(name: &HeaderName) -> bool {
    STRIPPED_SECURITY.contains(name)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Resolve the client IP of an inbound request.
pub fn client_ip<B>(request: &Request<B>, trusted: &[String]) -> Option<IpAddr> {
    let headers = request.headers();

    for name in trusted {
        if let Some(ip) = header_str(headers, name).and_then(|s| s.trim().parse::<IpAddr>().ok()) {
            return Some(ip);
        }
    }

    if let Some(ip) = header_str(headers, "x-forwarded-for")
        .and_then(|xff| xff.rsplit(',').next())
        .map(str::trim)
        .and_then(|s| s.parse::<IpAddr>().ok())
    {
        return Some(ip);
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn trusted() -> Vec<String> {
        vec!["cf-connecting-ip".to_string(), "x-real-ip".to_string()]
    }

    #[test]
    fn test_hop_by_hop_detection() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONNECTION, "close, x-custom".parse().unwrap());

        assert!(is_hop_by_hop(&header::TRANSFER_ENCODING, &headers));
        assert!(is_hop_by_hop(&HeaderName::from_static("x-custom"), &headers));
        assert!(!is_hop_by_hop(&header::CONTENT_TYPE, &headers));
    }

    #[test]
    fn test_security_headers() {
        assert!(is_stripped_security_header(&header::X_FRAME_OPTIONS));
        assert!(!is_stripped_security_header(&header::CACHE_CONTROL));
    }

    #[test]
    fn test_client_ip_priority() {
        let request = Request::builder()
            .header("x-forwarded-for", "10.0.0.1, 10.0.0.2")
            .header("x-real-ip", "192.0.2.7")
            .body(Body::empty())
            .unwrap();
        assert_eq!(
            client_ip(&request, &trusted()),
            Some("192.0.2.7".parse().unwrap())
        );

        let request = Request::builder()
            .header("x-forwarded-for", "10.0.0.1, 10.0.0.2")
            .body(Body::empty())
            .unwrap();
        assert_eq!(
            client_ip(&request, &trusted()),
            Some("10.0.0.2".parse().unwrap())
        );
    }

    #[test]
    fn test_client_ip_falls_back_to_peer() {
        let mut request = Request::builder()
            .header("cf-connecting-ip", "garbage")
            .body(Body::empty())
            .unwrap();
        assert_eq!(client_ip(&request, &trusted()), None);

        let peer: SocketAddr = "203.0.113.9:5000".parse().unwrap();
        request.extensions_mut().insert(ConnectInfo(peer));
        assert_eq!(client_ip(&request, &trusted()), Some(peer.ip()));
    }
}
