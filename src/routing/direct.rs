//! Embedded-URL targets.
//!
//! # Responsibilities
//! - Detect paths that carry an absolute URL (`/https://host/...`)
//! - Decode percent-encoded targets (`/https%3A%2F%2Fhost%2F...`)
//! - Decode `/proxy/{url}` generic passthrough targets
//!
//! Neither form consults the routing table.

use url::Url;

use crate::error::ProxyError;

/// Path prefix of the generic passthrough form.
pub const GENERIC_PREFIX: &str = "/proxy/";

const ENCODED_SCHEMES: [&str; 2] = ["http%3a%2f%2f", "https%3a%2f%2f"];
const PLAIN_SCHEMES: [&str; 2] = ["http:/", "https:/"];

fn starts_with_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.len() >= needle.len()
        && haystack.as_bytes()[..needle.len()].eq_ignore_ascii_case(needle.as_bytes())
}

fn is_encoded(raw: &str) -> bool {
    ENCODED_SCHEMES.iter().any(|s| starts_with_ignore_case(raw, s))
}

fn has_scheme(raw: &str) -> bool {
    PLAIN_SCHEMES.iter().any(|s| starts_with_ignore_case(raw, s))
}

/// True when the path starts with an absolute http(s) URL, plain or
/// percent-encoded.
pub fn is_embedded_target(path: &str) -> bool {
    let raw = path.strip_prefix('/').unwrap_or(path);
    has_scheme(raw) || is_encoded(raw)
}

/// Repair `https:/host` into `https://host` (clients that merge slashes).
fn repair_slashes(raw: &str) -> String {
    if let Some(colon) = raw.find(':') {
        let (scheme, rest) = raw.split_at(colon + 1);
        if rest.starts_with('/') && !rest.starts_with("//") {
            return format!("{scheme}/{rest}");
        }
    }
    raw.to_string()
}

fn decode(raw: &str) -> Result<String, ProxyError> {
    if is_encoded(raw) {
        urlencoding::decode(raw)
            .map(|s| s.into_owned())
            .map_err(|e| ProxyError::invalid_target(raw, e.to_string()))
    } else {
        Ok(raw.to_string())
    }
}

fn finish(candidate: &str, query: Option<&str>) -> Result<Url, ProxyError> {
    let mut url = Url::parse(candidate)
        .map_err(|e| ProxyError::invalid_target(candidate, e.to_string()))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ProxyError::invalid_target(candidate, "only http and https targets are supported"));
    }
    if url.host_str().is_none() {
        return Err(ProxyError::invalid_target(candidate, "missing host"));
    }
    if url.query().is_none() {
        url.set_query(query.filter(|q| !q.is_empty()));
    }
    Ok(url)
}

/// Decode the absolute URL embedded in a direct-mode path.
pub fn decode_direct_target(path: &str, query: Option<&str>) -> Result<Url, ProxyError> {
    let raw = path.strip_prefix('/').unwrap_or(path);
    if !is_embedded_target(path) {
        return Err(ProxyError::invalid_target(
            raw,
            "path does not embed an absolute http(s) URL",
        ));
    }
    let decoded = decode(raw)?;
    finish(&repair_slashes(&decoded), query)
}

/// Decode the target of a `/proxy/{url}` request. Targets without a
/// scheme default to `https://`.
pub fn decode_generic_target(path: &str, query: Option<&str>) -> Result<Url, ProxyError> {
    let raw = path.strip_prefix(GENERIC_PREFIX).unwrap_or(path);
    let decoded = decode(raw)?;
    let candidate = if has_scheme(&decoded) {
        repair_slashes(&decoded)
    } else {
        format!("https://{decoded}")
    };
    finish(&candidate, query)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_embedded_targets() {
        assert!(is_embedded_target("/https://example.com/a"));
        assert!(is_embedded_target("/http://example.com"));
        assert!(is_embedded_target("/HTTPS%3A%2F%2Fexample.com%2Fa"));
        assert!(is_embedded_target("/https:/example.com/a"));
        assert!(!is_embedded_target("/not-a-url"));
        assert!(!is_embedded_target("/httpbin/get"));
    }

    #[test]
    fn test_decode_direct_plain_and_encoded() {
        let url = decode_direct_target("/https://example.com/v/a.mp4", Some("t=1")).unwrap();
        assert_eq!(url.as_str(), "https://example.com/v/a.mp4?t=1");

        let url =
            decode_direct_target("/https%3A%2F%2Fexample.com%2Fv%2Fa.mp4%3Fsig%3Dx", Some("t=1"))
                .unwrap();
        assert_eq!(url.as_str(), "https://example.com/v/a.mp4?sig=x");
    }

    #[test]
    fn test_decode_direct_repairs_collapsed_slashes() {
        let url = decode_direct_target("/https:/example.com/index.m3u8", None).unwrap();
        assert_eq!(url.as_str(), "https://example.com/index.m3u8");
    }

    #[test]
    fn test_decode_direct_rejects_non_urls() {
        let err = decode_direct_target("/not-a-url", None).unwrap_err();
        assert!(matches!(err, ProxyError::InvalidTarget { .. }));
    }

    #[test]
    fn test_decode_generic_target() {
        let url = decode_generic_target("/proxy/example.com/a", Some("q=1")).unwrap();
        assert_eq!(url.as_str(), "https://example.com/a?q=1");

        let url = decode_generic_target("/proxy/https%3A%2F%2Fexample.com%2Fb", None).unwrap();
        assert_eq!(url.as_str(), "https://example.com/b");

        let url = decode_generic_target("/proxy/http://example.com/c", None).unwrap();
        assert_eq!(url.as_str(), "http://example.com/c");
    }
}
