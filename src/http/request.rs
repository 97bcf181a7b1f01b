//! Upstream request construction.
//!
//! # Responsibilities
//! - Copy end-to-end headers from the inbound request
//! - Set `Host` and the `X-Forwarded-*` headers
//! - Shape headers per mode (generic: strip `Accept-Encoding`, rebuild
//!   `Referer`; direct: keep everything, set `Origin`)
//!
//! # Design Decisions
//! - Each step takes and returns the builder; the header set is built as
//!   a value, never mutated from several call sites
//! - A malformed inbound `Referer` falls back to the target root

use std::collections::BTreeMap;
use std::net::IpAddr;

use axum::http::{header, HeaderMap, HeaderName, HeaderValue};
use url::Url;

use crate::routing::RouteEntry;
use crate::security::headers::is_hop_by_hop;

const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
const X_FORWARDED_HOST: HeaderName = HeaderName::from_static("x-forwarded-host");
const X_FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");

/// Client-side facts forwarded upstream.
#[derive(Debug, Clone, Default)]
pub struct Forwarding {
    pub client_ip: Option<IpAddr>,
    pub host: String,
    pub proto: String,
}

/// Referer handling for generic header shaping.
#[derive(Debug, Clone, Copy)]
pub struct RefererPolicy<'a> {
    /// Target host → fixed referer.
    pub overrides: &'a BTreeMap<String, String>,
    /// Route used to map a proxied referer path back onto the upstream.
    pub route: Option<&'a RouteEntry>,
}

/// Builds the outbound header set.
#[derive(Debug)]
pub struct UpstreamRequestBuilder<'a> {
    target: &'a Url,
    inbound: &'a HeaderMap,
    headers: HeaderMap,
}

fn target_authority(target: &Url) -> String {
    let host = target.host_str().unwrap_or_default();
    match target.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    }
}

impl<'a> UpstreamRequestBuilder<'a> {
    /// Start from the inbound end-to-end headers and point `Host` at the
    /// target.
    pub fn new(inbound: &'a HeaderMap, target: &'a Url) -> Self {
        let mut headers = HeaderMap::with_capacity(inbound.len() + 3);
        for (name, value) in inbound {
            if is_hop_by_hop(name, inbound) || name == header::HOST {
                continue;
            }
            headers.append(name.clone(), value.clone());
        }
        if let Ok(host) = HeaderValue::from_str(&target_authority(target)) {
            headers.insert(header::HOST, host);
        }
        Self {
            target,
            inbound,
            headers,
        }
    }

    pub fn forwarding(mut self, forwarding: &Forwarding) -> Self {
        let ip = forwarding
            .client_ip
            .map(|ip| ip.to_string())
            .unwrap_or_default();
        self.set(X_FORWARDED_FOR, &ip);
        self.set(X_FORWARDED_HOST, &forwarding.host);
        self.set(X_FORWARDED_PROTO, &forwarding.proto);
        self
    }

    /// Header shaping for prefix-routed and `/proxy/` requests.
    pub fn generic_shaping(mut self, policy: RefererPolicy<'_>) -> Self {
        self.headers.remove(header::ACCEPT_ENCODING);
        let referer = self.referer(policy);
        self.set(header::REFERER, &referer);
        self
    }

    /// Header shaping for direct requests. `Range` and `Accept-Encoding`
    /// are already carried over verbatim.
    pub fn direct_shaping(mut self) -> Self {
        let origin = self.target.origin().ascii_serialization();
        self.set(header::ORIGIN, &origin);
        self
    }

    pub fn finish(self) -> HeaderMap {
        self.headers
    }

    fn set(&mut self, name: HeaderName, value: &str) {
        match HeaderValue::from_str(value) {
            Ok(value) => {
                self.headers.insert(name, value);
            }
            Err(_) => {
                tracing::debug!(header = %name, "Skipping unrepresentable header value");
            }
        }
    }

    fn referer(&self, policy: RefererPolicy<'_>) -> String {
        let host = self.target.host_str().unwrap_or_default().to_ascii_lowercase();
        if let Some(fixed) = policy.overrides.get(&host) {
            return fixed.clone();
        }

        let root = format!("{}://{}/", self.target.scheme(), target_authority(self.target));
        let Some(raw) = self.inbound.get(header::REFERER) else {
            return root;
        };
        let parsed = raw.to_str().ok().and_then(|s| Url::parse(s).ok());
        let Some(parsed) = parsed else {
            tracing::debug!("Malformed Referer, using target root");
            return root;
        };

        let path = parsed.path();
        let query = parsed.query();
        if let Some(Ok(url)) = policy.route.and_then(|route| route.target_url(path, query)) {
            return url.to_string();
        }
        let mut rebuilt = format!(
            "{}://{}{}",
            self.target.scheme(),
            target_authority(self.target),
            path
        );
        if let Some(q) = query {
            rebuilt.push('?');
            rebuilt.push_str(q);
        }
        rebuilt
    }
}

/// True when the inbound request declares a body.
pub fn has_body(headers: &HeaderMap) -> bool {
    if headers.contains_key(header::TRANSFER_ENCODING) {
        return true;
    }
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .is_some_and(|len| len > 0)
}
