//! Per-request proxy context.
//!
//! # Responsibilities
//! - Derive the proxy origin clients see
//! - Decide the proxy mode and resolve the upstream URL
//! - Provide the rewrite context for body and redirect rewriting
//!
//! # Design Decisions
//! - Created at request start, read-only afterwards, dropped at request end
//! - Dispatch order: generic `/proxy/`, embedded URL, prefix table

use axum::http::{header, HeaderMap, Uri};
use url::Url;

use crate::error::ProxyError;
use crate::rewrite::RewriteContext;
use crate::routing::direct::{self, GENERIC_PREFIX};
use crate::routing::{RouteEntry, RoutingTable};

/// How the upstream was selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyMode {
    /// Configured path prefix.
    Prefixed,
    /// `/proxy/{url}` passthrough, never rewritten.
    Generic,
    /// `/{absolute-url}` passthrough with media-aware streaming.
    Direct,
}

impl ProxyMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Prefixed => "prefixed",
            Self::Generic => "generic",
            Self::Direct => "direct",
        }
    }
}

/// Which entry points are enabled.
#[derive(Debug, Clone, Copy)]
pub struct DispatchOptions {
    pub generic: bool,
    pub direct: bool,
}

/// Everything known about one proxied request.
#[derive(Debug, Clone)]
pub struct ProxyContext {
    pub proxy_origin: String,
    pub incoming_path: String,
    pub mode: ProxyMode,
    pub route: Option<RouteEntry>,
    pub target: Url,
    mount: String,
    origin_path: String,
}

impl ProxyContext {
    /// Resolve the upstream for an inbound path. `Ok(None)` means no
    /// entry point claims the path.
    pub fn resolve(
        routes: &RoutingTable,
        options: DispatchOptions,
        proxy_origin: String,
        uri: &Uri,
    ) -> Result<Option<Self>, ProxyError> {
        let path = uri.path();
        let query = uri.query();

        if options.generic && path.starts_with(GENERIC_PREFIX) {
            let target = direct::decode_generic_target(path, query)?;
            return Ok(Some(Self::new(proxy_origin, path, ProxyMode::Generic, None, target)));
        }

        if options.direct && direct::is_embedded_target(path) {
            let target = direct::decode_direct_target(path, query)?;
            return Ok(Some(Self::new(proxy_origin, path, ProxyMode::Direct, None, target)));
        }

        if let Some(route) = routes.resolve(path) {
            let target = route
                .target_url(path, query)
                .ok_or_else(|| ProxyError::invalid_target(path, "path is outside the matched prefix"))?
                .map_err(|e| ProxyError::invalid_target(path, e.to_string()))?;
            return Ok(Some(Self::new(
                proxy_origin,
                path,
                ProxyMode::Prefixed,
                Some(route.clone()),
                target,
            )));
        }

        if options.direct {
            // Anything unclaimed is read as a direct target, which fails
            // with a diagnostic for non-URLs.
            let target = direct::decode_direct_target(path, query)?;
            return Ok(Some(Self::new(proxy_origin, path, ProxyMode::Direct, None, target)));
        }

        Ok(None)
    }

    fn new(
        proxy_origin: String,
        path: &str,
        mode: ProxyMode,
        route: Option<RouteEntry>,
        target: Url,
    ) -> Self {
        let (mount, origin_path) = match (&route, mode) {
            (Some(route), _) => {
                let origin_path = Url::parse(route.target_origin())
                    .map(|u| u.path().trim_end_matches('/').to_string())
                    .unwrap_or_default();
                (route.prefix().to_string(), origin_path)
            }
            (None, ProxyMode::Direct) => {
                (format!("/{}", target.origin().ascii_serialization()), String::new())
            }
            (None, _) => (GENERIC_PREFIX.trim_end_matches('/').to_string(), String::new()),
        };

        Self {
            proxy_origin,
            incoming_path: path.to_string(),
            mode,
            route,
            target,
            mount,
            origin_path,
        }
    }

    /// Context for the URL a followed redirect chain ended at.
    pub fn redirected(&self, target: Url) -> Self {
        Self::new(
            self.proxy_origin.clone(),
            &self.incoming_path,
            self.mode,
            self.route.clone(),
            target,
        )
    }

    /// Path prefix rewritten URLs live under.
    pub fn mount(&self) -> &str {
        &self.mount
    }

    /// Context for rewriting bodies and redirects of this response.
    pub fn rewrite_context(&self) -> RewriteContext<'_> {
        RewriteContext {
            proxy_origin: &self.proxy_origin,
            mount: &self.mount,
            target: &self.target,
            origin_path: &self.origin_path,
            embed_foreign: self.mode == ProxyMode::Direct,
        }
    }
}

/// Scheme the client used, from `X-Forwarded-Proto` or the request URI.
pub fn inbound_proto(headers: &HeaderMap, uri: &Uri) -> String {
    headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_ascii_lowercase())
        .filter(|v| v == "http" || v == "https")
        .or_else(|| uri.scheme_str().map(str::to_string))
        .unwrap_or_else(|| "http".to_string())
}

/// Host the client addressed.
pub fn inbound_host(headers: &HeaderMap, uri: &Uri) -> String {
    headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| uri.authority().map(|a| a.to_string()))
        .unwrap_or_else(|| "localhost".to_string())
}

/// `{scheme}://{host}` of the proxy as seen by the client.
pub fn proxy_origin(configured: Option<&str>, headers: &HeaderMap, uri: &Uri) -> String {
    match configured {
        Some(origin) => origin.trim_end_matches('/').to_string(),
        None => format!("{}://{}", inbound_proto(headers, uri), inbound_host(headers, uri)),
    }
}
