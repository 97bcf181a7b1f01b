//! Upstream exchange for one resolved request.
//!
//! # Data Flow
//! ```text
//! ProxyContext + inbound request
//!     → request.rs (outbound headers per mode)
//!     → client.rs (manual or redirect-following client)
//!     → classify (content class of the upstream response)
//!     → rewritable: buffer (bounded) → decode → RewriteEngine
//!       otherwise:  stream the upstream body as it arrives
//!     → response.rs (headers, Location, CORS, cache policy)
//! ```
//!
//! The request deadline covers everything up to the response head and any
//! buffered rewrite. Streamed bodies are not cut off once they start.

use std::time::Duration;

use axum::{
    body::Body,
    http::{header, HeaderMap, Method, Request, StatusCode},
    response::Response,
};
use bytes::Bytes;

use crate::error::ProxyError;
use crate::http::context::{ProxyContext, ProxyMode};
use crate::http::encoding::{self, Coding};
use crate::http::redirect::rewrite_location;
use crate::http::request::{has_body, Forwarding, RefererPolicy, UpstreamRequestBuilder};
use crate::http::response::ResponseAssembler;
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::rewrite::{classify, ContentClass};

fn header_str<'a>(headers: &'a HeaderMap, name: header::HeaderName) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn should_rewrite(mode: ProxyMode, method: &Method, status: StatusCode, class: ContentClass) -> bool {
    mode != ProxyMode::Generic
        && method != Method::HEAD
        && status != StatusCode::NO_CONTENT
        && status != StatusCode::NOT_MODIFIED
        && class.is_rewritable()
}

async fn read_bounded(upstream: &mut reqwest::Response, limit: usize) -> Result<Vec<u8>, ProxyError> {
    if upstream
        .content_length()
        .is_some_and(|len| len > limit as u64)
    {
        return Err(ProxyError::BodyTooLarge { limit });
    }
    let mut buf = Vec::new();
    while let Some(chunk) = upstream.chunk().await? {
        if buf.len() + chunk.len() > limit {
            return Err(ProxyError::BodyTooLarge { limit });
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(buf)
}

/// Forward `request` to the upstream chosen by `ctx` and build the client
/// response, failing with [`ProxyError::Timeout`] past `timeouts.request_secs`.
pub async fn forward(
    state: &AppState,
    ctx: &ProxyContext,
    request: Request<Body>,
    forwarding: Forwarding,
) -> Result<Response, ProxyError> {
    let secs = state.config.timeouts.request_secs;
    tokio::time::timeout(Duration::from_secs(secs), exchange(state, ctx, request, forwarding))
        .await
        .map_err(|_| ProxyError::Timeout { secs })?
}

async fn exchange(
    state: &AppState,
    ctx: &ProxyContext,
    request: Request<Body>,
    forwarding: Forwarding,
) -> Result<Response, ProxyError> {
    let config = &state.config;
    let (parts, body) = request.into_parts();

    let outbound = UpstreamRequestBuilder::new(&parts.headers, &ctx.target).forwarding(&forwarding);
    let outbound = match ctx.mode {
        ProxyMode::Direct => outbound.direct_shaping(),
        ProxyMode::Prefixed | ProxyMode::Generic => outbound.generic_shaping(RefererPolicy {
            overrides: &config.referer_overrides,
            route: ctx.route.as_ref(),
        }),
    }
    .finish();

    let mut builder = state
        .client
        .for_mode(ctx.mode)
        .request(parts.method.clone(), ctx.target.clone())
        .headers(outbound);
    if parts.method != Method::GET && parts.method != Method::HEAD && has_body(&parts.headers) {
        builder = builder.body(reqwest::Body::wrap_stream(body.into_data_stream()));
    }

    tracing::debug!(
        mode = ctx.mode.as_str(),
        method = %parts.method,
        target = %ctx.target,
        "Forwarding upstream"
    );
    let mut upstream = builder.send().await?;

    let redirected;
    let ctx = if state.client.follows_redirects(ctx.mode) && upstream.url() != &ctx.target {
        tracing::debug!(from = %ctx.target, to = %upstream.url(), "Upstream redirects followed");
        redirected = ctx.redirected(upstream.url().clone());
        &redirected
    } else {
        ctx
    };

    let status = upstream.status();
    let headers = upstream.headers().clone();
    let class = classify(
        header_str(&headers, header::CONTENT_TYPE).unwrap_or_default(),
        ctx.target.path(),
        config.direct.passthrough_playlists,
    );
    let location = header_str(&headers, header::LOCATION)
        .and_then(|location| rewrite_location(status, location, ctx, config.generic.enabled));

    let assembler = ResponseAssembler::from_upstream(status, &headers).location(location);

    let coding = Coding::parse(header_str(&headers, header::CONTENT_ENCODING));
    let rewrite = should_rewrite(ctx.mode, &parts.method, status, class);
    let (assembler, body) = match coding {
        Some(coding) if rewrite => {
            let limit = config.limits.max_rewrite_body_bytes;
            let raw = read_bounded(&mut upstream, limit).await?;
            let decoded = encoding::decode_body(coding, raw, limit)?;
            let body = match String::from_utf8(decoded) {
                Ok(text) => {
                    let rctx = ctx.rewrite_context();
                    match state.engine.rewrite(class, &text, &rctx) {
                        Some(out) => {
                            metrics::record_rewrite(class.as_str());
                            Body::from(out)
                        }
                        None => Body::from(text),
                    }
                }
                Err(e) => {
                    tracing::debug!(class = class.as_str(), "Body is not UTF-8, passing through");
                    Body::from(Bytes::from(e.into_bytes()))
                }
            };
            (assembler.body_rewritten(), body)
        }
        _ => {
            if rewrite {
                tracing::debug!(
                    encoding = header_str(&headers, header::CONTENT_ENCODING).unwrap_or_default(),
                    "Unsupported content encoding, streaming untouched"
                );
            }
            (assembler, Body::from_stream(upstream.bytes_stream()))
        }
    };

    assembler.cors(class).cache_policy(class).body(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_rewrite() {
        assert!(should_rewrite(
            ProxyMode::Prefixed,
            &Method::GET,
            StatusCode::OK,
            ContentClass::Html
        ));
        assert!(should_rewrite(
            ProxyMode::Direct,
            &Method::GET,
            StatusCode::OK,
            ContentClass::HlsPlaylist
        ));
        assert!(!should_rewrite(
            ProxyMode::Generic,
            &Method::GET,
            StatusCode::OK,
            ContentClass::Html
        ));
        assert!(!should_rewrite(
            ProxyMode::Prefixed,
            &Method::HEAD,
            StatusCode::OK,
            ContentClass::Html
        ));
        assert!(!should_rewrite(
            ProxyMode::Prefixed,
            &Method::GET,
            StatusCode::NOT_MODIFIED,
            ContentClass::Css
        ));
        assert!(!should_rewrite(
            ProxyMode::Direct,
            &Method::GET,
            StatusCode::PARTIAL_CONTENT,
            ContentClass::Media
        ));
    }
}
