//! Proxy error type.
//!
//! Every failure that happens after a request has been dispatched is
//! reported to the client as `502 Bad Gateway` with a plain-text reason
//! and a permissive CORS header, so browser callers can read it.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Errors produced while proxying a request.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// The request did not resolve to a usable upstream URL.
    #[error("invalid target `{input}`: {reason}")]
    InvalidTarget { input: String, reason: String },

    /// Connecting to or reading from the upstream failed.
    #[error("upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),

    /// The upstream exchange ran past the request deadline.
    #[error("upstream did not respond within {secs}s")]
    Timeout { secs: u64 },

    /// A textual body exceeded the rewrite buffer.
    #[error("response body exceeds the {limit} byte rewrite limit")]
    BodyTooLarge { limit: usize },

    /// The upstream body could not be decompressed.
    #[error("failed to decode {encoding} body: {source}")]
    Decode {
        encoding: String,
        #[source]
        source: std::io::Error,
    },

    /// A response could not be assembled.
    #[error("failed to build response: {0}")]
    Response(#[from] axum::http::Error),
}

impl ProxyError {
    pub fn invalid_target(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidTarget {
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// Short label used for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidTarget { .. } => "invalid_target",
            Self::Timeout { .. } => "timeout",
            Self::Upstream(e) if e.is_timeout() => "timeout",
            Self::Upstream(e) if e.is_connect() => "connect",
            Self::Upstream(_) => "upstream",
            Self::BodyTooLarge { .. } => "body_too_large",
            Self::Decode { .. } => "decode",
            Self::Response(_) => "response",
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let mut response = (StatusCode::BAD_GATEWAY, format!("Proxy error: {self}")).into_response();
        let headers = response.headers_mut();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain;charset=UTF-8"),
        );
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        );
        response
    }
}
