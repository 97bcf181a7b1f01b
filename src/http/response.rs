//! Response assembly.
//!
//! # Responsibilities
//! - Copy upstream headers minus hop-by-hop and frame/CSP headers
//! - Apply CORS and the per-class cache policy
//! - Build the CORS preflight response
//!
//! # Design Decisions
//! - Built as a value from explicit steps (base, location, CORS, cache)
//! - Rewritten bodies drop `Content-Length` and `Content-Encoding`; the
//!   server recomputes the length

use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};

use crate::error::ProxyError;
use crate::rewrite::ContentClass;
use crate::security::headers::{is_hop_by_hop, is_stripped_security_header};

pub const ALLOW_METHODS: &str = "GET, POST, PUT, DELETE, PATCH, OPTIONS";
pub const ALLOW_HEADERS: &str = "Content-Type, Authorization, X-Requested-With, Accept, Origin, Range";
pub const EXPOSE_HEADERS: &str = "Content-Length, Content-Range, Accept-Ranges";

const HTML_CACHE: &str = "no-store, no-cache, must-revalidate, proxy-revalidate";
const MEDIA_CACHE: &str = "public, max-age=31536000";
const DEFAULT_CACHE: &str = "public, max-age=86400";

fn insert_cors(headers: &mut HeaderMap) {
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOW_METHODS),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOW_HEADERS),
    );
}

/// `204` answer to any `OPTIONS` request.
pub fn preflight() -> Response {
    let mut headers = HeaderMap::new();
    insert_cors(&mut headers);
    headers.insert(
        header::ACCESS_CONTROL_MAX_AGE,
        HeaderValue::from_static("86400"),
    );
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static(DEFAULT_CACHE));
    (StatusCode::NO_CONTENT, headers).into_response()
}

/// Builds the client response from an upstream response head.
#[derive(Debug)]
pub struct ResponseAssembler {
    status: StatusCode,
    headers: HeaderMap,
}

impl ResponseAssembler {
    pub fn from_upstream(status: StatusCode, upstream: &HeaderMap) -> Self {
        let mut headers = HeaderMap::with_capacity(upstream.len() + 6);
        for (name, value) in upstream {
            if is_hop_by_hop(name, upstream) || is_stripped_security_header(name) {
                continue;
            }
            headers.append(name.clone(), value.clone());
        }
        Self { status, headers }
    }

    /// The body was rewritten or decoded.
    pub fn body_rewritten(mut self) -> Self {
        self.headers.remove(header::CONTENT_LENGTH);
        self.headers.remove(header::CONTENT_ENCODING);
        self
    }

    pub fn location(mut self, location: Option<String>) -> Self {
        if let Some(location) = location {
            match HeaderValue::from_str(&location) {
                Ok(value) => {
                    self.headers.insert(header::LOCATION, value);
                }
                Err(_) => tracing::warn!(location, "Rewritten Location is not a valid header"),
            }
        }
        self
    }

    pub fn cors(mut self, class: ContentClass) -> Self {
        insert_cors(&mut self.headers);
        if class == ContentClass::Media {
            self.headers.insert(
                header::ACCESS_CONTROL_EXPOSE_HEADERS,
                HeaderValue::from_static(EXPOSE_HEADERS),
            );
        }
        self
    }

    pub fn cache_policy(mut self, class: ContentClass) -> Self {
        match class {
            ContentClass::Html => {
                self.headers
                    .insert(header::CACHE_CONTROL, HeaderValue::from_static(HTML_CACHE));
                self.headers
                    .insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
                self.headers
                    .insert(header::EXPIRES, HeaderValue::from_static("0"));
            }
            ContentClass::Media => {
                self.headers
                    .insert(header::CACHE_CONTROL, HeaderValue::from_static(MEDIA_CACHE));
            }
            _ => {
                self.headers
                    .insert(header::CACHE_CONTROL, HeaderValue::from_static(DEFAULT_CACHE));
            }
        }
        self
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(self, body: Body) -> Result<Response, ProxyError> {
        let mut builder = Response::builder().status(self.status);
        if let Some(headers) = builder.headers_mut() {
            *headers = self.headers;
        }
        Ok(builder.body(body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upstream() -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(header::CONTENT_TYPE, "text/html".parse().unwrap());
        h.insert(header::CONTENT_LENGTH, "10".parse().unwrap());
        h.insert(header::CONTENT_SECURITY_POLICY, "default-src 'self'".parse().unwrap());
        h.insert(header::X_FRAME_OPTIONS, "DENY".parse().unwrap());
        h.insert(header::TRANSFER_ENCODING, "chunked".parse().unwrap());
        h.insert(header::SET_COOKIE, "a=1".parse().unwrap());
        h.append(header::SET_COOKIE, "b=2".parse().unwrap());
        h
    }

    #[test]
    fn test_preflight() {
        let response = preflight();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        let h = response.headers();
        assert_eq!(h[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(h[header::ACCESS_CONTROL_ALLOW_METHODS], ALLOW_METHODS);
        assert_eq!(h[header::ACCESS_CONTROL_ALLOW_HEADERS], ALLOW_HEADERS);
        assert_eq!(h[header::ACCESS_CONTROL_MAX_AGE], "86400");
    }

    #[test]
    fn test_html_assembly() {
        let assembler = ResponseAssembler::from_upstream(StatusCode::OK, &upstream())
            .body_rewritten()
            .cors(ContentClass::Html)
            .cache_policy(ContentClass::Html);
        let h = assembler.headers();

        assert!(h.get(header::CONTENT_SECURITY_POLICY).is_none());
        assert!(h.get(header::X_FRAME_OPTIONS).is_none());
        assert!(h.get(header::TRANSFER_ENCODING).is_none());
        assert!(h.get(header::CONTENT_LENGTH).is_none());
        assert_eq!(h.get_all(header::SET_COOKIE).iter().count(), 2);
        assert_eq!(h[header::CACHE_CONTROL], HTML_CACHE);
        assert_eq!(h[header::PRAGMA], "no-cache");
        assert_eq!(h[header::EXPIRES], "0");
        assert!(h.get(header::ACCESS_CONTROL_EXPOSE_HEADERS).is_none());
    }

    #[test]
    fn test_media_assembly() {
        let mut up = HeaderMap::new();
        up.insert(header::CONTENT_RANGE, "bytes 0-99/1000".parse().unwrap());
        up.insert(header::ACCEPT_RANGES, "bytes".parse().unwrap());
        up.insert(header::CONTENT_LENGTH, "100".parse().unwrap());

        let response = ResponseAssembler::from_upstream(StatusCode::PARTIAL_CONTENT, &up)
            .cors(ContentClass::Media)
            .cache_policy(ContentClass::Media)
            .body(Body::empty())
            .unwrap();
        let h = response.headers();

        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(h[header::CONTENT_RANGE], "bytes 0-99/1000");
        assert_eq!(h[header::ACCEPT_RANGES], "bytes");
        assert_eq!(h[header::CONTENT_LENGTH], "100");
        assert_eq!(h[header::ACCESS_CONTROL_EXPOSE_HEADERS], EXPOSE_HEADERS);
        assert_eq!(h[header::CACHE_CONTROL], MEDIA_CACHE);
    }

    #[test]
    fn test_location_override() {
        let response = ResponseAssembler::from_upstream(StatusCode::FOUND, &HeaderMap::new())
            .location(Some("https://proxy.example/x/new".to_string()))
            .cache_policy(ContentClass::Opaque)
            .body(Body::empty())
            .unwrap();
        assert_eq!(response.headers()[header::LOCATION], "https://proxy.example/x/new");
        assert_eq!(response.headers()[header::CACHE_CONTROL], DEFAULT_CACHE);
    }
}
