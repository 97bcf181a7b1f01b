//! Shared utilities for integration tests.

use std::io::Write;
use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use flate2::{write::GzEncoder, Compression};
use tokio::net::TcpListener;

use rewrite_proxy::config::ProxyConfig;
use rewrite_proxy::lifecycle::Shutdown;
use rewrite_proxy::HttpServer;

pub const PROXY_ORIGIN: &str = "https://proxy.example";

/// Base URL of a running mock upstream, e.g. `http://127.0.0.1:41234`.
#[derive(Clone)]
pub struct Upstream(pub String);

async fn page(State(Upstream(base)): State<Upstream>) -> Response {
    let html = format!(
        r#"<html><body><a href="{base}/foo">foo</a><img src="/img.png"></body></html>"#
    );
    (
        [
            (header::CONTENT_TYPE, "text/html; charset=utf-8"),
            (header::CONTENT_SECURITY_POLICY, "default-src 'self'"),
            (header::X_FRAME_OPTIONS, "DENY"),
        ],
        html,
    )
        .into_response()
}

async fn gzipped_page() -> Response {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    let _ = encoder.write_all(br#"<html><body><img src="/img.png"></body></html>"#);
    let body = encoder.finish().unwrap_or_default();
    (
        [
            (header::CONTENT_TYPE, "text/html"),
            (header::CONTENT_ENCODING, "gzip"),
        ],
        body,
    )
        .into_response()
}

async fn stylesheet() -> Response {
    (
        [(header::CONTENT_TYPE, "text/css")],
        "body{background:url(/bg.png)}",
    )
        .into_response()
}

async fn playlist() -> Response {
    (
        [(header::CONTENT_TYPE, "application/vnd.apple.mpegurl")],
        "#EXTM3U\n#EXTINF:4.0,\nsegment1.ts\n",
    )
        .into_response()
}

async fn video(headers: HeaderMap) -> Response {
    let range = headers
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("none")
        .to_string();
    (
        StatusCode::PARTIAL_CONTENT,
        [
            (header::CONTENT_TYPE, "video/mp4".to_string()),
            (header::CONTENT_RANGE, "bytes 0-99/1000".to_string()),
            (header::ACCEPT_RANGES, "bytes".to_string()),
            (header::HeaderName::from_static("x-seen-range"), range),
        ],
        vec![0u8; 100],
    )
        .into_response()
}

async fn echo_headers(headers: HeaderMap) -> Response {
    let seen: serde_json::Map<String, serde_json::Value> = headers
        .iter()
        .map(|(name, value)| {
            (
                name.to_string(),
                serde_json::Value::from(value.to_str().unwrap_or_default()),
            )
        })
        .collect();
    (
        [(header::CONTENT_TYPE, "application/json")],
        serde_json::Value::Object(seen).to_string(),
    )
        .into_response()
}

async fn redirect_same_origin() -> Response {
    (StatusCode::FOUND, [(header::LOCATION, "/new")]).into_response()
}

async fn redirect_cross_origin() -> Response {
    (StatusCode::FOUND, [(header::LOCATION, "https://other.example/")]).into_response()
}

async fn slow() -> Response {
    tokio::time::sleep(Duration::from_secs(3)).await;
    ([(header::CONTENT_TYPE, "text/plain")], "late").into_response()
}

/// Start the mock upstream on an ephemeral port.
pub async fn start_upstream() -> Upstream {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let upstream = Upstream(format!("http://{}", listener.local_addr().unwrap()));

    let app = Router::new()
        .route("/page", get(page))
        .route("/gz", get(gzipped_page))
        .route("/style.css", get(stylesheet))
        .route("/live/index.m3u8", get(playlist))
        .route("/video.mp4", get(video))
        .route("/headers", get(echo_headers))
        .route("/old", get(redirect_same_origin))
        .route("/away", get(redirect_cross_origin))
        .route("/slow", get(slow))
        .with_state(upstream.clone());

    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    upstream
}

/// Proxy config routing `/x` to `upstream`, with a fixed public origin.
pub fn proxy_config(upstream: &Upstream) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.listener.public_origin = Some(PROXY_ORIGIN.to_string());
    config.routes.insert("x".to_string(), upstream.0.clone());
    config
}

/// Start the proxy. The returned `Shutdown` stops it.
pub async fn start_proxy(config: ProxyConfig) -> (SocketAddr, Shutdown) {
    let listener = TcpListener::bind(&config.listener.bind_address).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = HttpServer::new(config).unwrap();

    let shutdown = Shutdown::new();
    let receiver = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, receiver).await;
    });
    (addr, shutdown)
}

/// Client that reports redirects instead of following them.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .no_proxy()
        .build()
        .unwrap()
}
