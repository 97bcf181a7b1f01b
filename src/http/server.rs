//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with a single catch-all handler
//! - Wire up middleware (request ID, tracing)
//! - Answer CORS preflights and dispatch to the proxy modes
//! - Serve until the shutdown channel fires

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderName, Method, Request, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::ProxyConfig;
use crate::http::client::UpstreamClient;
use crate::http::context::{self, DispatchOptions, ProxyContext};
use crate::http::proxy;
use crate::http::request::Forwarding;
use crate::http::response::preflight;
use crate::observability::metrics;
use crate::rewrite::RewriteEngine;
use crate::routing::{RoutingError, RoutingTable};
use crate::security::headers::client_ip;

const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Failures while building the server from a validated config.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid route table: {0}")]
    Routing(#[from] RoutingError),

    #[error("invalid special rule pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("failed to build upstream client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub routes: Arc<RoutingTable>,
    pub engine: Arc<RewriteEngine>,
    pub client: UpstreamClient,
    pub config: Arc<ProxyConfig>,
}

impl AppState {
    pub fn new(config: ProxyConfig) -> Result<Self, StartupError> {
        let routes = RoutingTable::from_config(&config.routes)?;
        let engine = RewriteEngine::new(&config.special_rules)?;
        let client = UpstreamClient::new(&config.timeouts, &config.direct)?;

        tracing::info!(
            routes = routes.len(),
            special_hosts = engine.special_rules().len(),
            generic = config.generic.enabled,
            direct = config.direct.enabled,
            "Proxy state initialized"
        );

        Ok(Self {
            routes: Arc::new(routes),
            engine: Arc::new(engine),
            client,
            config: Arc::new(config),
        })
    }

    fn dispatch_options(&self) -> DispatchOptions {
        DispatchOptions {
            generic: self.config.generic.enabled,
            direct: self.config.direct.enabled,
        }
    }
}

/// HTTP server for the rewriting proxy.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(config: ProxyConfig) -> Result<Self, StartupError> {
        let state = AppState::new(config)?;
        Ok(Self {
            router: Self::build_router(state),
        })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .fallback(proxy_handler)
            .with_state(state)
            .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid))
    }

    /// The router, for serving it elsewhere or driving it in tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve on `listener` until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Catch-all handler: preflight, dispatch, forward.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let method = request.method().clone();

    if method == Method::OPTIONS {
        return preflight();
    }

    let config = &state.config;
    let origin = context::proxy_origin(
        config.listener.public_origin.as_deref(),
        request.headers(),
        request.uri(),
    );
    let ctx = match ProxyContext::resolve(&state.routes, state.dispatch_options(), origin, request.uri()) {
        Ok(Some(ctx)) => ctx,
        Ok(None) => {
            tracing::debug!(path = %request.uri().path(), "No route matched");
            metrics::record_request("none", method.as_str(), 404, start);
            return (StatusCode::NOT_FOUND, "No matching route found").into_response();
        }
        Err(e) => {
            tracing::warn!(path = %request.uri().path(), error = %e, "Unresolvable target");
            metrics::record_request("none", method.as_str(), 502, start);
            return e.into_response();
        }
    };

    let forwarding = Forwarding {
        client_ip: client_ip(&request, &config.forwarding.client_ip_headers),
        host: context::inbound_host(request.headers(), request.uri()),
        proto: context::inbound_proto(request.headers(), request.uri()),
    };

    let response = match proxy::forward(&state, &ctx, request, forwarding).await {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(
                mode = ctx.mode.as_str(),
                target = %ctx.target,
                error = %e,
                "Upstream exchange failed"
            );
            metrics::record_upstream_error(ctx.mode.as_str(), e.kind());
            e.into_response()
        }
    };

    metrics::record_request(ctx.mode.as_str(), method.as_str(), response.status().as_u16(), start);
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use tower::ServiceExt;

    fn server(direct: bool) -> HttpServer {
        let mut config = ProxyConfig::default();
        config.routes.insert("x".to_string(), "upstream.example".to_string());
        config.direct.enabled = direct;
        HttpServer::new(config).unwrap()
    }

    fn request(method: Method, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("host", "proxy.local")
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_options_is_preflight() {
        let response = server(true)
            .router()
            .oneshot(request(Method::OPTIONS, "/x/anything"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(response.headers()["access-control-allow-origin"], "*");
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn test_non_url_direct_path_is_bad_gateway() {
        let response = server(true)
            .router()
            .oneshot(request(Method::GET, "/not-a-url"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert!(String::from_utf8_lossy(&body).starts_with("Proxy error: "));
    }

    #[tokio::test]
    async fn test_unclaimed_path_is_not_found() {
        let response = server(false)
            .router()
            .oneshot(request(Method::GET, "/not-a-url"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_bad_special_rule_fails_startup() {
        let mut config = ProxyConfig::default();
        config.special_rules.push(crate::config::schema::SpecialRuleSetConfig {
            host: "a.example".into(),
            rules: vec![crate::config::schema::SpecialRuleConfig {
                pattern: "(".into(),
                template: String::new(),
            }],
        });
        assert!(matches!(HttpServer::new(config), Err(StartupError::Pattern(_))));
    }
}
