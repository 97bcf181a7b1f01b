//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): requests by mode, method, status
//! - `proxy_request_duration_seconds` (histogram): latency by mode
//! - `proxy_rewrites_total` (counter): rewritten bodies by content class
//! - `proxy_upstream_errors_total` (counter): failed upstream exchanges by mode
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed, so tests and
//!   metrics-disabled deployments pay nothing

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Start the Prometheus scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// Record a finished request.
pub fn record_request(mode: &'static str, method: &str, status: u16, start: Instant) {
    counter!(
        "proxy_requests_total",
        "mode" => mode,
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("proxy_request_duration_seconds", "mode" => mode)
        .record(start.elapsed().as_secs_f64());
}

/// Record a rewritten body.
pub fn record_rewrite(class: &'static str) {
    counter!("proxy_rewrites_total", "class" => class).increment(1);
}

/// Record an upstream failure.
pub fn record_upstream_error(mode: &'static str, kind: &'static str) {
    counter!("proxy_upstream_errors_total", "mode" => mode, "kind" => kind).increment(1);
}
