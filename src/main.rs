//! Rewriting reverse proxy.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ http::server ──▶ http::context ──▶ routing (prefix / generic / direct)
//!                                                            │
//!                                                            ▼
//!                                     http::request ──▶ http::client ──▶ Upstream
//!                                                                           │
//!     Client Response                                                       ▼
//!     ◀────────────── http::response ◀── rewrite engine ◀── classify ◀── response head
//!                     (CORS, cache,       (HTML, CSS, JS,
//!                      Location)           HLS, special rules)
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use rewrite_proxy::config::{load_config, LogFormat, ProxyConfig};
use rewrite_proxy::lifecycle::{wait_for_signal, Shutdown};
use rewrite_proxy::observability::{logging, metrics};
use rewrite_proxy::HttpServer;

#[derive(Debug, Parser)]
#[command(name = "rewrite-proxy", version, about = "Rewriting reverse proxy")]
struct Args {
    /// TOML configuration file. Defaults apply when omitted.
    #[arg(short, long, env = "PROXY_CONFIG")]
    config: Option<PathBuf>,

    /// Log output format, overriding the configuration file.
    #[arg(long, value_enum)]
    log_format: Option<LogFormat>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };

    let format = args.log_format.unwrap_or(config.observability.log_format);
    logging::init_logging(&config.observability, format);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "rewrite-proxy starting");
    tracing::info!(
        config = ?args.config,
        bind_address = %config.listener.bind_address,
        public_origin = ?config.listener.public_origin,
        routes = config.routes.len(),
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let addr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let server = HttpServer::new(config)?;

    let shutdown = Shutdown::new();
    let receiver = shutdown.subscribe();
    tokio::spawn(async move {
        wait_for_signal().await;
        shutdown.trigger();
    });

    server.run(listener, receiver).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
