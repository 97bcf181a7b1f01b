//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, preflight, dispatch)
//!     → context.rs (proxy origin, mode, upstream URL)
//!     → proxy.rs
//!         → request.rs (outbound headers)
//!         → client.rs (upstream exchange)
//!         → encoding.rs + rewrite engine (textual bodies)
//!         → redirect.rs (Location)
//!         → response.rs (headers, CORS, cache policy)
//!     → Send to client
//! ```

pub mod client;
pub mod context;
pub mod encoding;
pub mod proxy;
pub mod redirect;
pub mod request;
pub mod response;
pub mod server;

pub use context::{ProxyContext, ProxyMode};
pub use server::{AppState, HttpServer, StartupError};
