//! Rewriting reverse proxy library.
//!
//! Maps path prefixes onto upstream origins and rewrites HTML, CSS,
//! JavaScript and HLS playlists so every URL they contain routes back
//! through the proxy. Also serves `/proxy/{url}` and `/{absolute-url}`
//! passthrough forms.

pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod rewrite;
pub mod routing;
pub mod security;

pub use config::ProxyConfig;
pub use error::ProxyError;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
