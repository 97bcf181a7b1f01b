//! Redirect rewriting.
//!
//! # Responsibilities
//! - Keep same-origin redirects inside the proxy
//! - Leave cross-origin redirects alone in prefix and generic modes
//! - Route every redirect that reaches a direct-mode client back through
//!   the proxy
//!
//! # Design Decisions
//! - A `Location` that does not resolve is passed through unmodified
//! - A same-origin `Location` outside the route's origin path cannot be
//!   expressed under the prefix; it uses the `/proxy/` form when generic
//!   mode is on and is passed through otherwise

use axum::http::StatusCode;
use url::{Position, Url};

use crate::http::context::{ProxyContext, ProxyMode};
use crate::routing::direct::GENERIC_PREFIX;

fn same_origin(a: &Url, b: &Url) -> bool {
    a.origin() == b.origin()
}

fn generic_form(proxy_origin: &str, url: &Url) -> String {
    format!(
        "{proxy_origin}{GENERIC_PREFIX}{}",
        urlencoding::encode(url.as_str())
    )
}

/// The rewritten `Location`, or `None` to keep the upstream value.
pub fn rewrite_location(
    status: StatusCode,
    location: &str,
    ctx: &ProxyContext,
    generic_enabled: bool,
) -> Option<String> {
    if !status.is_redirection() {
        return None;
    }
    let resolved = match ctx.target.join(location) {
        Ok(url) => url,
        Err(e) => {
            tracing::debug!(location, error = %e, "Unresolvable Location, passing through");
            return None;
        }
    };

    match ctx.mode {
        ProxyMode::Prefixed if same_origin(&resolved, &ctx.target) => ctx
            .rewrite_context()
            .proxy_path(&resolved[Position::BeforePath..Position::AfterQuery])
            .or_else(|| generic_enabled.then(|| generic_form(&ctx.proxy_origin, &resolved))),
        ProxyMode::Generic if same_origin(&resolved, &ctx.target) => {
            Some(generic_form(&ctx.proxy_origin, &resolved))
        }
        ProxyMode::Direct if generic_enabled => Some(generic_form(&ctx.proxy_origin, &resolved)),
        ProxyMode::Direct => Some(ctx.rewrite_context().embed(resolved.as_str())),
        _ => None,
    }
}
