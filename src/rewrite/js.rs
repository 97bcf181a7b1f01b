//! JavaScript rewriting.
//!
//! Only string literals are touched: absolute or protocol-relative URLs on
//! the target host, and root-relative paths that end in a static asset
//! extension. Other root-relative strings are too ambiguous to rewrite.

use crate::rewrite::context::RewriteContext;
use crate::rewrite::rule::{quoted, RewritePass, RewriteRule};

const ASSET_EXTENSIONS: [&str; 18] = [
    "js", "css", "png", "jpg", "jpeg", "gif", "svg", "webp", "ico", "mp3", "mp4", "webm", "ogg",
    "woff", "woff2", "ttf", "eot", "m3u8",
];

fn is_asset_path(value: &str) -> bool {
    value
        .rsplit_once('.')
        .is_some_and(|(_, ext)| ASSET_EXTENSIONS.iter().any(|e| ext.eq_ignore_ascii_case(e)))
}

fn literal(ctx: &RewriteContext<'_>, value: &str) -> Option<String> {
    ctx.absolute(value).or_else(|| {
        if is_asset_path(value) {
            ctx.root_relative(value)
        } else {
            None
        }
    })
}

/// Build the script pass.
pub fn pass() -> Result<RewritePass, regex::Error> {
    Ok(RewritePass::new(vec![RewriteRule::func(
        "js-string-literals",
        r#""([^"\\\r\n]*)"|'([^'\\\r\n]*)'"#,
        |caps, ctx| {
            let (value, quote) = quoted(caps, 1, 2)?;
            let rewritten = literal(ctx, value)?;
            Some(format!("{quote}{rewritten}{quote}"))
        },
    )?]))
}
