//! HLS playlist rewriting.
//!
//! Line oriented: directives (`#...`) and blank lines pass through, every
//! other line is a URI resolved against the playlist. Line endings,
//! including `\r\n`, are preserved.

use crate::rewrite::context::{parse_ref, RewriteContext, UrlRef};

fn rewrite_uri(ctx: &RewriteContext<'_>, uri: &str) -> Option<String> {
    match parse_ref(uri) {
        UrlRef::Absolute { authority, .. } | UrlRef::ProtocolRelative { authority, .. }
            if ctx.is_target(authority) =>
        {
            ctx.absolute(uri)
        }
        UrlRef::Absolute { .. } if ctx.embed_foreign => Some(ctx.embed(uri)),
        UrlRef::ProtocolRelative { .. } if ctx.embed_foreign => {
            Some(ctx.embed(&format!("{}:{uri}", ctx.target.scheme())))
        }
        UrlRef::RootRelative(_) => ctx.root_relative(uri),
        UrlRef::Relative(_) => ctx.relative(uri),
        _ => None,
    }
}

fn rewrite_line(ctx: &RewriteContext<'_>, line: &str) -> String {
    let (content, ending) = match line.strip_suffix('\r') {
        Some(content) => (content, "\r"),
        None => (line, ""),
    };
    let uri = content.trim();
    if uri.is_empty() || uri.starts_with('#') {
        return line.to_string();
    }
    match rewrite_uri(ctx, uri) {
        Some(rewritten) => format!("{rewritten}{ending}"),
        None => line.to_string(),
    }
}

/// Rewrite every URI line of a playlist.
pub fn rewrite_playlist(text: &str, ctx: &RewriteContext<'_>) -> String {
    text.split('\n')
        .map(|line| rewrite_line(ctx, line))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rewrite::context::tests::{ctx, target};

    #[test]
    fn test_relative_segment_and_directives() {
        let t = target("https://upstream.example/live/index.m3u8");
        let playlist = "#EXTM3U\n#EXTINF:4.0,\nsegment1.ts\n\n";
        assert_eq!(
            rewrite_playlist(playlist, &ctx(&t)),
            "#EXTM3U\n#EXTINF:4.0,\nhttps://proxy.example/x/live/segment1.ts\n\n"
        );
    }

    #[test]
    fn test_absolute_root_and_crlf() {
        let t = target("https://upstream.example/live/index.m3u8");
        let playlist = "#EXTM3U\r\nhttps://upstream.example/a/1.ts?t=9\r\n/b/2.ts\r\nhttps://cdn.example/3.ts\r\n";
        assert_eq!(
            rewrite_playlist(playlist, &ctx(&t)),
            "#EXTM3U\r\nhttps://proxy.example/x/a/1.ts?t=9\r\nhttps://proxy.example/x/b/2.ts\r\nhttps://cdn.example/3.ts\r\n"
        );
    }

    #[test]
    fn test_direct_mode_embeds_foreign_hosts() {
        let t = target("https://upstream.example/live/index.m3u8");
        let mut c = ctx(&t);
        c.mount = "/https://upstream.example";
        c.embed_foreign = true;
        let playlist = "low/index.m3u8\nhttps://cdn.example/3.ts\n//cdn.example/4.ts";
        assert_eq!(
            rewrite_playlist(playlist, &c),
            "https://proxy.example/https://upstream.example/live/low/index.m3u8\n\
             https://proxy.example/https://cdn.example/3.ts\n\
             https://proxy.example/https://cdn.example/4.ts"
        );
    }
}
