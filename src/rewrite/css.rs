//! CSS rewriting.
//!
//! `url(...)` and `@import "..."` references in absolute,
//! protocol-relative and root-relative form, then references relative to
//! the stylesheet's directory. `data:` URIs and fragments are left alone.

use crate::rewrite::rule::{quoted, RewritePass, RewriteRule, ValueFn};

/// `url(...)` with double, single or no quotes. The quote style is kept.
pub(crate) fn url_rule(name: &str, f: ValueFn) -> Result<RewriteRule, regex::Error> {
    RewriteRule::func(
        name,
        r#"(?i)\burl\(\s*(?:"([^"]*)"|'([^']*)'|([^)"'\s]*))\s*\)"#,
        move |caps, ctx| {
            let (value, quote) = if let Some(m) = caps.get(1) {
                (m.as_str(), "\"")
            } else if let Some(m) = caps.get(2) {
                (m.as_str(), "'")
            } else {
                (caps.get(3)?.as_str(), "")
            };
            let rewritten = f(ctx, value)?;
            Some(format!("url({quote}{rewritten}{quote})"))
        },
    )
}

fn import_rule(name: &str, f: ValueFn) -> Result<RewriteRule, regex::Error> {
    RewriteRule::func(
        name,
        r#"(?i)(@import\s+)(?:"([^"]*)"|'([^']*)')"#,
        move |caps, ctx| {
            let (value, quote) = quoted(caps, 2, 3)?;
            let rewritten = f(ctx, value)?;
            Some(format!("{}{quote}{rewritten}{quote}", &caps[1]))
        },
    )
}

/// Build the stylesheet pass.
pub fn pass() -> Result<RewritePass, regex::Error> {
    Ok(RewritePass::new(vec![
        url_rule("css-url", |ctx, v| ctx.any_rooted(v))?,
        url_rule("css-url-relative", |ctx, v| ctx.relative(v))?,
        import_rule("css-import", |ctx, v| ctx.any(v))?,
    ]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rewrite::context::tests::{ctx, target};

    fn rewrite(css: &str) -> String {
        let t = target("https://upstream.example/assets/css/site.css");
        pass().unwrap().run(css, &ctx(&t))
    }

    #[test]
    fn test_rooted_urls() {
        assert_eq!(
            rewrite("a{background:url(https://upstream.example/i.png)}"),
            "a{background:url(https://proxy.example/x/i.png)}"
        );
        assert_eq!(
            rewrite(r#"a{background:url("//upstream.example/i.png")}"#),
            r#"a{background:url("https://proxy.example/x/i.png")}"#
        );
        assert_eq!(
            rewrite("a{background:url( '/i.png' )}"),
            "a{background:url('https://proxy.example/x/i.png')}"
        );
    }

    #[test]
    fn test_relative_to_stylesheet_directory() {
        assert_eq!(
            rewrite("@font-face{src:url(../fonts/a.woff2)}"),
            "@font-face{src:url(https://proxy.example/x/assets/fonts/a.woff2)}"
        );
        assert_eq!(
            rewrite("a{b:url(img/x.svg#icon)}"),
            "a{b:url(https://proxy.example/x/assets/css/img/x.svg#icon)}"
        );
    }

    #[test]
    fn test_skips_data_and_foreign() {
        let css = "a{b:url(data:image/png;base64,AA);c:url(https://cdn.example/x.png);d:url(#clip)}";
        assert_eq!(rewrite(css), css);
    }

    #[test]
    fn test_import() {
        assert_eq!(
            rewrite(r#"@import "theme.css"; @import url('/base.css');"#),
            r#"@import "https://proxy.example/x/assets/css/theme.css"; @import url('https://proxy.example/x/base.css');"#
        );
    }
}
