//! HTML rewriting.
//!
//! # Pass Order
//! ```text
//!  1. href|src|action|content = absolute URL on the target host
//!  2. same attributes, protocol-relative on the target host
//!  3. same attributes, root-relative
//!  4. CSS url(...) in absolute, protocol-relative and root-relative form
//!  5. <base href> pointing at the target
//!  6. bare relative href|src|action|data-src|data-href
//!  7. JSON fields "url"|"path"|"endpoint"|"src"|"href"
//!  8. string literals inside inline <script> blocks
//!  9. srcset candidates
//! ```
//! Host-specific passes and the runtime patch run after this pass (see
//! [`RewriteEngine`](crate::rewrite::RewriteEngine)).
//!
//! Absolute rules run before root-relative ones: a rewritten URL is
//! absolute on the proxy origin and no later rule touches it again.

use std::borrow::Cow;

use regex::{Captures, Regex};

use crate::rewrite::context::{parse_ref, RewriteContext, UrlRef};
use crate::rewrite::css;
use crate::rewrite::rule::{quoted, RewritePass, RewriteRule, ValueFn};

const URL_ATTRS: &str = "href|src|action|content";
const RELATIVE_ATTRS: &str = "data-src|data-href|href|src|action";

/// `attr="value"` / `attr='value'` with the quote style preserved.
fn attr_rule(name: &str, attrs: &str, f: ValueFn) -> Result<RewriteRule, regex::Error> {
    let pattern = format!(r#"(?i)\b({attrs})(\s*=\s*)(?:"([^"]*)"|'([^']*)')"#);
    RewriteRule::func(name, &pattern, move |caps, ctx| {
        let (value, quote) = quoted(caps, 3, 4)?;
        let rewritten = f(ctx, value)?;
        Some(format!("{}{}{quote}{rewritten}{quote}", &caps[1], &caps[2]))
    })
}

fn absolute_only(ctx: &RewriteContext<'_>, value: &str) -> Option<String> {
    match parse_ref(value) {
        UrlRef::Absolute { .. } => ctx.absolute(value),
        _ => None,
    }
}

fn base_tag_rule() -> Result<RewriteRule, regex::Error> {
    RewriteRule::func(
        "base-tag",
        r#"(?i)<base\b[^>]*?\bhref\s*=\s*(?:"([^"]*)"|'([^']*)')[^>]*>"#,
        |caps, ctx| {
            let (href, _) = quoted(caps, 1, 2)?;
            let base = ctx.base();
            let points_at_target = ctx.absolute(href).is_some() || href.starts_with(&base);
            points_at_target.then(|| format!(r#"<base href="{base}/">"#))
        },
    )
}

fn json_field_rule() -> Result<RewriteRule, regex::Error> {
    RewriteRule::func(
        "json-fields",
        r#"(?i)("(?:url|path|endpoint|src|href)"\s*:\s*")([^"]*)(")"#,
        |caps, ctx| {
            let rewritten = ctx.any_rooted(&caps[2])?;
            Some(format!("{}{rewritten}{}", &caps[1], &caps[3]))
        },
    )
}

/// Root-relative paths with at least two segments (`/a/b`), so short
/// strings like `"/"` or `"/x"` survive.
fn looks_like_resource_path(value: &str) -> bool {
    value
        .strip_prefix('/')
        .and_then(|rest| rest.split_once('/'))
        .is_some_and(|(first, _)| !first.is_empty())
}

fn script_literal(ctx: &RewriteContext<'_>, value: &str) -> Option<String> {
    ctx.absolute(value).or_else(|| {
        looks_like_resource_path(value)
            .then(|| ctx.root_relative(value))
            .flatten()
    })
}

fn inline_script_rule() -> Result<RewriteRule, regex::Error> {
    let literal = Regex::new(r#""([^"\\\r\n]*)"|'([^'\\\r\n]*)'"#)?;
    RewriteRule::func(
        "inline-script-literals",
        r"(?is)(<script\b[^>]*>)(.*?)(</script\s*>)",
        move |caps, ctx| {
            let body = literal.replace_all(&caps[2], |lit: &Captures<'_>| {
                match quoted(lit, 1, 2) {
                    Some((value, quote)) => match script_literal(ctx, value) {
                        Some(rewritten) => format!("{quote}{rewritten}{quote}"),
                        None => lit[0].to_string(),
                    },
                    None => lit[0].to_string(),
                }
            });
            match body {
                Cow::Borrowed(_) => None,
                Cow::Owned(body) => Some(format!("{}{body}{}", &caps[1], &caps[3])),
            }
        },
    )
}

/// Split a srcset into `(url, descriptor)` candidates. URLs are runs of
/// non-whitespace, so commas inside `data:` URLs stay in the URL.
fn srcset_candidates(value: &str) -> Vec<(&str, &str)> {
    let mut candidates = Vec::new();
    let mut rest = value;
    loop {
        rest = rest.trim_start_matches(|c: char| c.is_whitespace() || c == ',');
        if rest.is_empty() {
            break;
        }
        let url_end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        let (url, after) = rest.split_at(url_end);
        if url.ends_with(',') {
            candidates.push((url.trim_end_matches(','), ""));
            rest = after;
            continue;
        }
        let desc_end = after.find(',').unwrap_or(after.len());
        candidates.push((url, after[..desc_end].trim()));
        rest = &after[desc_end..];
    }
    candidates
}

fn srcset_candidate(ctx: &RewriteContext<'_>, url: &str, descriptor: &str) -> String {
    let url = ctx.any_rooted(url).unwrap_or_else(|| url.to_string());
    if descriptor.is_empty() {
        url
    } else {
        format!("{url} {descriptor}")
    }
}

fn srcset_rule() -> Result<RewriteRule, regex::Error> {
    RewriteRule::func(
        "srcset",
        r#"(?i)\b(srcset\s*=\s*)(?:"([^"]*)"|'([^']*)')"#,
        |caps, ctx| {
            let (value, quote) = quoted(caps, 2, 3)?;
            let rewritten = srcset_candidates(value)
                .into_iter()
                .map(|(url, descriptor)| srcset_candidate(ctx, url, descriptor))
                .collect::<Vec<_>>()
                .join(", ");
            Some(format!("{}{quote}{rewritten}{quote}", &caps[1]))
        },
    )
}

/// Build the generic HTML pass.
pub fn pass() -> Result<RewritePass, regex::Error> {
    Ok(RewritePass::new(vec![
        attr_rule("attr-absolute", URL_ATTRS, absolute_only)?,
        attr_rule("attr-protocol-relative", URL_ATTRS, |ctx, v| ctx.protocol_relative(v))?,
        attr_rule("attr-root-relative", URL_ATTRS, |ctx, v| ctx.root_relative(v))?,
        css::url_rule("html-css-url", |ctx, v| ctx.any_rooted(v))?,
        base_tag_rule()?,
        attr_rule("attr-relative", RELATIVE_ATTRS, |ctx, v| ctx.relative(v))?,
        json_field_rule()?,
        inline_script_rule()?,
        srcset_rule()?,
    ]))
}
