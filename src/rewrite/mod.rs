//! Body rewriting subsystem.
//!
//! # Data Flow
//! ```text
//! upstream response (content-type, path)
//!     → classify.rs (Html | Css | Js | HlsPlaylist | Media | Opaque)
//!     → Media / Opaque: streamed untouched, never buffered
//!     → textual classes, fully buffered and decoded:
//!         Html → html.rs pass → special.rs passes for the host → runtime_patch.rs
//!         Css  → css.rs pass
//!         Js   → js.rs pass
//!         Hls  → hls.rs line rewriter
//! ```
//!
//! # Design Decisions
//! - Every pass is an ordered list of compiled rules, built once at
//!   startup and shared read-only across requests
//! - Rules are pure functions of their match and the [`RewriteContext`]
//! - Each body is rewritten exactly once per response

pub mod classify;
pub mod context;
pub mod css;
pub mod hls;
pub mod html;
pub mod js;
pub mod rule;
pub mod runtime_patch;
pub mod special;

pub use classify::{classify, ContentClass};
pub use context::RewriteContext;
pub use rule::{RewritePass, RewriteRule};
pub use special::SpecialRuleRegistry;

use crate::config::schema::SpecialRuleSetConfig;

/// Compiled rewrite passes for every content class.
#[derive(Debug)]
pub struct RewriteEngine {
    html: RewritePass,
    css: RewritePass,
    js: RewritePass,
    special: SpecialRuleRegistry,
}

impl RewriteEngine {
    pub fn new(special: &[SpecialRuleSetConfig]) -> Result<Self, regex::Error> {
        Ok(Self {
            html: html::pass()?,
            css: css::pass()?,
            js: js::pass()?,
            special: SpecialRuleRegistry::from_config(special)?,
        })
    }

    pub fn special_rules(&self) -> &SpecialRuleRegistry {
        &self.special
    }

    /// Rewrite a decoded body. Returns `None` for classes that are never
    /// rewritten.
    pub fn rewrite(
        &self,
        class: ContentClass,
        text: &str,
        ctx: &RewriteContext<'_>,
    ) -> Option<String> {
        let rewritten = match class {
            ContentClass::Html => {
                let mut out = self.html.run(text, ctx);
                for pass in self.special.rules_for(ctx.target_host()) {
                    out = pass.run(&out, ctx);
                }
                runtime_patch::inject(out, ctx)
            }
            ContentClass::Css => self.css.run(text, ctx),
            ContentClass::Js => self.js.run(text, ctx),
            ContentClass::HlsPlaylist => hls::rewrite_playlist(text, ctx),
            ContentClass::Media | ContentClass::Opaque => return None,
        };
        Some(rewritten)
    }
}
