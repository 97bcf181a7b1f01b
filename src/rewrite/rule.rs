//! Rewrite rules and passes.
//!
//! A [`RewriteRule`] is a compiled pattern plus a pure transform of its
//! match. A [`RewritePass`] is an ordered list of rules folded left to
//! right over one buffer.

use std::borrow::Cow;
use std::fmt;

use regex::{Captures, Regex};

use crate::rewrite::context::RewriteContext;

/// Maps one URL value to its rewritten form.
pub type ValueFn = fn(&RewriteContext<'_>, &str) -> Option<String>;

type TransformFn = dyn Fn(&Captures<'_>, &RewriteContext<'_>) -> Option<String> + Send + Sync;

/// How a match is replaced.
pub enum Transform {
    /// Computed replacement. `None` leaves the match as it was.
    Func(Box<TransformFn>),
    /// Regex replacement template with `{proxy_origin}`, `{prefix}` and
    /// `{target_host}` placeholders.
    Template(String),
}

impl fmt::Debug for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Func(_) => f.write_str("Func(..)"),
            Self::Template(t) => f.debug_tuple("Template").field(t).finish(),
        }
    }
}

/// One pattern and its transform.
#[derive(Debug)]
pub struct RewriteRule {
    name: String,
    pattern: Regex,
    transform: Transform,
}

impl RewriteRule {
    pub fn func<F>(name: impl Into<String>, pattern: &str, f: F) -> Result<Self, regex::Error>
    where
        F: Fn(&Captures<'_>, &RewriteContext<'_>) -> Option<String> + Send + Sync + 'static,
    {
        Ok(Self {
            name: name.into(),
            pattern: Regex::new(pattern)?,
            transform: Transform::Func(Box::new(f)),
        })
    }

    pub fn template(
        name: impl Into<String>,
        pattern: &str,
        template: impl Into<String>,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            name: name.into(),
            pattern: Regex::new(pattern)?,
            transform: Transform::Template(template.into()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Apply the rule to every match in `text`.
    pub fn apply<'t>(&self, text: &'t str, ctx: &RewriteContext<'_>) -> Cow<'t, str> {
        match &self.transform {
            Transform::Func(f) => self.pattern.replace_all(text, |caps: &Captures<'_>| {
                f(caps, ctx).unwrap_or_else(|| caps[0].to_string())
            }),
            Transform::Template(template) => {
                let expanded = expand_placeholders(template, ctx);
                self.pattern.replace_all(text, expanded.as_str())
            }
        }
    }
}

fn expand_placeholders(template: &str, ctx: &RewriteContext<'_>) -> String {
    template
        .replace("{proxy_origin}", ctx.proxy_origin)
        .replace("{prefix}", ctx.mount)
        .replace("{target_host}", ctx.target_host())
}

/// An ordered sequence of rules applied to one buffer.
#[derive(Debug, Default)]
pub struct RewritePass {
    rules: Vec<RewriteRule>,
}

impl RewritePass {
    pub fn new(rules: Vec<RewriteRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[RewriteRule] {
        &self.rules
    }

    /// Fold every rule over `input`, in order.
    pub fn run(&self, input: &str, ctx: &RewriteContext<'_>) -> String {
        let mut text = input.to_owned();
        for rule in &self.rules {
            let next = match rule.apply(&text, ctx) {
                Cow::Owned(s) => Some(s),
                Cow::Borrowed(_) => None,
            };
            if let Some(s) = next {
                tracing::trace!(rule = rule.name(), "Rewrite rule matched");
                text = s;
            }
        }
        text
    }
}

/// Pick the value of a `"..."` / `'...'` alternation.
pub(crate) fn quoted<'c>(caps: &'c Captures<'_>, double: usize, single: usize) -> Option<(&'c str, char)> {
    if let Some(m) = caps.get(double) {
        Some((m.as_str(), '"'))
    } else {
        caps.get(single).map(|m| (m.as_str(), '\''))
    }
}
