//! Route matching logic.
//!
//! # Responsibilities
//! - Match a request path against a normalized prefix
//! - Split the matched path into prefix and remainder
//!
//! # Design Decisions
//! - Path matching is case-sensitive
//! - Matches stop at segment boundaries: `/a` matches `/a` and `/a/x`,
//!   never `/ab`
//! - No regex to guarantee O(n) matching

/// Trait for matching request paths against conditions.
pub trait Matcher: Send + Sync + std::fmt::Debug {
    /// Returns true if the path matches this condition.
    fn matches(&self, path: &str) -> bool;
}

/// Matches a path prefix on segment boundaries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPrefixMatcher {
    prefix: String,
}

impl PathPrefixMatcher {
    /// Create a new path prefix matcher. `prefix` must already be
    /// normalized (leading `/`, no trailing `/`).
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// The prefix this matcher accepts.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The part of `path` after the prefix, if it matches.
    /// Returns `""` for an exact match and `"/..."` otherwise.
    pub fn remainder<'p>(&self, path: &'p str) -> Option<&'p str> {
        let rest = path.strip_prefix(self.prefix.as_str())?;
        if rest.is_empty() || rest.starts_with('/') {
            Some(rest)
        } else {
            None
        }
    }
}

impl Matcher for PathPrefixMatcher {
    fn matches(&self, path: &str) -> bool {
        self.remainder(path).is_some()
    }
}
