//! Route lookup.
//!
//! # Responsibilities
//! - Normalize configured prefix → origin pairs
//! - Look up the longest matching prefix for a path
//! - Return matched route or explicit no-match
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - Entries kept sorted by prefix length, longest first, so the first
//!   match is the most specific one regardless of configuration order
//! - Explicit no-match rather than silent default

use std::collections::BTreeMap;

use thiserror::Error;
use url::Url;

use crate::routing::matcher::{Matcher, PathPrefixMatcher};

/// Errors raised while building the routing table.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RoutingError {
    /// Key normalizes to an empty or root prefix.
    #[error("route key `{0}` does not name a path prefix")]
    EmptyPrefix(String),

    /// Value is not an absolute http(s) origin.
    #[error("route `{prefix}` has an invalid upstream `{value}`: {reason}")]
    InvalidOrigin {
        prefix: String,
        value: String,
        reason: String,
    },

    /// Two keys normalize to the same prefix.
    #[error("prefix `{0}` is configured more than once")]
    DuplicatePrefix(String),
}

/// Normalize a route key to `/key` without a trailing slash.
pub fn normalize_prefix(key: &str) -> Option<String> {
    let trimmed = key.trim().trim_end_matches('/');
    let trimmed = trimmed.trim_start_matches('/');
    if trimmed.is_empty() {
        return None;
    }
    Some(format!("/{trimmed}"))
}

/// Normalize a route value to an absolute origin string, prepending
/// `https://` when no scheme is given. Any path base is kept.
pub fn normalize_origin(value: &str) -> Result<String, String> {
    let trimmed = value.trim().trim_end_matches('/');
    let lower = trimmed.to_ascii_lowercase();
    let absolute = if lower.starts_with("http://") || lower.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };

    let parsed = Url::parse(&absolute).map_err(|e| e.to_string())?;
    if parsed.host_str().is_none() {
        return Err("missing host".to_string());
    }
    Ok(absolute)
}

/// A normalized prefix → origin mapping.
#[derive(Debug, Clone)]
pub struct RouteEntry {
    matcher: PathPrefixMatcher,
    target_origin: String,
}

impl RouteEntry {
    /// The normalized path prefix (e.g. `/groq`).
    pub fn prefix(&self) -> &str {
        self.matcher.prefix()
    }

    /// The normalized upstream origin, including any path base.
    pub fn target_origin(&self) -> &str {
        &self.target_origin
    }

    /// Build the upstream URL for an inbound path and query.
    /// Returns `None` when `path` is not under this prefix.
    pub fn target_url(&self, path: &str, query: Option<&str>) -> Option<Result<Url, url::ParseError>> {
        let remainder = self.matcher.remainder(path)?;
        let joined = format!("{}{}", self.target_origin, remainder);
        Some(Url::parse(&joined).map(|mut url| {
            url.set_query(query.filter(|q| !q.is_empty()));
            url
        }))
    }
}

/// Immutable prefix routing table.
#[derive(Debug, Clone, Default)]
pub struct RoutingTable {
    entries: Vec<RouteEntry>,
}

impl RoutingTable {
    /// Build the table from configured key → origin pairs.
    pub fn from_config(routes: &BTreeMap<String, String>) -> Result<Self, RoutingError> {
        let mut entries: Vec<RouteEntry> = Vec::with_capacity(routes.len());

        for (key, value) in routes {
            let prefix =
                normalize_prefix(key).ok_or_else(|| RoutingError::EmptyPrefix(key.clone()))?;
            let target_origin =
                normalize_origin(value).map_err(|reason| RoutingError::InvalidOrigin {
                    prefix: prefix.clone(),
                    value: value.clone(),
                    reason,
                })?;

            if entries.iter().any(|e| e.prefix() == prefix) {
                return Err(RoutingError::DuplicatePrefix(prefix));
            }

            entries.push(RouteEntry {
                matcher: PathPrefixMatcher::new(prefix),
                target_origin,
            });
        }

        entries.sort_by(|a, b| {
            b.prefix()
                .len()
                .cmp(&a.prefix().len())
                .then_with(|| a.prefix().cmp(b.prefix()))
        });

        tracing::debug!(routes = entries.len(), "Routing table built");
        Ok(Self { entries })
    }

    /// Find the longest prefix matching `path`.
    pub fn resolve(&self, path: &str) -> Option<&RouteEntry> {
        self.entries.iter().find(|e| e.matcher.matches(path))
    }

    /// Number of configured routes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no routes are configured.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(pairs: &[(&str, &str)]) -> RoutingTable {
        let routes = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        RoutingTable::from_config(&routes).unwrap()
    }

    #[test]
    fn test_normalization() {
        assert_eq!(normalize_prefix("groq").as_deref(), Some("/groq"));
        assert_eq!(normalize_prefix("/groq/").as_deref(), Some("/groq"));
        assert_eq!(normalize_prefix("/"), None);
        assert_eq!(normalize_prefix("  "), None);

        assert_eq!(
            normalize_origin("api.groq.com/openai").unwrap(),
            "https://api.groq.com/openai"
        );
        assert_eq!(
            normalize_origin("http://127.0.0.1:3000/").unwrap(),
            "http://127.0.0.1:3000"
        );
        assert!(normalize_origin("").is_err());
        assert!(normalize_origin("https://exa mple.com").is_err());
    }

    #[test]
    fn test_longest_prefix_wins() {
        let t = table(&[("a", "a.example"), ("ab", "ab.example")]);

        assert_eq!(t.resolve("/ab/x").unwrap().prefix(), "/ab");
        assert_eq!(t.resolve("/a/x").unwrap().prefix(), "/a");
        assert_eq!(t.resolve("/ab").unwrap().prefix(), "/ab");
        assert!(t.resolve("/abc").is_none());
    }

    #[test]
    fn test_nested_prefixes_prefer_specific() {
        let t = table(&[("gemini", "g.example"), ("gemini/v2", "v2.example")]);

        let route = t.resolve("/gemini/v2/models").unwrap();
        assert_eq!(route.prefix(), "/gemini/v2");
        assert_eq!(route.target_origin(), "https://v2.example");
        assert_eq!(t.resolve("/gemini/v1").unwrap().prefix(), "/gemini");
    }

    #[test]
    fn test_target_url_keeps_base_and_query() {
        let t = table(&[("groq", "api.groq.com/openai")]);
        let route = t.resolve("/groq/v1/chat").unwrap();

        let url = route.target_url("/groq/v1/chat", Some("stream=true")).unwrap().unwrap();
        assert_eq!(url.as_str(), "https://api.groq.com/openai/v1/chat?stream=true");

        let bare = route.target_url("/groq", None).unwrap().unwrap();
        assert_eq!(bare.as_str(), "https://api.groq.com/openai");
    }

    #[test]
    fn test_duplicate_and_invalid_entries() {
        let mut routes = BTreeMap::new();
        routes.insert("x".to_string(), "x.example".to_string());
        routes.insert("/x/".to_string(), "y.example".to_string());
        assert_eq!(
            RoutingTable::from_config(&routes).unwrap_err(),
            RoutingError::DuplicatePrefix("/x".to_string())
        );

        let mut routes = BTreeMap::new();
        routes.insert("/".to_string(), "x.example".to_string());
        assert!(matches!(
            RoutingTable::from_config(&routes),
            Err(RoutingError::EmptyPrefix(_))
        ));
    }
}
