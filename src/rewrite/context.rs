//! Per-response rewrite context and URL reference helpers.

use url::{Position, Url};

/// Shape of a URL reference found in a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlRef<'a> {
    /// `http(s)://authority/rest`
    Absolute {
        authority: &'a str,
        rest: &'a str,
    },
    /// `//authority/rest`
    ProtocolRelative {
        authority: &'a str,
        rest: &'a str,
    },
    /// `/path`
    RootRelative(&'a str),
    /// `path`, `../path`, `?query`
    Relative(&'a str),
    /// Fragments, empty values, and other schemes (`data:`, `mailto:`, ...).
    Other,
}

fn split_authority(s: &str) -> (&str, &str) {
    let end = s.find(['/', '?', '#']).unwrap_or(s.len());
    s.split_at(end)
}

fn scheme_of(value: &str) -> Option<&str> {
    let colon = value.find(':')?;
    let scheme = &value[..colon];
    let mut chars = scheme.chars();
    let first = chars.next()?;
    if first.is_ascii_alphabetic()
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
    {
        Some(scheme)
    } else {
        None
    }
}

/// Classify a reference.
pub fn parse_ref(value: &str) -> UrlRef<'_> {
    let value = value.trim();
    if value.is_empty() || value.starts_with('#') {
        return UrlRef::Other;
    }
    if let Some(rest) = value.strip_prefix("//") {
        let (authority, rest) = split_authority(rest);
        return UrlRef::ProtocolRelative { authority, rest };
    }
    if value.starts_with('/') {
        return UrlRef::RootRelative(value);
    }
    match scheme_of(value) {
        Some(scheme) if scheme.eq_ignore_ascii_case("http") || scheme.eq_ignore_ascii_case("https") => {
            match value[scheme.len() + 1..].strip_prefix("//") {
                Some(rest) => {
                    let (authority, rest) = split_authority(rest);
                    UrlRef::Absolute { authority, rest }
                }
                None => UrlRef::Other,
            }
        }
        Some(_) => UrlRef::Other,
        None => UrlRef::Relative(value),
    }
}

/// Where rewritten URLs point and what counts as the upstream.
///
/// `mount` is the path every rewritten URL lives under: the route prefix
/// (`/x`) for prefix routing, or `/` plus the target origin
/// (`/https://upstream.example`) for direct mode.
#[derive(Debug, Clone)]
pub struct RewriteContext<'a> {
    pub proxy_origin: &'a str,
    pub mount: &'a str,
    pub target: &'a Url,
    /// Path base of the configured origin (`/openai` for
    /// `api.groq.com/openai`), empty when none.
    pub origin_path: &'a str,
    /// Route playlist entries on other hosts through direct mode.
    pub embed_foreign: bool,
}

impl<'a> RewriteContext<'a> {
    /// `{proxy_origin}{mount}`
    pub fn base(&self) -> String {
        format!("{}{}", self.proxy_origin, self.mount)
    }

    pub fn target_host(&self) -> &str {
        self.target.host_str().unwrap_or_default()
    }

    /// Same host and effective port as the target. An explicit default
    /// port (`:443` for https) matches an implicit one.
    pub fn is_target(&self, authority: &str) -> bool {
        if authority.is_empty() || authority.contains('@') {
            return false;
        }
        let Ok(candidate) = Url::parse(&format!("{}://{authority}/", self.target.scheme())) else {
            return false;
        };
        candidate.host() == self.target.host()
            && candidate.port_or_known_default() == self.target.port_or_known_default()
    }

    /// Map an upstream path (with query and fragment) to its proxied URL.
    /// `None` when the path lies outside the route's origin path, since
    /// the proxied form would resolve to a different upstream URL.
    pub fn proxy_path(&self, path: &str) -> Option<String> {
        let path = match path.chars().next() {
            Some('/') => path.to_string(),
            _ => format!("/{path}"),
        };
        let stripped = if self.origin_path.is_empty() {
            path.as_str()
        } else {
            match path.strip_prefix(self.origin_path) {
                Some(rest) if rest.is_empty() || rest.starts_with(['/', '?', '#']) => rest,
                _ => return None,
            }
        };
        let stripped = if stripped.starts_with('/') {
            stripped.to_string()
        } else {
            format!("/{stripped}")
        };
        Some(format!("{}{}{}", self.proxy_origin, self.mount, stripped))
    }

    /// Absolute or protocol-relative references to the target host.
    pub fn absolute(&self, value: &str) -> Option<String> {
        match parse_ref(value) {
            UrlRef::Absolute { authority, rest } | UrlRef::ProtocolRelative { authority, rest }
                if self.is_target(authority) =>
            {
                self.proxy_path(rest)
            }
            _ => None,
        }
    }

    /// Protocol-relative references to the target host only.
    pub fn protocol_relative(&self, value: &str) -> Option<String> {
        match parse_ref(value) {
            UrlRef::ProtocolRelative { authority, rest } if self.is_target(authority) => {
                self.proxy_path(rest)
            }
            _ => None,
        }
    }

    /// Root-relative references.
    pub fn root_relative(&self, value: &str) -> Option<String> {
        match parse_ref(value) {
            UrlRef::RootRelative(path) => self.proxy_path(path),
            _ => None,
        }
    }

    /// Bare relative references, resolved against the current document.
    pub fn relative(&self, value: &str) -> Option<String> {
        match parse_ref(value) {
            UrlRef::Relative(rel) => {
                let joined = self.target.join(rel).ok()?;
                self.proxy_path(&joined[Position::BeforePath..])
            }
            _ => None,
        }
    }

    /// Absolute, protocol-relative or root-relative.
    pub fn any_rooted(&self, value: &str) -> Option<String> {
        self.absolute(value).or_else(|| self.root_relative(value))
    }

    /// Any reference that resolves onto the target.
    pub fn any(&self, value: &str) -> Option<String> {
        self.any_rooted(value).or_else(|| self.relative(value))
    }

    /// Route a URL on another host through direct mode.
    pub fn embed(&self, absolute: &str) -> String {
        format!("{}/{}", self.proxy_origin, absolute)
    }
}
