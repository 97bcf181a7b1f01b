//! Content classification.
//!
//! Picks the rewrite strategy for a response from its `Content-Type` and
//! the request path. HLS playlists are recognized by MIME type or by a
//! `.m3u8` path suffix regardless of MIME.

/// Rewrite strategy for a response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentClass {
    Html,
    Css,
    Js,
    HlsPlaylist,
    Media,
    Opaque,
}

const HLS_TYPES: [&str; 4] = [
    "application/vnd.apple.mpegurl",
    "application/x-mpegurl",
    "audio/mpegurl",
    "audio/x-mpegurl",
];

const HTML_TYPES: [&str; 4] = [
    "text/html",
    "application/xhtml+xml",
    "application/xml",
    "text/xml",
];

const JS_TYPES: [&str; 5] = [
    "application/javascript",
    "text/javascript",
    "application/x-javascript",
    "application/ecmascript",
    "text/ecmascript",
];

impl ContentClass {
    /// Label used in logs and metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Html => "html",
            Self::Css => "css",
            Self::Js => "js",
            Self::HlsPlaylist => "hls",
            Self::Media => "media",
            Self::Opaque => "opaque",
        }
    }

    /// Bodies of this class are buffered and rewritten.
    pub fn is_rewritable(self) -> bool {
        matches!(self, Self::Html | Self::Css | Self::Js | Self::HlsPlaylist)
    }
}

/// Classify a response. `passthrough_playlists` treats HLS playlists as
/// media so they stream untouched.
pub fn classify(content_type: &str, path: &str, passthrough_playlists: bool) -> ContentClass {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    let is_hls =
        HLS_TYPES.contains(&essence.as_str()) || path.to_ascii_lowercase().ends_with(".m3u8");
    if is_hls {
        return if passthrough_playlists {
            ContentClass::Media
        } else {
            ContentClass::HlsPlaylist
        };
    }

    if essence.starts_with("video/")
        || essence.starts_with("audio/")
        || essence == "application/octet-stream"
        || essence == "application/dash+xml"
    {
        return ContentClass::Media;
    }
    if HTML_TYPES.contains(&essence.as_str()) {
        return ContentClass::Html;
    }
    if essence == "text/css" {
        return ContentClass::Css;
    }
    if JS_TYPES.contains(&essence.as_str()) {
        return ContentClass::Js;
    }
    ContentClass::Opaque
}
