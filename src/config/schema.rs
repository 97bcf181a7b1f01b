//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Root configuration for the rewriting proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address, public origin).
    pub listener: ListenerConfig,

    /// Path-prefix key → upstream origin.
    ///
    /// Keys gain a leading `/`, values gain `https://` when they carry no
    /// scheme. `groq = "api.groq.com/openai"` serves `/groq/...` from
    /// `https://api.groq.com/openai/...`.
    pub routes: BTreeMap<String, String>,

    /// Target host → fixed `Referer` for upstreams that reject the
    /// synthesized one.
    pub referer_overrides: BTreeMap<String, String>,

    /// Per-host rewrite passes applied after the generic HTML pass.
    pub special_rules: Vec<SpecialRuleSetConfig>,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Buffering limits.
    pub limits: LimitsConfig,

    /// `/proxy/{url}` passthrough.
    pub generic: GenericConfig,

    /// `/{absolute-url}` passthrough.
    pub direct: DirectConfig,

    /// Client address forwarding.
    pub forwarding: ForwardingConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Origin clients use to reach the proxy (e.g., "https://proxy.example").
    /// Derived per request from `X-Forwarded-Proto` and `Host` when unset.
    pub public_origin: Option<String>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            public_origin: None,
        }
    }
}

/// One rewrite pass for one upstream host.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SpecialRuleSetConfig {
    /// Upstream host the pass applies to (case-insensitive).
    pub host: String,

    /// Rules applied in order.
    #[serde(default)]
    pub rules: Vec<SpecialRuleConfig>,
}

/// A declarative pattern + template rule.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SpecialRuleConfig {
    /// Regular expression matched against the HTML body.
    pub pattern: String,

    /// Replacement. Supports `$1` / `${name}` captures and the
    /// `{proxy_origin}`, `{prefix}` and `{target_host}` placeholders.
    pub template: String,
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Upstream connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Time allowed until the response head is produced, in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 10,
            request_secs: 60,
        }
    }
}

/// Buffering limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Largest textual body buffered for rewriting.
    pub max_rewrite_body_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_rewrite_body_bytes: 32 * 1024 * 1024,
        }
    }
}

/// Generic passthrough configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GenericConfig {
    /// Serve `/proxy/{url}`.
    pub enabled: bool,
}

impl Default for GenericConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Direct passthrough configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DirectConfig {
    /// Treat paths that embed an absolute URL as the target.
    pub enabled: bool,

    /// Let the upstream client follow redirects.
    pub follow_redirects: bool,

    /// Redirect hops followed before giving up.
    pub max_redirects: usize,

    /// Stream HLS playlists untouched instead of rewriting them.
    pub passthrough_playlists: bool,
}

impl Default for DirectConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            follow_redirects: true,
            max_redirects: 10,
            passthrough_playlists: false,
        }
    }
}

/// Client address forwarding.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ForwardingConfig {
    /// Trusted headers carrying the client IP, checked in order.
    pub client_ip_headers: Vec<String>,
}

impl Default for ForwardingConfig {
    fn default() -> Self {
        Self {
            client_ip_headers: vec![
                "cf-connecting-ip".to_string(),
                "x-nf-client-connection-ip".to_string(),
                "x-real-ip".to_string(),
            ],
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
