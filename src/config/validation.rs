//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Normalize route keys and values and detect collisions
//! - Reject prefixes that shadow the generic `/proxy` form
//! - Validate addresses, timeouts, rewrite patterns and referer overrides
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::BTreeSet;
use std::net::SocketAddr;

use axum::http::HeaderValue;
use regex::Regex;
use thiserror::Error;
use url::Url;

use crate::config::schema::ProxyConfig;
use crate::routing::router::{normalize_origin, normalize_prefix};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{field}: `{value}` is not a socket address")]
    InvalidAddress { field: &'static str, value: String },

    #[error("listener.public_origin: `{0}` is not an absolute http(s) origin")]
    InvalidPublicOrigin(String),

    #[error("routes: key `{0}` does not name a path prefix")]
    EmptyPrefix(String),

    #[error("routes: `{prefix}` has an invalid upstream `{value}`: {reason}")]
    InvalidUpstream {
        prefix: String,
        value: String,
        reason: String,
    },

    #[error("routes: prefix `{0}` is configured more than once")]
    DuplicatePrefix(String),

    #[error("routes: prefix `{0}` is reserved for generic passthrough")]
    ReservedPrefix(String),

    #[error("timeouts.{0} must be greater than zero")]
    ZeroTimeout(&'static str),

    #[error("limits.max_rewrite_body_bytes must be greater than zero")]
    ZeroBodyLimit,

    #[error("special_rules[{index}]: invalid pattern: {reason}")]
    InvalidPattern { index: usize, reason: String },

    #[error("special_rules[{index}]: host must not be empty")]
    EmptyRuleHost { index: usize },

    #[error("referer_overrides: `{0}` is not a valid header value")]
    InvalidRefererOverride(String),
}

/// Validate a parsed configuration, collecting every problem found.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_address(
        "listener.bind_address",
        &config.listener.bind_address,
        &mut errors,
    );
    if config.observability.metrics_enabled {
        check_address(
            "observability.metrics_address",
            &config.observability.metrics_address,
            &mut errors,
        );
    }

    if let Some(origin) = &config.listener.public_origin {
        let valid = Url::parse(origin)
            .map(|u| matches!(u.scheme(), "http" | "https") && u.host_str().is_some())
            .unwrap_or(false);
        if !valid {
            errors.push(ValidationError::InvalidPublicOrigin(origin.clone()));
        }
    }

    check_routes(config, &mut errors);

    if config.timeouts.connect_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("connect_secs"));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("request_secs"));
    }
    if config.limits.max_rewrite_body_bytes == 0 {
        errors.push(ValidationError::ZeroBodyLimit);
    }

    for (index, set) in config.special_rules.iter().enumerate() {
        if set.host.trim().is_empty() {
            errors.push(ValidationError::EmptyRuleHost { index });
        }
        for rule in &set.rules {
            if let Err(e) = Regex::new(&rule.pattern) {
                errors.push(ValidationError::InvalidPattern {
                    index,
                    reason: e.to_string(),
                });
            }
        }
    }

    for (host, referer) in &config.referer_overrides {
        if HeaderValue::from_str(referer).is_err() {
            errors.push(ValidationError::InvalidRefererOverride(host.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_address(field: &'static str, value: &str, errors: &mut Vec<ValidationError>) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}

fn check_routes(config: &ProxyConfig, errors: &mut Vec<ValidationError>) {
    let mut seen = BTreeSet::new();

    for (key, value) in &config.routes {
        let Some(prefix) = normalize_prefix(key) else {
            errors.push(ValidationError::EmptyPrefix(key.clone()));
            continue;
        };

        if let Err(reason) = normalize_origin(value) {
            errors.push(ValidationError::InvalidUpstream {
                prefix: prefix.clone(),
                value: value.clone(),
                reason,
            });
        }

        if config.generic.enabled && prefix == "/proxy" {
            errors.push(ValidationError::ReservedPrefix(prefix.clone()));
        }

        if !seen.insert(prefix.clone()) {
            errors.push(ValidationError::DuplicatePrefix(prefix));
        }
    }
}
