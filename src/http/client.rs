//! Upstream HTTP clients.
//!
//! Two immutable `reqwest` clients are built at startup: one that never
//! follows redirects, so `Location` can be rewritten, and one that
//! follows them for direct-mode media.

use std::time::Duration;

use reqwest::{redirect::Policy, Client};

use crate::config::schema::{DirectConfig, TimeoutConfig};
use crate::http::context::ProxyMode;

#[derive(Debug, Clone)]
pub struct UpstreamClient {
    manual: Client,
    following: Option<Client>,
}

impl UpstreamClient {
    pub fn new(timeouts: &TimeoutConfig, direct: &DirectConfig) -> Result<Self, reqwest::Error> {
        let connect_timeout = Duration::from_secs(timeouts.connect_secs);

        let manual = Client::builder()
            .redirect(Policy::none())
            .connect_timeout(connect_timeout)
            .build()?;

        let following = if direct.enabled && direct.follow_redirects {
            Some(
                Client::builder()
                    .redirect(Policy::limited(direct.max_redirects))
                    .connect_timeout(connect_timeout)
                    .build()?,
            )
        } else {
            None
        };

        Ok(Self { manual, following })
    }

    /// Client for a request in `mode`.
    pub fn for_mode(&self, mode: ProxyMode) -> &Client {
        match (mode, &self.following) {
            (ProxyMode::Direct, Some(following)) => following,
            _ => &self.manual,
        }
    }

    pub fn follows_redirects(&self, mode: ProxyMode) -> bool {
        mode == ProxyMode::Direct && self.following.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_following_client_only_for_direct_mode() {
        let client = UpstreamClient::new(&TimeoutConfig::default(), &DirectConfig::default()).unwrap();
        assert!(client.follows_redirects(ProxyMode::Direct));
        assert!(!client.follows_redirects(ProxyMode::Prefixed));
        assert!(!client.follows_redirects(ProxyMode::Generic));

        let direct = DirectConfig {
            follow_redirects: false,
            ..DirectConfig::default()
        };
        let client = UpstreamClient::new(&TimeoutConfig::default(), &direct).unwrap();
        assert!(!client.follows_redirects(ProxyMode::Direct));
    }
}
