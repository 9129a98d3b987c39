//! Centralized configuration for Narrowfin.
//!
//! All tunable parameters live in one explicit structure that is passed to
//! the components at construction time; there is no process-wide state.

use std::time::Duration;

use crate::auth::ClientIdentity;

/// Central configuration for all Narrowfin components.
#[derive(Debug, Clone, Default)]
pub struct NarrowfinConfig {
    pub upstream: UpstreamConfig,
    pub identity: ClientIdentity,
    pub pages: PageConfig,
}

/// Upstream media-server connection settings.
///
/// Controls the server address, per-endpoint timeouts, and the TLS trust
/// policy for outbound requests.
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// Base URL of the upstream server, without a trailing slash
    pub base_url: String,
    /// Timeout for item and library listing requests
    pub items_timeout: Duration,
    /// Timeout for search and authentication requests
    pub search_timeout: Duration,
    /// Connect/header-exchange timeout for stream requests.
    /// Bounds time-to-first-byte only; body transfer is unbounded.
    pub stream_connect_timeout: Duration,
    /// Accept self-signed or otherwise invalid upstream TLS certificates.
    /// Off unless explicitly opted in.
    pub accept_invalid_certs: bool,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8096".to_string(),
            items_timeout: Duration::from_secs(30),
            search_timeout: Duration::from_secs(20),
            stream_connect_timeout: Duration::from_secs(30),
            accept_invalid_certs: false,
        }
    }
}

impl UpstreamConfig {
    /// Base URL normalized for joining with endpoint paths.
    pub fn base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

/// Listing and search pagination settings.
#[derive(Debug, Clone)]
pub struct PageConfig {
    /// Items per page when the request does not specify a page size
    pub default_page_size: usize,
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            default_page_size: 25,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_trust_policy_is_secure() {
        let config = UpstreamConfig::default();
        assert!(!config.accept_invalid_certs);
    }

    #[test]
    fn test_base_strips_trailing_slash() {
        let config = UpstreamConfig {
            base_url: "https://media.example:8920/".to_string(),
            ..UpstreamConfig::default()
        };
        assert_eq!(config.base(), "https://media.example:8920");
    }

    #[test]
    fn test_default_page_size() {
        assert_eq!(PageConfig::default().default_page_size, 25);
    }
}
