//! Client configuration

use std::time::Duration;
use url::Url;

/// Versioned prefix every Cloudreve endpoint lives under
pub const API_PREFIX: &str = "/api/v3";

/// Client configuration
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Base URL including scheme, host and port, e.g. `https://drive.example.com`
    pub endpoint: String,
    /// Request timeout
    pub timeout: Duration,
    /// User agent string
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:5212".to_string(),
            timeout: Duration::from_secs(30),
            user_agent: format!("cloudreve-client/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ClientConfig {
    /// Create a new config with the given endpoint
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    /// Set timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the user agent
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Base URL without a trailing slash
    pub fn base_url(&self) -> &str {
        self.endpoint.trim_end_matches('/')
    }

    /// Full URL for an API path such as `/directory/`
    pub fn api_url(&self, path: &str) -> String {
        format!("{}{}{}", self.base_url(), API_PREFIX, path)
    }

    /// Resolve a link the server handed back against the endpoint.
    ///
    /// Absolute, protocol-relative and site-relative links all follow
    /// normal URL reference rules.
    pub fn resolve_url(&self, link: &str) -> Result<Url, url::ParseError> {
        Url::parse(self.base_url())?.join(link)
    }
}
