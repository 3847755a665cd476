//! Connection configuration for the OpenSearch client.

use std::fmt;
use std::time::Duration;

/// Default OpenSearch URL.
pub const DEFAULT_OPENSEARCH_URL: &str = "http://localhost:9200";

/// Basic authentication credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct BasicAuth {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicAuth")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// How to reach the search engine.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Base URL including scheme, host and port.
    pub url: String,
    /// Optional basic auth credentials.
    pub credentials: Option<BasicAuth>,
    /// Per-request timeout. `None` keeps the transport default.
    pub request_timeout: Option<Duration>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_OPENSEARCH_URL.to_string(),
            credentials: None,
            request_timeout: None,
        }
    }
}

impl ConnectionConfig {
    /// Create a config for the given URL without credentials.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Attach basic auth credentials.
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some(BasicAuth {
            username: username.into(),
            password: password.into(),
        });
        self
    }

    /// Set a per-request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }
}
