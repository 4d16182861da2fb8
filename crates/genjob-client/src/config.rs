//! Client configuration.

use std::time::Duration;

use crate::error::ClientError;

/// Default remote API base url.
pub const DEFAULT_BASE_URL: &str = "https://api.goneural.ai/v1";

/// Upper bound for any single request.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Connection settings for the remote API.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiConfig {
    /// Base url every endpoint is joined onto.
    pub base_url: String,

    /// Bearer token sent with every request.
    pub api_key: String,

    /// Per-request timeout.
    pub timeout: Duration,
}

impl ApiConfig {
    /// Create a config for the given key against the default endpoint.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    /// Builder method to set the base url.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Builder method to set the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Join an endpoint path onto the base url.
    pub fn url(&self, endpoint: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        )
    }

    /// Check the config is usable before building a client.
    pub fn validate(&self) -> Result<(), ClientError> {
        if self.base_url.trim().is_empty() {
            return Err(ClientError::Config("base url is empty".to_string()));
        }
        if self.api_key.trim().is_empty() {
            return Err(ClientError::Config("API key is not set".to_string()));
        }
        Ok(())
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: String::new(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}
