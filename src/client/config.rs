//! Provider configuration.
//!
//! Values come from the provider block first; anything left empty falls back
//! to the matching `HCP_*` environment variable, then to the built-in default.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::client::retry::RetryPolicy;
use crate::error::HcpError;
use crate::link::Location;

/// Default HCP API endpoint.
pub const DEFAULT_API_URL: &str = "https://api.cloud.hashicorp.com";

/// Default HCP identity provider.
pub const DEFAULT_AUTH_URL: &str = "https://auth.idp.hashicorp.com";

/// Default interval between polls of an operation or resource state.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Configuration for an [`HcpClient`](crate::client::HcpClient).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ClientConfig {
    /// OAuth client id of a service principal.
    #[serde(default)]
    pub client_id: String,
    /// OAuth client secret of a service principal.
    #[serde(default, skip_serializing)]
    pub client_secret: String,
    /// Pre-issued bearer token, used instead of client credentials.
    #[serde(default, skip_serializing)]
    pub access_token: String,
    /// Organization all resources belong to.
    #[serde(default)]
    pub organization_id: String,
    /// Default project for resources that do not set one.
    #[serde(default)]
    pub project_id: String,
    /// API base URL.
    #[serde(default)]
    pub api_url: String,
    /// Identity provider base URL.
    #[serde(default)]
    pub auth_url: String,
    /// Seconds between polls while waiting on HCP.
    #[serde(default)]
    pub poll_interval_secs: Option<u64>,
    /// Attempts for read calls that fail transiently.
    #[serde(default)]
    pub max_read_attempts: Option<u32>,
}

impl ClientConfig {
    /// Parse a provider config block and fill gaps from the environment.
    pub fn from_value(value: serde_json::Value) -> Result<Self, HcpError> {
        let config: Self = if value.is_null() {
            Self::default()
        } else {
            serde_json::from_value(value)?
        };
        Ok(config.with_env_fallback(|key| std::env::var(key).ok()))
    }

    /// Fill empty fields using `lookup`, which maps an env var name to a value.
    pub fn with_env_fallback(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let fill = |field: &mut String, key: &str| {
            if field.is_empty() {
                if let Some(v) = lookup(key) {
                    *field = v;
                }
            }
        };
        fill(&mut self.client_id, "HCP_CLIENT_ID");
        fill(&mut self.client_secret, "HCP_CLIENT_SECRET");
        fill(&mut self.access_token, "HCP_ACCESS_TOKEN");
        fill(&mut self.organization_id, "HCP_ORGANIZATION_ID");
        fill(&mut self.project_id, "HCP_PROJECT_ID");
        fill(&mut self.api_url, "HCP_API_HOST");
        fill(&mut self.auth_url, "HCP_AUTH_URL");
        self
    }

    /// Check that the config can authenticate and scope requests.
    pub fn validate(&self) -> Result<(), HcpError> {
        if self.access_token.is_empty()
            && (self.client_id.is_empty() || self.client_secret.is_empty())
        {
            return Err(HcpError::Configuration(
                "either access_token or both client_id and client_secret must be set".to_string(),
            ));
        }
        if self.organization_id.is_empty() {
            return Err(HcpError::Configuration(
                "organization_id must be set".to_string(),
            ));
        }
        if self.project_id.is_empty() {
            return Err(HcpError::Configuration("project_id must be set".to_string()));
        }
        Ok(())
    }

    /// API base URL without a trailing slash.
    pub fn api_url(&self) -> String {
        non_empty_or(&self.api_url, DEFAULT_API_URL)
    }

    /// Identity provider base URL without a trailing slash.
    pub fn auth_url(&self) -> String {
        non_empty_or(&self.auth_url, DEFAULT_AUTH_URL)
    }

    /// Interval between polls.
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_POLL_INTERVAL)
    }

    /// Retry policy for read calls.
    pub fn retry_policy(&self) -> RetryPolicy {
        let policy = RetryPolicy::default();
        match self.max_read_attempts {
            Some(n) => policy.with_max_attempts(n),
            None => policy,
        }
    }

    /// The default location for new resources.
    pub fn location(&self) -> Location {
        Location::new(&self.organization_id, &self.project_id)
    }
}

fn non_empty_or(value: &str, default: &str) -> String {
    let value = if value.is_empty() { default } else { value };
    value.trim_end_matches('/').to_string()
}
