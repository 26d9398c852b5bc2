//! JSON-over-HTTP client for the HCP API.

use std::time::Duration;

use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::client::auth::TokenSource;
use crate::client::config::ClientConfig;
use crate::client::retry::RetryPolicy;
use crate::error::HcpError;
use crate::link::Location;

/// Maximum length of response body to log.
const MAX_LOG_BODY_LENGTH: usize = 200;

const USER_AGENT: &str = concat!("hcp-provider/", env!("CARGO_PKG_VERSION"));

/// Truncate a response body and strip control characters before logging it.
fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        let mut end = MAX_LOG_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... [truncated, {} bytes total]", &body[..end], body.len())
    } else {
        body.to_string()
    };
    truncated.replace(|c: char| c.is_control(), "")
}

/// Error body returned by HCP services.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
}

/// Client for the HCP REST API.
///
/// Constructed once from a [`ClientConfig`] and shared by handle into every
/// resource operation.
#[derive(Debug, Clone)]
pub struct HcpClient {
    http: Client,
    base_url: String,
    tokens: TokenSource,
    retry: RetryPolicy,
    location: Location,
    poll_interval: Duration,
}

impl HcpClient {
    /// Create a client from a validated config.
    pub fn new(config: &ClientConfig) -> Result<Self, HcpError> {
        config.validate()?;

        let http = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| HcpError::Configuration(format!("failed to create HTTP client: {}", e)))?;

        let tokens = if config.access_token.is_empty() {
            TokenSource::client_credentials(
                config.auth_url(),
                &config.client_id,
                &config.client_secret,
            )
        } else {
            TokenSource::Static(config.access_token.clone())
        };

        Ok(Self {
            http,
            base_url: config.api_url(),
            tokens,
            retry: config.retry_policy(),
            location: config.location(),
            poll_interval: config.poll_interval(),
        })
    }

    /// Replace the retry policy used for reads.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Replace the interval between polls.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// The provider-level default location.
    pub fn location(&self) -> &Location {
        &self.location
    }

    /// Interval between polls while waiting on HCP.
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// GET a resource, retrying transient failures.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, HcpError> {
        self.retry
            .retry(|| self.send::<(), T>(Method::GET, path, None))
            .await
    }

    /// POST a request body. Not retried.
    pub async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, HcpError> {
        self.send(Method::POST, path, Some(body)).await
    }

    /// PATCH a request body. Not retried.
    pub async fn patch<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, HcpError> {
        self.send(Method::PATCH, path, Some(body)).await
    }

    /// DELETE a resource. Not retried.
    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, HcpError> {
        self.send::<(), T>(Method::DELETE, path, None).await
    }

    async fn send<B: Serialize, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, HcpError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("{} {}", method, url);

        let (mut status, mut text) = self.execute(&method, &url, body).await?;
        if status == StatusCode::UNAUTHORIZED && self.tokens.is_refreshable() {
            debug!("Access token rejected, exchanging credentials again");
            self.tokens.invalidate().await;
            (status, text) = self.execute(&method, &url, body).await?;
        }

        if !status.is_success() {
            return Err(classify_error(status, &url, &text));
        }

        let text = if text.trim().is_empty() { "null" } else { &text };
        Ok(serde_json::from_str(text)?)
    }

    /// Send one authenticated request and read the whole response body.
    async fn execute<B: Serialize>(
        &self,
        method: &Method,
        url: &str,
        body: Option<&B>,
    ) -> Result<(StatusCode, String), HcpError> {
        let token = self.tokens.token(&self.http).await?;
        let mut request = self.http.request(method.clone(), url).bearer_auth(token);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        Ok((status, response.text().await?))
    }
}

/// Map a non-success response to an [`HcpError`].
fn classify_error(status: StatusCode, url: &str, body: &str) -> HcpError {
    let message = serde_json::from_str::<ApiErrorBody>(body)
        .ok()
        .map(|b| b.message)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        });

    if status == StatusCode::NOT_FOUND {
        debug!("Not found: {}", url);
        return HcpError::NotFound(message);
    }

    error!("API error: {} - {}", status, sanitize_for_log(body));
    HcpError::Api {
        status: status.as_u16(),
        message,
    }
}
