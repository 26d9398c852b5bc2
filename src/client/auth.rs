//! HCP authentication.
//!
//! Either a pre-issued access token, or OAuth2 client credentials exchanged at
//! the HCP identity provider. Exchanged tokens are cached until shortly before
//! they expire.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

use crate::error::HcpError;

/// Audience requested for HCP API tokens.
pub const API_AUDIENCE: &str = "https://api.hashicorp.cloud";

/// Refresh tokens this long before they actually expire.
const TOKEN_EXPIRY_BUFFER: Duration = Duration::from_secs(60);

/// TTL assumed when the identity provider omits `expires_in`.
const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(30 * 60);

#[derive(Clone)]
struct CachedToken {
    token: String,
    expires_at: Instant,
}

impl CachedToken {
    fn is_valid(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// OAuth2 client credentials of a service principal.
#[derive(Clone)]
pub struct ClientCredentials {
    auth_url: String,
    client_id: String,
    client_secret: String,
    cache: Arc<RwLock<Option<CachedToken>>>,
}

impl std::fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("auth_url", &self.auth_url)
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

/// Where bearer tokens come from.
#[derive(Clone)]
pub enum TokenSource {
    /// A fixed token supplied by the user.
    Static(String),
    /// OAuth2 client credentials exchanged at the identity provider.
    ClientCredentials(ClientCredentials),
}

impl std::fmt::Debug for TokenSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Static(_) => f.write_str("Static(..)"),
            Self::ClientCredentials(creds) => std::fmt::Debug::fmt(creds, f),
        }
    }
}

impl TokenSource {
    /// A token source backed by client credentials.
    pub fn client_credentials(
        auth_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self::ClientCredentials(ClientCredentials {
            auth_url: auth_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            cache: Arc::new(RwLock::new(None)),
        })
    }

    /// Get a bearer token, exchanging credentials if the cache is stale.
    pub async fn token(&self, http: &Client) -> Result<String, HcpError> {
        let ClientCredentials {
            auth_url,
            client_id,
            client_secret,
            cache,
        } = match self {
            Self::Static(token) => return Ok(token.clone()),
            Self::ClientCredentials(creds) => creds,
        };

        {
            let cached = cache.read().await;
            if let Some(cached) = cached.as_ref().filter(|c| c.is_valid()) {
                return Ok(cached.token.clone());
            }
        }

        debug!("Exchanging client credentials for an access token");
        let response = http
            .post(format!("{}/oauth2/token", auth_url))
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", client_id.as_str()),
                ("client_secret", client_secret.as_str()),
                ("audience", API_AUDIENCE),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(HcpError::Configuration(format!(
                "unable to authenticate with client credentials: HTTP {}",
                status.as_u16()
            )));
        }

        let body: TokenResponse = response.json().await?;
        let ttl = body
            .expires_in
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TOKEN_TTL);
        let expires_at = Instant::now() + ttl.saturating_sub(TOKEN_EXPIRY_BUFFER);

        *cache.write().await = Some(CachedToken {
            token: body.access_token.clone(),
            expires_at,
        });
        debug!(ttl_secs = ttl.as_secs(), "Access token cached");

        Ok(body.access_token)
    }

    /// Whether a rejected token can be replaced by exchanging credentials again.
    pub fn is_refreshable(&self) -> bool {
        matches!(self, Self::ClientCredentials(_))
    }

    /// Drop any cached token so the next call exchanges credentials again.
    pub async fn invalidate(&self) {
        if let Self::ClientCredentials(creds) = self {
            *creds.cache.write().await = None;
        }
    }
}
