//! Credentials
//!
//! Every turn asks an [`AuthProvider`] for a fresh credential before opening
//! its connection. A failure here ends the turn as an auth error; nothing is
//! sent to the backend.
//!
//! Two providers ship with the crate:
//! - [`StaticCredential`]: a fixed token (development, tests, `INSIGHTS_TOKEN`)
//! - [`HttpTokenRefresher`]: exchanges a refresh token at an HTTP endpoint and
//!   caches the access token until shortly before it expires

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

/// Refresh this long before the advertised expiry
pub const EXPIRY_LEEWAY: Duration = Duration::from_secs(60);

const MAX_TOKEN_LIFETIME_SECS: u64 = 10 * 365 * 24 * 3600;

/// Access token handed to the transport
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    token: String,
    expires_at: Option<DateTime<Utc>>,
}

impl Credential {
    /// Credential without a known expiry
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            expires_at: None,
        }
    }

    /// Credential that expires at `expires_at`
    pub fn expiring(token: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            token: token.into(),
            expires_at: Some(expires_at),
        }
    }

    /// The raw token
    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }

    /// When the token expires, if known
    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// Whether the token is expired or inside the refresh leeway at `now`
    #[must_use]
    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        let Some(expires_at) = self.expires_at else {
            return false;
        };
        let leeway = chrono::Duration::from_std(EXPIRY_LEEWAY).unwrap_or_default();
        now + leeway >= expires_at
    }
}

// Tokens never reach logs
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Errors from obtaining a credential
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No credential is configured
    #[error("no credential configured")]
    Missing,

    /// The refresh endpoint could not be reached
    #[error("token refresh request failed: {0}")]
    Request(String),

    /// The refresh endpoint refused the refresh token
    #[error("token refresh rejected with status {status}")]
    Rejected {
        /// HTTP status code
        status: u16,
    },

    /// The refresh endpoint answered with something unexpected
    #[error("invalid token refresh response: {0}")]
    InvalidResponse(String),
}

/// Supplies a valid credential for each turn
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Return a credential that is valid now, refreshing it if needed
    async fn refresh_if_needed(&self) -> Result<Credential, AuthError>;
}

#[async_trait]
impl<P: AuthProvider + ?Sized> AuthProvider for Box<P> {
    async fn refresh_if_needed(&self) -> Result<Credential, AuthError> {
        (**self).refresh_if_needed().await
    }
}

/// Provider for a token that never changes
#[derive(Clone, Debug)]
pub struct StaticCredential {
    credential: Option<Credential>,
}

impl StaticCredential {
    /// Always hand out `token`
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            credential: Some(Credential::new(token)),
        }
    }

    /// Provider with no token; every turn fails with `AuthError::Missing`
    #[must_use]
    pub fn none() -> Self {
        Self { credential: None }
    }
}

#[async_trait]
impl AuthProvider for StaticCredential {
    async fn refresh_if_needed(&self) -> Result<Credential, AuthError> {
        self.credential.clone().ok_or(AuthError::Missing)
    }
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Deserialize)]
struct RefreshResponse {
    access_token: String,
    expires_in: Option<u64>,
}

/// Provider that exchanges a refresh token for short-lived access tokens
///
/// Sends `POST {url}` with `{"refresh_token": ...}` and expects
/// `{"access_token": ..., "expires_in": <seconds>}` back.
pub struct HttpTokenRefresher {
    url: String,
    refresh_token: String,
    http_client: reqwest::Client,
    cached: Mutex<Option<Credential>>,
}

impl HttpTokenRefresher {
    /// Create a refresher for `url`
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Request` if the HTTP client cannot be built.
    pub fn new(url: impl Into<String>, refresh_token: impl Into<String>) -> Result<Self, AuthError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| AuthError::Request(e.to_string()))?;

        Ok(Self {
            url: url.into(),
            refresh_token: refresh_token.into(),
            http_client,
            cached: Mutex::new(None),
        })
    }

    async fn fetch(&self) -> Result<Credential, AuthError> {
        let response = self
            .http_client
            .post(&self.url)
            .json(&RefreshRequest {
                refresh_token: &self.refresh_token,
            })
            .send()
            .await
            .map_err(|e| AuthError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::Rejected {
                status: status.as_u16(),
            });
        }

        let body: RefreshResponse = response
            .json()
            .await
            .map_err(|e| AuthError::InvalidResponse(e.to_string()))?;

        if body.access_token.is_empty() {
            return Err(AuthError::InvalidResponse("empty access_token".to_string()));
        }

        Ok(match body.expires_in {
            Some(secs) => {
                let lifetime = i64::try_from(secs.min(MAX_TOKEN_LIFETIME_SECS)).unwrap_or(0);
                let expires_at = Utc::now() + chrono::Duration::seconds(lifetime);
                Credential::expiring(body.access_token, expires_at)
            }
            None => Credential::new(body.access_token),
        })
    }
}

#[async_trait]
impl AuthProvider for HttpTokenRefresher {
    async fn refresh_if_needed(&self) -> Result<Credential, AuthError> {
        let mut cached = self.cached.lock().await;

        if let Some(credential) = cached.as_ref() {
            if !credential.needs_refresh(Utc::now()) {
                return Ok(credential.clone());
            }
        }

        tracing::debug!(url = %self.url, "Refreshing access token");
        let credential = self.fetch().await?;
        *cached = Some(credential.clone());
        Ok(credential)
    }
}

impl fmt::Debug for HttpTokenRefresher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTokenRefresher")
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}
