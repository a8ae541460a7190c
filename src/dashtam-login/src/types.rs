//! Token types shared by the credential manager, login flow and client.

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;

use crate::constants::DEFAULT_REFRESH_TOKEN_LIFETIME;
use crate::error::{AuthError, Outcome};

/// Access-token lifetime assumed when the server omits `expires_in`.
const DEFAULT_ACCESS_TOKEN_LIFETIME_SECS: u64 = 3600;

/// Access token plus refresh token with independent expiries.
///
/// Invariant: `refresh_expires_at >= access_expires_at`. Both are UTC.
#[derive(Debug, Clone)]
pub struct TokenPair {
    access_token: SecretString,
    refresh_token: SecretString,
    access_expires_at: DateTime<Utc>,
    refresh_expires_at: DateTime<Utc>,
}

impl TokenPair {
    /// Create a token pair, rejecting a refresh token that expires first.
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        access_expires_at: DateTime<Utc>,
        refresh_expires_at: DateTime<Utc>,
    ) -> Outcome<Self> {
        if refresh_expires_at < access_expires_at {
            return Err(AuthError::invalid_credentials(
                "refresh token expires before access token",
            ));
        }
        Ok(Self {
            access_token: SecretString::from(access_token.into()),
            refresh_token: SecretString::from(refresh_token.into()),
            access_expires_at,
            refresh_expires_at,
        })
    }

    /// Build a pair from a token endpoint response received at `now`.
    ///
    /// Servers that do not rotate refresh tokens omit `refresh_token` on
    /// refresh; the `previous` pair's refresh token is kept in that case.
    pub fn from_response(
        response: TokenResponse,
        now: DateTime<Utc>,
        previous: Option<&TokenPair>,
    ) -> Outcome<Self> {
        if response.access_token.trim().is_empty() {
            return Err(AuthError::invalid_credentials(
                "token response contained an empty access token",
            ));
        }

        let access_lifetime = response
            .expires_in
            .unwrap_or(DEFAULT_ACCESS_TOKEN_LIFETIME_SECS);
        let access_expires_at = after(now, access_lifetime);

        let (refresh_token, refresh_expires_at) = match (response.refresh_token, previous) {
            (Some(token), _) => {
                let lifetime = response
                    .refresh_expires_in
                    .map(Duration::from_secs)
                    .unwrap_or(DEFAULT_REFRESH_TOKEN_LIFETIME);
                (token, after(now, lifetime.as_secs()))
            }
            (None, Some(prev)) => (
                prev.refresh_token().to_string(),
                prev.refresh_expires_at(),
            ),
            (None, None) => {
                return Err(AuthError::invalid_credentials(
                    "token response did not include a refresh token",
                ));
            }
        };

        // Keep refresh expiry >= access expiry.
        let refresh_expires_at = refresh_expires_at.max(access_expires_at);

        Self::new(
            response.access_token,
            refresh_token,
            access_expires_at,
            refresh_expires_at,
        )
    }

    /// The access token (exposes the secret - use sparingly).
    pub fn access_token(&self) -> &str {
        self.access_token.expose_secret()
    }

    /// The refresh token (exposes the secret - use sparingly).
    pub fn refresh_token(&self) -> &str {
        self.refresh_token.expose_secret()
    }

    pub fn access_expires_at(&self) -> DateTime<Utc> {
        self.access_expires_at
    }

    pub fn refresh_expires_at(&self) -> DateTime<Utc> {
        self.refresh_expires_at
    }

    /// Remaining access-token lifetime at `now` (negative once expired).
    pub fn access_remaining(&self, now: DateTime<Utc>) -> chrono::Duration {
        self.access_expires_at - now
    }

    /// Whether the access token is within `margin` of expiry at `now`.
    pub fn needs_refresh(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        self.access_remaining(now) <= chrono::Duration::seconds(margin.as_secs() as i64)
    }

    /// Whether the refresh token can no longer be used at `now`.
    pub fn refresh_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.refresh_expires_at
    }

    /// The access token as an [`AccessToken`].
    pub fn to_access_token(&self) -> AccessToken {
        AccessToken(self.access_token.clone())
    }
}

impl PartialEq for TokenPair {
    fn eq(&self, other: &Self) -> bool {
        self.access_token() == other.access_token()
            && self.refresh_token() == other.refresh_token()
            && self.access_expires_at == other.access_expires_at
            && self.refresh_expires_at == other.refresh_expires_at
    }
}

impl Eq for TokenPair {}

/// `now + secs`, saturating at the largest representable instant.
fn after(now: DateTime<Utc>, secs: u64) -> DateTime<Utc> {
    i64::try_from(secs)
        .ok()
        .and_then(chrono::TimeDelta::try_seconds)
        .and_then(|delta| now.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// A currently valid access token, ready to attach to a request.
#[derive(Debug, Clone)]
pub struct AccessToken(SecretString);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(SecretString::from(token.into()))
    }

    /// The raw token (exposes the secret - use sparingly).
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    /// Value for the `Authorization` header.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.expose())
    }
}

impl PartialEq for AccessToken {
    fn eq(&self, other: &Self) -> bool {
        self.expose() == other.expose()
    }
}

/// Authorization code captured from the OAuth redirect.
#[derive(Debug, Clone)]
pub struct AuthorizationCode(SecretString);

impl AuthorizationCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(SecretString::from(code.into()))
    }

    /// The raw code (exposes the secret - use sparingly).
    pub fn as_str(&self) -> &str {
        self.0.expose_secret()
    }
}

/// Token response from the token and refresh endpoints.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct TokenResponse {
    /// The access token.
    pub access_token: String,
    /// The type of token (usually "Bearer").
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// The lifetime in seconds of the access token.
    #[serde(default)]
    pub expires_in: Option<u64>,
    /// The refresh token (may be absent on refresh when not rotated).
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// The lifetime in seconds of the refresh token.
    #[serde(default)]
    pub refresh_expires_in: Option<u64>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}
