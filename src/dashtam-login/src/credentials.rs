//! Credential lifecycle: valid-token production, refresh and persistence.
//!
//! [`CredentialManager`] is the only component that mutates a profile's
//! [`TokenPair`]. Refreshes for one profile are funnelled through a single
//! async critical section, so overlapping callers in the same process
//! trigger at most one refresh exchange and one write.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, StatusCode};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use dashtam_common::create_token_client;

use crate::constants::{REFRESH_PATH, REFRESH_SAFETY_MARGIN, REFRESH_TIMEOUT, TOKEN_PATH};
use crate::error::{AuthError, Outcome};
use crate::profile::Profile;
use crate::store::ProfileStore;
use crate::types::{AccessToken, AuthorizationCode, TokenPair, TokenResponse};

/// Longest slice of an error body carried into messages.
const MAX_ERROR_BODY_CHARS: usize = 200;

/// Parameters of an authorization-code exchange.
#[derive(Debug, Clone, Copy)]
pub struct CodeExchange<'a> {
    pub base_url: &'a str,
    pub client_id: &'a str,
    pub code: &'a AuthorizationCode,
    pub redirect_uri: &'a str,
    pub code_verifier: &'a str,
}

/// The API's token endpoints.
#[async_trait]
pub trait TokenEndpoint: Send + Sync {
    /// Exchange an authorization code for a token pair.
    ///
    /// A rejected code is `InvalidCredentials`; transport failure is
    /// `NetworkError`.
    async fn exchange_code(&self, exchange: CodeExchange<'_>) -> Outcome<TokenResponse>;

    /// Exchange a refresh token for a new token pair.
    async fn refresh(&self, base_url: &str, refresh_token: &str) -> Outcome<TokenResponse>;
}

/// [`TokenEndpoint`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpTokenEndpoint {
    client: Client,
}

impl HttpTokenEndpoint {
    /// Endpoint using the short-timeout token client.
    pub fn new() -> Outcome<Self> {
        let client = create_token_client().map_err(|e| AuthError::network(e, None))?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TokenEndpoint for HttpTokenEndpoint {
    async fn exchange_code(&self, exchange: CodeExchange<'_>) -> Outcome<TokenResponse> {
        let url = format!("{}{TOKEN_PATH}", exchange.base_url);
        tracing::debug!(url = %url, "Exchanging authorization code");

        let response = self
            .client
            .post(&url)
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", exchange.code.as_str()),
                ("redirect_uri", exchange.redirect_uri),
                ("client_id", exchange.client_id),
                ("code_verifier", exchange.code_verifier),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        match status {
            s if s.is_success() => serde_json::from_str(&body).map_err(|e| {
                AuthError::invalid_credentials(format!("malformed token response: {e}"))
            }),
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED => {
                Err(AuthError::invalid_credentials(format!(
                    "authorization code rejected ({status}): {}",
                    summarize_body(&body)
                )))
            }
            s => Err(AuthError::unexpected_status(s.as_u16(), body)),
        }
    }

    async fn refresh(&self, base_url: &str, refresh_token: &str) -> Outcome<TokenResponse> {
        let url = format!("{base_url}{REFRESH_PATH}");
        tracing::debug!(url = %url, "Refreshing access token");

        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "refresh_token": refresh_token }))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        match status {
            s if s.is_success() => serde_json::from_str(&body).map_err(|e| {
                AuthError::refresh_failed("malformed refresh response", Some(Box::new(e)))
            }),
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED => {
                tracing::warn!(status = %status, "Refresh token rejected");
                Err(AuthError::refresh_failed(
                    format!(
                        "refresh token rejected ({status}): {}",
                        summarize_body(&body)
                    ),
                    None,
                ))
            }
            s => Err(AuthError::unexpected_status(s.as_u16(), body)),
        }
    }
}

/// Short description of an error body: the OAuth `error_description` or
/// `error`/`detail` field when present, else the truncated body.
fn summarize_body(body: &str) -> String {
    if let Ok(json) = serde_json::from_str::<serde_json::Value>(body) {
        for key in ["error_description", "detail", "error", "message"] {
            if let Some(text) = json.get(key).and_then(|v| v.as_str()) {
                return text.to_string();
            }
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "no details".to_string();
    }
    trimmed.chars().take(MAX_ERROR_BODY_CHARS).collect()
}

/// Produces valid access tokens for profiles, refreshing as needed.
pub struct CredentialManager {
    store: Arc<dyn ProfileStore>,
    endpoint: Arc<dyn TokenEndpoint>,
    margin: Duration,
    refresh_timeout: Duration,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl std::fmt::Debug for CredentialManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialManager")
            .field("margin", &self.margin)
            .field("refresh_timeout", &self.refresh_timeout)
            .finish_non_exhaustive()
    }
}

impl CredentialManager {
    pub fn new(store: Arc<dyn ProfileStore>, endpoint: Arc<dyn TokenEndpoint>) -> Self {
        Self {
            store,
            endpoint,
            margin: REFRESH_SAFETY_MARGIN,
            refresh_timeout: REFRESH_TIMEOUT,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Override the pre-expiry refresh margin.
    pub fn with_margin(mut self, margin: Duration) -> Self {
        self.margin = margin;
        self
    }

    /// Override the bound on one refresh exchange.
    pub fn with_refresh_timeout(mut self, timeout: Duration) -> Self {
        self.refresh_timeout = timeout;
        self
    }

    pub fn store(&self) -> Arc<dyn ProfileStore> {
        Arc::clone(&self.store)
    }

    pub fn endpoint(&self) -> Arc<dyn TokenEndpoint> {
        Arc::clone(&self.endpoint)
    }

    pub fn margin(&self) -> Duration {
        self.margin
    }

    /// Load a profile through the store.
    pub fn load_profile(&self, profile: &str) -> Outcome<Profile> {
        self.store.load(profile)
    }

    /// A currently valid access token for `profile`.
    ///
    /// Refreshes first when the access token expires within the margin.
    /// A failed refresh leaves the stored pair untouched.
    pub async fn get_valid_token(&self, profile: &str) -> Outcome<AccessToken> {
        let record = self.store.load(profile)?;
        let pair = require_pair(&record)?;
        let now = Utc::now();

        if !pair.needs_refresh(now, self.margin) {
            return Ok(pair.to_access_token());
        }
        if pair.refresh_expired(now) {
            return Err(session_expired(profile));
        }

        self.refresh_serialized(profile, None).await
    }

    /// Refresh regardless of the margin, after the server rejected `rejected`.
    ///
    /// If another caller already replaced `rejected` in the store, the
    /// stored token is returned without a second exchange.
    pub async fn force_refresh(&self, profile: &str, rejected: &AccessToken) -> Outcome<AccessToken> {
        self.refresh_serialized(profile, Some(rejected)).await
    }

    /// Replace any existing pair with `pair` and persist it.
    pub async fn store_new_pair(&self, profile: &str, pair: TokenPair) -> Outcome<()> {
        let lock = self.profile_lock(profile);
        let _guard = lock.lock().await;

        let mut record = self.store.load(profile)?;
        record.set_tokens(pair);
        self.store.save(&record)?;
        tracing::info!(profile = %profile, "Stored new credentials");
        Ok(())
    }

    /// Remove the pair from `profile` and persist. Returns whether a pair
    /// was present.
    pub async fn clear(&self, profile: &str) -> Outcome<bool> {
        let lock = self.profile_lock(profile);
        let _guard = lock.lock().await;

        let mut record = self.store.load(profile)?;
        if record.clear_tokens().is_none() {
            tracing::debug!(profile = %profile, "No credentials to clear");
            return Ok(false);
        }
        self.store.save(&record)?;
        tracing::info!(profile = %profile, "Cleared credentials");
        Ok(true)
    }

    async fn refresh_serialized(
        &self,
        profile: &str,
        rejected: Option<&AccessToken>,
    ) -> Outcome<AccessToken> {
        let lock = self.profile_lock(profile);
        let _guard = lock.lock().await;

        // Re-read under the lock: a concurrent caller may have refreshed.
        let mut record = self.store.load(profile)?;
        let pair = require_pair(&record)?.clone();
        let now = Utc::now();

        let already_fresh = match rejected {
            Some(rejected) => pair.to_access_token() != *rejected,
            None => !pair.needs_refresh(now, self.margin),
        };
        if already_fresh {
            tracing::debug!(profile = %profile, "Token already refreshed by another caller");
            return Ok(pair.to_access_token());
        }
        if pair.refresh_expired(now) {
            return Err(session_expired(profile));
        }

        let exchange = self.endpoint.refresh(record.base_url(), pair.refresh_token());
        let response = match tokio::time::timeout(self.refresh_timeout, exchange).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return Err(as_refresh_failure(profile, e)),
            Err(_) => {
                tracing::warn!(profile = %profile, "Token refresh timed out");
                return Err(AuthError::refresh_failed(
                    format!(
                        "refresh exchange timed out after {}s",
                        self.refresh_timeout.as_secs_f32()
                    ),
                    None,
                ));
            }
        };

        let refreshed = TokenPair::from_response(response, Utc::now(), Some(&pair))
            .map_err(|e| as_refresh_failure(profile, e))?;
        record.set_tokens(refreshed.clone());
        self.store.save(&record)?;

        tracing::info!(
            profile = %profile,
            expires_at = %refreshed.access_expires_at(),
            "Refreshed access token"
        );
        Ok(refreshed.to_access_token())
    }

    fn profile_lock(&self, profile: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(profile.to_string()).or_default())
    }
}

fn require_pair(record: &Profile) -> Outcome<&TokenPair> {
    record.tokens().ok_or_else(|| {
        AuthError::invalid_credentials(format!(
            "profile '{}' is not logged in",
            record.name()
        ))
    })
}

fn session_expired(profile: &str) -> AuthError {
    AuthError::token_expired(format!(
        "refresh token for profile '{profile}' has expired, run `dashtam login`"
    ))
}

fn as_refresh_failure(profile: &str, err: AuthError) -> AuthError {
    tracing::warn!(profile = %profile, error = %err, "Token refresh failed");
    match err {
        AuthError::RefreshFailed { .. } => err,
        other => AuthError::refresh_failed(other.to_string(), Some(Box::new(other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summarize_body_prefers_oauth_description() {
        let body = r#"{"error":"invalid_grant","error_description":"Token revoked"}"#;
        assert_eq!(summarize_body(body), "Token revoked");
        assert_eq!(summarize_body(r#"{"detail":"expired"}"#), "expired");
        assert_eq!(summarize_body("  "), "no details");
        assert_eq!(summarize_body(&"x".repeat(500)).len(), MAX_ERROR_BODY_CHARS);
    }

    #[test]
    fn test_non_refresh_errors_are_wrapped() {
        let err = as_refresh_failure("dev", AuthError::network("offline", None));
        assert_eq!(err.kind(), crate::ErrorKind::RefreshFailed);
        assert!(std::error::Error::source(&err).is_some());

        let err = as_refresh_failure("dev", AuthError::refresh_failed("rejected", None));
        assert_eq!(err.to_string(), "token refresh failed: rejected");
    }
}
