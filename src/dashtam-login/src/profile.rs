//! Profile records: one API environment plus its credentials.
//!
//! On disk a profile is a TOML document:
//!
//! ```toml
//! [api]
//! base_url = "https://api.dashtam.dev"
//!
//! [auth]
//! access_token = "..."
//! refresh_token = "..."
//! access_token_expires_at = "2026-10-14T12:00:00Z"
//! refresh_token_expires_at = "2026-11-13T12:00:00Z"
//!
//! [display]
//! output_style = "plain"
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{AuthError, Outcome};
use crate::types::TokenPair;

/// Longest accepted profile name.
pub const MAX_PROFILE_NAME_LEN: usize = 64;

/// How command output is rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputStyle {
    /// Colored, human-oriented output
    #[default]
    Rich,
    /// Plain text without decoration
    Plain,
    /// Machine-readable JSON
    Json,
}

impl std::fmt::Display for OutputStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputStyle::Rich => write!(f, "rich"),
            OutputStyle::Plain => write!(f, "plain"),
            OutputStyle::Json => write!(f, "json"),
        }
    }
}

/// Per-profile display overrides of the global settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayPreferences {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_style: Option<OutputStyle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<bool>,
}

impl DisplayPreferences {
    fn is_empty(&self) -> bool {
        self.output_style.is_none() && self.color.is_none()
    }
}

/// Named configuration binding the CLI to one API environment.
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    name: String,
    base_url: String,
    /// OAuth client id; `None` uses the CLI default.
    pub client_id: Option<String>,
    tokens: Option<TokenPair>,
    pub display: DisplayPreferences,
}

impl Profile {
    /// Create a profile without credentials.
    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: normalize_base_url(base_url.into()),
            client_id: None,
            tokens: None,
            display: DisplayPreferences::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Base API URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn set_base_url(&mut self, base_url: impl Into<String>) {
        self.base_url = normalize_base_url(base_url.into());
    }

    /// The embedded token pair, if logged in.
    pub fn tokens(&self) -> Option<&TokenPair> {
        self.tokens.as_ref()
    }

    /// Replace (or set) the embedded token pair.
    pub fn set_tokens(&mut self, tokens: TokenPair) {
        self.tokens = Some(tokens);
    }

    /// Remove the embedded token pair, returning it.
    pub fn clear_tokens(&mut self) -> Option<TokenPair> {
        self.tokens.take()
    }

    pub fn with_tokens(mut self, tokens: TokenPair) -> Self {
        self.tokens = Some(tokens);
        self
    }

    /// Absolute URL for an API path such as `/api/v1/users/me`.
    pub fn endpoint(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{path}", self.base_url)
        } else {
            format!("{}/{path}", self.base_url)
        }
    }

    /// Serialize to the on-disk TOML document.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        let doc = ProfileDocument {
            api: ApiSection {
                base_url: self.base_url.clone(),
                client_id: self.client_id.clone(),
            },
            auth: self
                .tokens
                .as_ref()
                .map(AuthSection::from_pair)
                .unwrap_or_default(),
            display: self.display.clone(),
        };
        toml::to_string_pretty(&doc)
    }

    /// Parse the on-disk TOML document stored at `path` for profile `name`.
    pub fn from_toml(name: &str, content: &str, path: &Path) -> Outcome<Self> {
        let doc: ProfileDocument = toml::from_str(content).map_err(|e| {
            AuthError::config_parse(path, e.message().to_string(), Some(Box::new(e)))
        })?;

        validate_base_url(&doc.api.base_url)
            .map_err(|message| AuthError::config_parse(path, message, None))?;

        let tokens = doc
            .auth
            .into_pair()
            .map_err(|message| AuthError::config_parse(path, message, None))?;

        Ok(Self {
            name: name.to_string(),
            base_url: normalize_base_url(doc.api.base_url),
            client_id: doc.api.client_id,
            tokens,
            display: doc.display,
        })
    }
}

fn normalize_base_url(url: String) -> String {
    url.trim().trim_end_matches('/').to_string()
}

/// Check that a profile name is non-empty and filesystem-safe.
///
/// Accepted characters are ASCII letters, digits, `-`, `_` and `.`; the
/// name may not start with `.`. Names are case-sensitive.
pub fn validate_profile_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("profile name must not be empty".to_string());
    }
    if name.len() > MAX_PROFILE_NAME_LEN {
        return Err(format!(
            "profile name must be at most {MAX_PROFILE_NAME_LEN} characters"
        ));
    }
    if name.starts_with('.') {
        return Err("profile name must not start with '.'".to_string());
    }
    if let Some(c) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
    {
        return Err(format!("profile name contains invalid character '{c}'"));
    }
    Ok(())
}

/// Check that a base URL is an absolute http(s) URL without credentials.
pub fn validate_base_url(base_url: &str) -> Result<(), String> {
    let url = url::Url::parse(base_url.trim()).map_err(|e| format!("invalid base_url: {e}"))?;
    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(format!("base_url scheme '{scheme}' is not http or https")),
    }
    if !url.username().is_empty() || url.password().is_some() {
        return Err("base_url must not embed credentials".to_string());
    }
    Ok(())
}

#[derive(Serialize, Deserialize)]
struct ProfileDocument {
    api: ApiSection,
    #[serde(default, skip_serializing_if = "AuthSection::is_empty")]
    auth: AuthSection,
    #[serde(default, skip_serializing_if = "DisplayPreferences::is_empty")]
    display: DisplayPreferences,
}

#[derive(Serialize, Deserialize)]
struct ApiSection {
    base_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    client_id: Option<String>,
}

#[derive(Default, Serialize, Deserialize)]
struct AuthSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    access_token_expires_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    refresh_token_expires_at: Option<DateTime<Utc>>,
}

impl AuthSection {
    fn from_pair(pair: &TokenPair) -> Self {
        Self {
            access_token: Some(pair.access_token().to_string()),
            refresh_token: Some(pair.refresh_token().to_string()),
            access_token_expires_at: Some(pair.access_expires_at()),
            refresh_token_expires_at: Some(pair.refresh_expires_at()),
        }
    }

    fn is_empty(&self) -> bool {
        self.access_token.is_none()
            && self.refresh_token.is_none()
            && self.access_token_expires_at.is_none()
            && self.refresh_token_expires_at.is_none()
    }

    fn into_pair(self) -> Result<Option<TokenPair>, String> {
        if self.is_empty() {
            return Ok(None);
        }
        match (
            self.access_token,
            self.refresh_token,
            self.access_token_expires_at,
            self.refresh_token_expires_at,
        ) {
            (Some(access), Some(refresh), Some(access_exp), Some(refresh_exp)) => {
                TokenPair::new(access, refresh, access_exp, refresh_exp)
                    .map(Some)
                    .map_err(|e| format!("invalid [auth] section: {e}"))
            }
            _ => Err("incomplete [auth] section: all four token fields are required".to_string()),
        }
    }
}
