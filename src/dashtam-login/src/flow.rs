//! Browser-based login: authorize URL, redirect capture, code exchange.
//!
//! Two tasks run side by side: the callback listener waits for the
//! redirect while a [`UrlPresenter`] shows (or opens) the authorization
//! URL. The first of redirect, deadline or interrupt ends the wait; the
//! presenter is then cancelled. Credentials are only written after a
//! successful exchange.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

use crate::constants::{AUTHORIZE_PATH, CLIENT_ID, DEFAULT_CALLBACK_TIMEOUT};
use crate::credentials::{CodeExchange, CredentialManager};
use crate::error::Outcome;
use crate::pkce::CHALLENGE_METHOD;
use crate::profile::Profile;
use crate::server::{AuthState, CallbackListener};
use crate::types::TokenPair;

/// Shows the authorization URL to the user.
#[async_trait]
pub trait UrlPresenter: Send + Sync {
    async fn present(&self, url: &str) -> Outcome<()>;
}

/// Prints the URL to stderr and opens it in the default browser unless
/// the environment looks headless.
#[derive(Debug, Clone, Copy)]
pub struct BrowserPresenter {
    open_browser: bool,
}

impl BrowserPresenter {
    pub fn new(open_browser: bool) -> Self {
        Self { open_browser }
    }

    /// Open the browser only when a display is likely available.
    pub fn detect() -> Self {
        Self::new(!is_headless_environment())
    }
}

#[async_trait]
impl UrlPresenter for BrowserPresenter {
    async fn present(&self, url: &str) -> Outcome<()> {
        eprintln!("\nTo log in, open this URL in your browser:");
        eprintln!("\n  {url}\n");

        if !self.open_browser {
            tracing::info!(is_headless = true, "Skipping browser open");
            return Ok(());
        }

        match open_in_browser(url) {
            Ok(()) => eprintln!("(Opening browser...)"),
            Err(e) => {
                tracing::debug!(error = %e, "Failed to open browser automatically");
                eprintln!("(Could not open a browser automatically, please open the URL manually)");
            }
        }
        eprintln!("Waiting for the login to complete...");
        Ok(())
    }
}

/// Whether there is probably no local display to open a browser on.
pub fn is_headless_environment() -> bool {
    let set = |name: &str| std::env::var_os(name).is_some_and(|v| !v.is_empty());

    if set("CI") || set("GITHUB_ACTIONS") {
        return true;
    }
    if (set("SSH_CLIENT") || set("SSH_TTY") || set("SSH_CONNECTION")) && !set("DISPLAY") {
        return true;
    }
    if cfg!(target_os = "linux") && !set("DISPLAY") && !set("WAYLAND_DISPLAY") {
        return true;
    }
    false
}

/// Open an http(s) URL without embedded credentials in the default browser.
fn open_in_browser(url: &str) -> Result<(), String> {
    let parsed = url::Url::parse(url).map_err(|e| format!("invalid URL: {e}"))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(format!("refusing to open '{}' URL", parsed.scheme()));
    }
    if !parsed.username().is_empty() || parsed.password().is_some() {
        return Err("refusing to open URL with embedded credentials".to_string());
    }

    let mut command = if cfg!(target_os = "macos") {
        let mut c = std::process::Command::new("open");
        c.arg("--");
        c
    } else if cfg!(target_os = "windows") {
        let mut c = std::process::Command::new("cmd");
        c.args(["/C", "start", ""]);
        c
    } else {
        std::process::Command::new("xdg-open")
    };

    command
        .arg(parsed.as_str())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()
        .map(|_| ())
        .map_err(|e| format!("failed to launch browser: {e}"))
}

/// Options for one login attempt.
#[derive(Debug, Clone)]
pub struct LoginOptions {
    /// Log in even if the profile still has usable credentials.
    pub force: bool,
    /// How long to wait for the browser redirect.
    pub timeout: Duration,
}

impl Default for LoginOptions {
    fn default() -> Self {
        Self {
            force: false,
            timeout: DEFAULT_CALLBACK_TIMEOUT,
        }
    }
}

/// Result of [`LoginFlow::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    /// New credentials were obtained and stored.
    LoggedIn {
        access_expires_at: DateTime<Utc>,
        refresh_expires_at: DateTime<Utc>,
    },
    /// The profile already had a usable refresh token; nothing changed.
    AlreadyLoggedIn { refresh_expires_at: DateTime<Utc> },
}

/// Drives one login attempt for a profile.
pub struct LoginFlow {
    credentials: Arc<CredentialManager>,
    presenter: Arc<dyn UrlPresenter>,
}

impl LoginFlow {
    pub fn new(credentials: Arc<CredentialManager>, presenter: Arc<dyn UrlPresenter>) -> Self {
        Self {
            credentials,
            presenter,
        }
    }

    /// Log `profile` in through the browser.
    ///
    /// Skipped when the stored refresh token is still valid, unless
    /// `options.force`. On `StateMismatch` or `CallbackTimeout` nothing is
    /// written.
    pub async fn run(&self, profile: &str, options: &LoginOptions) -> Outcome<LoginOutcome> {
        let record = self.credentials.load_profile(profile)?;

        if !options.force
            && let Some(pair) = record.tokens()
            && !pair.refresh_expired(Utc::now())
        {
            tracing::info!(profile = %profile, "Already logged in, skipping login");
            return Ok(LoginOutcome::AlreadyLoggedIn {
                refresh_expires_at: pair.refresh_expires_at(),
            });
        }

        let (listener, state) = CallbackListener::start(options.timeout).await?;
        let redirect_uri = listener.redirect_uri();
        let client_id = record.client_id.as_deref().unwrap_or(CLIENT_ID).to_string();
        let auth_url = authorize_url(&record, &client_id, &redirect_uri, &state);
        let pkce = state.pkce().clone();

        tracing::info!(
            profile = %profile,
            port = listener.local_addr().port(),
            "Waiting for login redirect"
        );

        let presenter = Arc::clone(&self.presenter);
        let presenting = tokio::spawn(async move {
            if let Err(e) = presenter.present(&auth_url).await {
                tracing::warn!(error = %e, "Could not present the login URL");
            }
        });

        let callback = listener.await_callback(state, options.timeout).await;
        presenting.abort();
        let code = callback?;

        let response = self
            .credentials
            .endpoint()
            .exchange_code(CodeExchange {
                base_url: record.base_url(),
                client_id: &client_id,
                code: &code,
                redirect_uri: &redirect_uri,
                code_verifier: pkce.verifier(),
            })
            .await?;

        let pair = TokenPair::from_response(response, Utc::now(), None)?;
        let outcome = LoginOutcome::LoggedIn {
            access_expires_at: pair.access_expires_at(),
            refresh_expires_at: pair.refresh_expires_at(),
        };
        self.credentials.store_new_pair(profile, pair).await?;

        tracing::info!(profile = %profile, "Login successful");
        Ok(outcome)
    }
}

/// Authorization request URL for `profile`.
pub fn authorize_url(
    profile: &Profile,
    client_id: &str,
    redirect_uri: &str,
    state: &AuthState,
) -> String {
    format!(
        "{}?response_type=code&client_id={}&redirect_uri={}&state={}&code_challenge={}&code_challenge_method={}",
        profile.endpoint(AUTHORIZE_PATH),
        urlencoding::encode(client_id),
        urlencoding::encode(redirect_uri),
        urlencoding::encode(state.token()),
        urlencoding::encode(state.pkce().challenge()),
        CHALLENGE_METHOD,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_authorize_url_parameters() {
        let profile = Profile::new("dev", "https://api.dashtam.dev/");
        let state = AuthState::with_token("abc123", Duration::from_secs(60));
        let url = authorize_url(
            &profile,
            "dashtam-cli",
            "http://127.0.0.1:4242/callback",
            &state,
        );

        let parsed = url::Url::parse(&url).unwrap();
        assert_eq!(parsed.path(), "/oauth/authorize");
        let query: HashMap<_, _> = parsed.query_pairs().into_owned().collect();
        assert_eq!(query["response_type"], "code");
        assert_eq!(query["client_id"], "dashtam-cli");
        assert_eq!(query["redirect_uri"], "http://127.0.0.1:4242/callback");
        assert_eq!(query["state"], "abc123");
        assert_eq!(query["code_challenge"], state.pkce().challenge());
        assert_eq!(query["code_challenge_method"], "S256");
    }

    #[test]
    fn test_browser_refuses_unsafe_urls() {
        assert!(open_in_browser("file:///etc/passwd").is_err());
        assert!(open_in_browser("https://user:pw@example.com/").is_err());
        assert!(open_in_browser("not a url").is_err());
    }
}
