//! Local HTTP listener capturing the OAuth authorization redirect.
//!
//! The listener binds `127.0.0.1` on an OS-assigned port and serves a
//! single route, [`CALLBACK_PATH`]. The first request to that route
//! completes the attempt, valid or not; later requests get `410 Gone`.
//! Whatever ends the wait (redirect, deadline, interrupt) the server is
//! shut down and its port released before [`CallbackListener::await_callback`]
//! returns.

use axum::Router;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use std::collections::HashMap;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::constants::{CALLBACK_PATH, LISTENER_SHUTDOWN_GRACE};
use crate::error::{AuthError, Outcome};
use crate::pkce::{Pkce, random_urlsafe};
use crate::types::AuthorizationCode;

/// Random bytes in a generated anti-forgery token.
const STATE_BYTES: usize = 32;

const SUCCESS_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Dashtam CLI</title></head>
<body>
    <h1>Login complete</h1>
    <p>You can close this window and return to the terminal.</p>
    <script>window.close();</script>
</body>
</html>
"#;

const MISMATCH_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Dashtam CLI - Error</title></head>
<body>
    <h1>Login failed</h1>
    <p>This redirect does not belong to the login started in your terminal.
    Run <code>dashtam login</code> again.</p>
</body>
</html>
"#;

const DENIED_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Dashtam CLI - Error</title></head>
<body>
    <h1>Login failed</h1>
    <p>Authorization was not granted. Check the terminal for details.</p>
</body>
</html>
"#;

const GONE_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Dashtam CLI</title></head>
<body>
    <h1>Login already handled</h1>
    <p>This login attempt has finished. You can close this window.</p>
</body>
</html>
"#;

/// Ephemeral state of one login attempt.
#[derive(Debug)]
pub struct AuthState {
    token: String,
    redirect_path: &'static str,
    deadline: Instant,
    pkce: Pkce,
}

impl AuthState {
    /// Fresh random anti-forgery token and PKCE verifier, valid for `ttl`.
    pub fn generate(ttl: Duration) -> Self {
        Self::with_token(random_urlsafe(STATE_BYTES), ttl)
    }

    /// State with a caller-chosen anti-forgery token.
    pub fn with_token(token: impl Into<String>, ttl: Duration) -> Self {
        Self {
            token: token.into(),
            redirect_path: CALLBACK_PATH,
            deadline: Instant::now() + ttl,
            pkce: Pkce::generate(),
        }
    }

    /// The value sent as the `state` parameter.
    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn redirect_path(&self) -> &str {
        self.redirect_path
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn pkce(&self) -> &Pkce {
        &self.pkce
    }

    /// Time left before the deadline.
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Constant-time comparison with a received `state` value.
    pub fn matches(&self, received: &str) -> bool {
        constant_time_eq(&self.token, received)
    }
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes().zip(b.bytes()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Check a redirect's query parameters against the expected state token.
///
/// State is checked first: a provider error or missing code is only
/// trusted once the redirect is known to belong to this attempt.
pub fn validate_callback(
    expected: &AuthState,
    params: &HashMap<String, String>,
) -> Outcome<AuthorizationCode> {
    let received = params
        .get("state")
        .ok_or_else(|| AuthError::state_mismatch("redirect did not include a state parameter"))?;
    if !expected.matches(received) {
        return Err(AuthError::state_mismatch(
            "state parameter does not match this login attempt",
        ));
    }

    if let Some(error) = params.get("error") {
        let description = params
            .get("error_description")
            .map(String::as_str)
            .unwrap_or("no description");
        return Err(AuthError::invalid_credentials(format!(
            "authorization denied: {error} ({description})"
        )));
    }

    match params.get("code").map(|c| c.trim()) {
        Some(code) if !code.is_empty() => Ok(AuthorizationCode::new(code)),
        _ => Err(AuthError::invalid_credentials(
            "redirect did not include an authorization code",
        )),
    }
}

type Verdict = Outcome<AuthorizationCode>;

struct Shared {
    expected: AuthState,
    sender: Mutex<Option<oneshot::Sender<Verdict>>>,
}

impl Shared {
    /// Claim the single completing request.
    fn take_sender(&self) -> Option<oneshot::Sender<Verdict>> {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

async fn handle_callback(
    State(shared): State<Arc<Shared>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let Some(sender) = shared.take_sender() else {
        tracing::debug!("Ignoring callback after the login attempt completed");
        return (StatusCode::GONE, Html(GONE_PAGE)).into_response();
    };

    let verdict = validate_callback(&shared.expected, &params);
    let response = match &verdict {
        Ok(_) => {
            tracing::debug!("OAuth callback accepted");
            (StatusCode::OK, Html(SUCCESS_PAGE)).into_response()
        }
        Err(e @ AuthError::StateMismatch { .. }) => {
            tracing::warn!(error = %e, "Rejected OAuth callback");
            (StatusCode::BAD_REQUEST, Html(MISMATCH_PAGE)).into_response()
        }
        Err(e) => {
            tracing::warn!(error = %e, "OAuth callback reported failure");
            (StatusCode::BAD_REQUEST, Html(DENIED_PAGE)).into_response()
        }
    };

    // The waiter may already be gone (timeout); the page is still returned.
    let _ = sender.send(verdict);
    response
}

/// A running callback listener for one login attempt.
pub struct CallbackListener {
    local_addr: SocketAddr,
    expected_token: String,
    result_rx: oneshot::Receiver<Verdict>,
    shutdown: CancellationToken,
    interrupt: CancellationToken,
    server: JoinHandle<()>,
}

impl std::fmt::Debug for CallbackListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackListener")
            .field("local_addr", &self.local_addr)
            .finish_non_exhaustive()
    }
}

impl CallbackListener {
    /// Bind a listener and generate the state for a new login attempt.
    pub async fn start(ttl: Duration) -> Outcome<(Self, AuthState)> {
        let state = AuthState::generate(ttl);
        let listener = Self::bind(&state).await?;
        Ok((listener, state))
    }

    /// Bind a listener that accepts redirects carrying `state`'s token.
    pub async fn bind(state: &AuthState) -> Outcome<Self> {
        let tcp = tokio::net::TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
            .await
            .map_err(|e| {
                AuthError::network("could not bind the login callback listener", Some(Box::new(e)))
            })?;
        let local_addr = tcp.local_addr().map_err(|e| {
            AuthError::network("callback listener has no local address", Some(Box::new(e)))
        })?;

        let (tx, result_rx) = oneshot::channel();
        let shared = Arc::new(Shared {
            expected: AuthState {
                token: state.token.clone(),
                redirect_path: state.redirect_path,
                deadline: state.deadline,
                pkce: state.pkce.clone(),
            },
            sender: Mutex::new(Some(tx)),
        });

        let app = Router::new()
            .route(state.redirect_path, get(handle_callback))
            .with_state(shared);

        let shutdown = CancellationToken::new();
        let server = tokio::spawn({
            let signal = shutdown.clone().cancelled_owned();
            async move {
                if let Err(e) = axum::serve(tcp, app).with_graceful_shutdown(signal).await {
                    tracing::warn!(error = %e, "Callback listener failed");
                }
            }
        });

        tracing::debug!(port = local_addr.port(), "Callback listener started");
        Ok(Self {
            local_addr,
            expected_token: state.token.clone(),
            result_rx,
            shutdown,
            interrupt: CancellationToken::new(),
            server,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Redirect URI to register in the authorization request.
    pub fn redirect_uri(&self) -> String {
        format!("http://{}{CALLBACK_PATH}", self.local_addr)
    }

    /// Token that aborts [`await_callback`](Self::await_callback) when cancelled.
    pub fn interrupt_handle(&self) -> CancellationToken {
        self.interrupt.clone()
    }

    /// Wait for the redirect, the deadline or an interrupt, whichever is
    /// first, then stop the listener.
    ///
    /// Waits at most `timeout`, and never past `state`'s deadline. Ctrl-C
    /// and the [`interrupt_handle`](Self::interrupt_handle) both end the
    /// wait with `CallbackTimeout`.
    pub async fn await_callback(
        mut self,
        state: AuthState,
        timeout: Duration,
    ) -> Outcome<AuthorizationCode> {
        let ctrl_c = tokio::spawn({
            let interrupt = self.interrupt.clone();
            async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    interrupt.cancel();
                }
            }
        });

        let wait = timeout.min(state.remaining());
        let outcome = if !state.matches(&self.expected_token) {
            Err(AuthError::state_mismatch(
                "listener was started for a different login attempt",
            ))
        } else {
            tokio::select! {
                received = &mut self.result_rx => match received {
                    Ok(verdict) => verdict,
                    Err(_) => Err(AuthError::network("callback listener stopped unexpectedly", None)),
                },
                _ = tokio::time::sleep(wait) => Err(AuthError::callback_timeout(format!(
                    "no redirect received within {}s",
                    wait.as_secs()
                ))),
                _ = self.interrupt.cancelled() => Err(AuthError::callback_timeout("login interrupted")),
            }
        };

        ctrl_c.abort();
        self.stop().await;
        drop(state);

        match &outcome {
            Ok(_) => tracing::debug!("Authorization code received"),
            Err(e) => tracing::debug!(error = %e, "Login callback failed"),
        }
        outcome
    }

    /// Shut the server down, aborting it once the grace period runs out.
    async fn stop(&mut self) {
        self.shutdown.cancel();
        if tokio::time::timeout(LISTENER_SHUTDOWN_GRACE, &mut self.server)
            .await
            .is_err()
        {
            tracing::debug!("Callback listener did not drain in time, aborting");
            self.server.abort();
            let _ = (&mut self.server).await;
        }
        tracing::debug!(port = self.local_addr.port(), "Callback listener stopped");
    }
}

impl Drop for CallbackListener {
    fn drop(&mut self) {
        self.shutdown.cancel();
        self.server.abort();
    }
}
