mod common;

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{http_client, manager, pair_expiring_in, store_with, token_body};
use dashtam_login::{
    ErrorKind, LoginFlow, LoginOptions, LoginOutcome, Outcome, ProfileStore, UrlPresenter,
};

/// Plays the browser: follows the authorize URL straight to the redirect.
#[derive(Default)]
struct FakeBrowser {
    /// Overrides the `state` sent back, when set.
    forged_state: Option<&'static str>,
    /// Do nothing, as if the user never finished.
    idle: bool,
    seen: Mutex<Vec<String>>,
}

#[async_trait]
impl UrlPresenter for FakeBrowser {
    async fn present(&self, url: &str) -> Outcome<()> {
        self.seen.lock().unwrap().push(url.to_string());
        if self.idle {
            return Ok(());
        }

        let parsed = url::Url::parse(url).unwrap();
        let query: HashMap<_, _> = parsed.query_pairs().into_owned().collect();
        let state = match self.forged_state {
            Some(forged) => forged.to_string(),
            None => query["state"].clone(),
        };
        let redirect = format!("{}?code=XYZ&state={state}", query["redirect_uri"]);
        let _ = http_client().get(redirect).send().await;
        Ok(())
    }
}

fn options(force: bool) -> LoginOptions {
    LoginOptions {
        force,
        timeout: Duration::from_secs(10),
    }
}

async fn mount_token(server: &MockServer, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=XYZ"))
        .and(body_string_contains("code_verifier="))
        .and(body_string_contains("client_id=dashtam-cli"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(token_body("login-access", Some("login-refresh"), 900)),
        )
        .expect(expected_calls)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_login_stores_exchanged_pair() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    let (_temp, store) = store_with("dev", &server.uri(), None);
    let browser = Arc::new(FakeBrowser::default());
    let flow = LoginFlow::new(Arc::new(manager(store.clone())), browser.clone());

    let outcome = flow.run("dev", &options(false)).await.unwrap();

    assert!(matches!(outcome, LoginOutcome::LoggedIn { .. }));
    let stored = store.load("dev").unwrap();
    let pair = stored.tokens().unwrap();
    assert_eq!(pair.access_token(), "login-access");
    assert_eq!(pair.refresh_token(), "login-refresh");

    let seen = browser.seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert!(seen[0].starts_with(&format!("{}/oauth/authorize?", server.uri())));
}

#[tokio::test]
async fn test_login_skipped_while_refresh_token_valid() {
    let server = MockServer::start().await;
    mount_token(&server, 0).await;
    let original = pair_expiring_in(-60);
    let (_temp, store) = store_with("dev", &server.uri(), Some(original.clone()));
    let browser = Arc::new(FakeBrowser::default());
    let flow = LoginFlow::new(Arc::new(manager(store.clone())), browser.clone());

    let outcome = flow.run("dev", &options(false)).await.unwrap();

    assert_eq!(
        outcome,
        LoginOutcome::AlreadyLoggedIn {
            refresh_expires_at: original.refresh_expires_at()
        }
    );
    assert!(browser.seen.lock().unwrap().is_empty());
    assert_eq!(store.load("dev").unwrap().tokens(), Some(&original));
}

#[tokio::test]
async fn test_forced_login_replaces_pair() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    let (_temp, store) = store_with("dev", &server.uri(), Some(pair_expiring_in(3600)));
    let flow = LoginFlow::new(
        Arc::new(manager(store.clone())),
        Arc::new(FakeBrowser::default()),
    );

    flow.run("dev", &options(true)).await.unwrap();

    let stored = store.load("dev").unwrap();
    assert_eq!(stored.tokens().unwrap().access_token(), "login-access");
}

#[tokio::test]
async fn test_forged_state_writes_nothing() {
    let server = MockServer::start().await;
    mount_token(&server, 0).await;
    let (_temp, store) = store_with("dev", &server.uri(), None);
    let browser = Arc::new(FakeBrowser {
        forged_state: Some("forged"),
        ..Default::default()
    });
    let flow = LoginFlow::new(Arc::new(manager(store.clone())), browser);

    let err = flow.run("dev", &options(false)).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::StateMismatch);
    assert!(store.load("dev").unwrap().tokens().is_none());
}

#[tokio::test]
async fn test_timeout_writes_nothing() {
    let server = MockServer::start().await;
    mount_token(&server, 0).await;
    let (_temp, store) = store_with("dev", &server.uri(), None);
    let browser = Arc::new(FakeBrowser {
        idle: true,
        ..Default::default()
    });
    let flow = LoginFlow::new(Arc::new(manager(store.clone())), browser);

    let err = flow
        .run(
            "dev",
            &LoginOptions {
                force: false,
                timeout: Duration::from_millis(300),
            },
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::CallbackTimeout);
    assert!(store.load("dev").unwrap().tokens().is_none());
}

#[tokio::test]
async fn test_rejected_code_is_invalid_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "Authorization code expired"
        })))
        .expect(1)
        .mount(&server)
        .await;
    let (_temp, store) = store_with("dev", &server.uri(), None);
    let flow = LoginFlow::new(
        Arc::new(manager(store.clone())),
        Arc::new(FakeBrowser::default()),
    );

    let err = flow.run("dev", &options(false)).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidCredentials);
    assert!(err.to_string().contains("Authorization code expired"));
    assert!(store.load("dev").unwrap().tokens().is_none());
}

#[tokio::test]
async fn test_unknown_profile() {
    let (_temp, store) = store_with("dev", "https://api.dashtam.dev", None);
    let flow = LoginFlow::new(Arc::new(manager(store)), Arc::new(FakeBrowser::default()));
    let err = flow.run("prod", &options(false)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConfigNotFound);
}
