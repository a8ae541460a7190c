mod common;

use chrono::Utc;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{closed_port_url, manager, pair_expiring_in, store_with, token_body};
use dashtam_login::{AccessToken, ErrorKind, ProfileStore, TokenPair};

async fn mount_refresh(server: &MockServer, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path("/api/v1/auth/refresh"))
        .and(body_json(json!({ "refresh_token": "old-refresh" })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(token_body("new-access", Some("new-refresh"), 900)),
        )
        .expect(expected_calls)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_near_expiry_token_is_refreshed_and_persisted() {
    let server = MockServer::start().await;
    mount_refresh(&server, 1).await;
    let (_temp, store) = store_with("dev", &server.uri(), Some(pair_expiring_in(10)));
    let manager = manager(store.clone());

    let token = manager.get_valid_token("dev").await.unwrap();

    let stored = store.load("dev").unwrap();
    let pair = stored.tokens().unwrap();
    assert_eq!(token.expose(), "new-access");
    assert_eq!(pair.access_token(), token.expose());
    assert_eq!(pair.refresh_token(), "new-refresh");
    assert!(pair.access_expires_at() >= Utc::now() + chrono::Duration::minutes(5));
}

#[tokio::test]
async fn test_refresh_triggered_only_within_margin() {
    for (remaining, refreshes) in [(0, 1), (30, 1), (61, 0)] {
        let server = MockServer::start().await;
        mount_refresh(&server, refreshes).await;
        let (_temp, store) = store_with("dev", &server.uri(), Some(pair_expiring_in(remaining)));

        let token = manager(store).get_valid_token("dev").await.unwrap();

        let expected = if refreshes == 1 { "new-access" } else { "old-access" };
        assert_eq!(token.expose(), expected, "remaining={remaining}s");
        server.verify().await;
    }
}

#[tokio::test]
async fn test_rejected_refresh_keeps_stored_pair() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/auth/refresh"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "detail": "revoked" })))
        .expect(1)
        .mount(&server)
        .await;
    let original = pair_expiring_in(5);
    let (_temp, store) = store_with("dev", &server.uri(), Some(original.clone()));

    let err = manager(store.clone()).get_valid_token("dev").await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::RefreshFailed);
    assert!(err.to_string().contains("revoked"));
    assert_eq!(store.load("dev").unwrap().tokens(), Some(&original));
}

#[tokio::test]
async fn test_unreachable_refresh_endpoint_is_refresh_failed() {
    let original = pair_expiring_in(5);
    let (_temp, store) = store_with("dev", &closed_port_url(), Some(original.clone()));

    let err = manager(store.clone()).get_valid_token("dev").await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::RefreshFailed);
    assert_eq!(store.load("dev").unwrap().tokens(), Some(&original));
}

#[tokio::test]
async fn test_slow_refresh_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/auth/refresh"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(token_body("new-access", None, 900))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;
    let original = pair_expiring_in(5);
    let (_temp, store) = store_with("dev", &server.uri(), Some(original.clone()));
    let manager = manager(store.clone()).with_refresh_timeout(Duration::from_millis(200));

    let err = manager.get_valid_token("dev").await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::RefreshFailed);
    assert_eq!(store.load("dev").unwrap().tokens(), Some(&original));
}

#[tokio::test]
async fn test_expired_refresh_token_requires_login() {
    let server = MockServer::start().await;
    mount_refresh(&server, 0).await;
    let past = Utc::now() - chrono::Duration::minutes(1);
    let pair = TokenPair::new("old-access", "old-refresh", past, past).unwrap();
    let (_temp, store) = store_with("dev", &server.uri(), Some(pair.clone()));

    let err = manager(store.clone()).get_valid_token("dev").await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::TokenExpired);
    assert_eq!(store.load("dev").unwrap().tokens(), Some(&pair));
}

#[tokio::test]
async fn test_profile_without_pair_is_invalid_credentials() {
    let (_temp, store) = store_with("dev", "https://api.dashtam.dev", None);
    let err = manager(store).get_valid_token("dev").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidCredentials);
}

#[tokio::test]
async fn test_unknown_profile_is_config_not_found() {
    let (_temp, store) = store_with("dev", "https://api.dashtam.dev", None);
    let err = manager(store).get_valid_token("prod").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConfigNotFound);
}

#[tokio::test]
async fn test_unrotated_refresh_token_is_kept() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/auth/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("new-access", None, 900)))
        .mount(&server)
        .await;
    let original = pair_expiring_in(0);
    let (_temp, store) = store_with("dev", &server.uri(), Some(original.clone()));

    manager(store.clone()).get_valid_token("dev").await.unwrap();

    let stored = store.load("dev").unwrap();
    let pair = stored.tokens().unwrap();
    assert_eq!(pair.access_token(), "new-access");
    assert_eq!(pair.refresh_token(), "old-refresh");
    assert_eq!(pair.refresh_expires_at(), original.refresh_expires_at());
}

#[tokio::test]
async fn test_concurrent_callers_share_one_refresh() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/auth/refresh"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(token_body("new-access", Some("new-refresh"), 900))
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&server)
        .await;
    let (_temp, store) = store_with("dev", &server.uri(), Some(pair_expiring_in(10)));
    let manager = Arc::new(manager(store));

    let (a, b, c) = tokio::join!(
        manager.get_valid_token("dev"),
        manager.get_valid_token("dev"),
        manager.get_valid_token("dev"),
    );

    for token in [a, b, c] {
        assert_eq!(token.unwrap().expose(), "new-access");
    }
}

#[tokio::test]
async fn test_force_refresh_bypasses_margin() {
    let server = MockServer::start().await;
    mount_refresh(&server, 1).await;
    let (_temp, store) = store_with("dev", &server.uri(), Some(pair_expiring_in(3600)));
    let manager = manager(store);

    let stale = manager.get_valid_token("dev").await.unwrap();
    assert_eq!(stale.expose(), "old-access");

    let fresh = manager.force_refresh("dev", &stale).await.unwrap();
    assert_eq!(fresh.expose(), "new-access");

    // The rejected token is no longer stored, so no second exchange.
    let again = manager.force_refresh("dev", &stale).await.unwrap();
    assert_eq!(again.expose(), "new-access");
}

#[tokio::test]
async fn test_store_new_pair_and_clear() {
    let (_temp, store) = store_with("dev", "https://api.dashtam.dev", Some(pair_expiring_in(60)));
    let manager = manager(store.clone());

    let replacement = pair_expiring_in(900);
    manager.store_new_pair("dev", replacement.clone()).await.unwrap();
    assert_eq!(store.load("dev").unwrap().tokens(), Some(&replacement));
    assert_eq!(
        manager.get_valid_token("dev").await.unwrap(),
        AccessToken::new("old-access")
    );

    assert!(manager.clear("dev").await.unwrap());
    assert!(store.load("dev").unwrap().tokens().is_none());
    assert!(!manager.clear("dev").await.unwrap());
    assert_eq!(store.load("dev").unwrap().base_url(), "https://api.dashtam.dev");
}
