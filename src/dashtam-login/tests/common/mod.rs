//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use chrono::{Duration, Utc};
use std::sync::Arc;

use dashtam_login::{
    CredentialManager, FileProfileStore, HttpTokenEndpoint, Profile, ProfileStore, TokenPair,
};

/// HTTP client that never goes through a system proxy.
pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .build()
        .expect("test client")
}

/// Pair whose access token expires in `secs` and refresh token in 30 days.
pub fn pair_expiring_in(secs: i64) -> TokenPair {
    let now = Utc::now();
    TokenPair::new(
        "old-access",
        "old-refresh",
        now + Duration::seconds(secs),
        now + Duration::days(30),
    )
    .expect("valid pair")
}

/// Temporary file store holding one profile named `name`.
pub fn store_with(
    name: &str,
    base_url: &str,
    tokens: Option<TokenPair>,
) -> (tempfile::TempDir, Arc<FileProfileStore>) {
    let temp = tempfile::tempdir().expect("tempdir");
    let store = Arc::new(FileProfileStore::with_dir(temp.path().join("profiles")));
    let mut profile = Profile::new(name, base_url);
    if let Some(tokens) = tokens {
        profile.set_tokens(tokens);
    }
    store.save(&profile).expect("save profile");
    (temp, store)
}

/// Credential manager over `store` using the real HTTP token endpoint.
pub fn manager(store: Arc<FileProfileStore>) -> CredentialManager {
    CredentialManager::new(
        store,
        Arc::new(HttpTokenEndpoint::with_client(http_client())),
    )
}

/// A loopback URL nothing is listening on.
pub fn closed_port_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().expect("addr").port();
    drop(listener);
    format!("http://127.0.0.1:{port}")
}

pub fn token_body(access: &str, refresh: Option<&str>, expires_in: u64) -> serde_json::Value {
    let mut body = serde_json::json!({
        "access_token": access,
        "token_type": "Bearer",
        "expires_in": expires_in,
    });
    if let Some(refresh) = refresh {
        body["refresh_token"] = serde_json::Value::String(refresh.to_string());
    }
    body
}
