mod common;

use std::time::{Duration, Instant};

use common::http_client;
use dashtam_login::constants::LISTENER_SHUTDOWN_GRACE;
use dashtam_login::{AuthState, CallbackListener, ErrorKind};

const WAIT: Duration = Duration::from_secs(10);

fn abc123() -> AuthState {
    AuthState::with_token("abc123", Duration::from_secs(60))
}

/// Issue the redirect in the background, returning its HTTP status.
fn redirect(listener: &CallbackListener, query: &str) -> tokio::task::JoinHandle<u16> {
    let url = format!("{}?{query}", listener.redirect_uri());
    tokio::spawn(async move {
        http_client()
            .get(url)
            .send()
            .await
            .map(|r| r.status().as_u16())
            .unwrap_or(0)
    })
}

async fn port_is_closed(addr: std::net::SocketAddr) -> bool {
    tokio::net::TcpStream::connect(addr).await.is_err()
}

#[tokio::test]
async fn test_matching_redirect_returns_code() {
    let state = abc123();
    let listener = CallbackListener::bind(&state).await.unwrap();
    let addr = listener.local_addr();
    assert!(addr.ip().is_loopback());

    let browser = redirect(&listener, "code=XYZ&state=abc123");
    let code = listener.await_callback(state, WAIT).await.unwrap();

    assert_eq!(code.as_str(), "XYZ");
    assert_eq!(browser.await.unwrap(), 200);
    assert!(port_is_closed(addr).await);
}

#[tokio::test]
async fn test_mismatched_state_stops_listener() {
    let state = abc123();
    let listener = CallbackListener::bind(&state).await.unwrap();
    let addr = listener.local_addr();

    let browser = redirect(&listener, "code=XYZ&state=wrong");
    let err = listener.await_callback(state, WAIT).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::StateMismatch);
    assert_eq!(browser.await.unwrap(), 400);
    assert!(port_is_closed(addr).await);
}

#[tokio::test]
async fn test_missing_state_is_mismatch() {
    let state = abc123();
    let listener = CallbackListener::bind(&state).await.unwrap();

    let _browser = redirect(&listener, "code=XYZ");
    let err = listener.await_callback(state, WAIT).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::StateMismatch);
}

#[tokio::test]
async fn test_provider_error_is_invalid_credentials() {
    let state = abc123();
    let listener = CallbackListener::bind(&state).await.unwrap();

    let _browser = redirect(
        &listener,
        "error=access_denied&error_description=User%20cancelled&state=abc123",
    );
    let err = listener.await_callback(state, WAIT).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidCredentials);
    assert!(err.to_string().contains("access_denied"));
}

#[tokio::test]
async fn test_only_first_request_counts() {
    let state = abc123();
    let listener = CallbackListener::bind(&state).await.unwrap();

    let first = redirect(&listener, "code=XYZ&state=abc123").await.unwrap();
    let second = redirect(&listener, "code=OTHER&state=abc123").await.unwrap();
    assert_eq!(first, 200);
    assert_eq!(second, 410);

    let code = listener.await_callback(state, WAIT).await.unwrap();
    assert_eq!(code.as_str(), "XYZ");
}

#[tokio::test]
async fn test_other_paths_do_not_complete_the_attempt() {
    let state = abc123();
    let listener = CallbackListener::bind(&state).await.unwrap();

    let favicon = http_client()
        .get(format!("http://{}/favicon.ico", listener.local_addr()))
        .send()
        .await
        .unwrap();
    assert_eq!(favicon.status().as_u16(), 404);

    let _browser = redirect(&listener, "code=XYZ&state=abc123");
    let code = listener.await_callback(state, WAIT).await.unwrap();
    assert_eq!(code.as_str(), "XYZ");
}

#[tokio::test]
async fn test_timeout_releases_port() {
    let timeout = Duration::from_millis(300);
    let (listener, state) = CallbackListener::start(Duration::from_secs(60)).await.unwrap();
    let addr = listener.local_addr();

    let started = Instant::now();
    let err = listener.await_callback(state, timeout).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::CallbackTimeout);
    assert!(started.elapsed() < timeout + LISTENER_SHUTDOWN_GRACE + Duration::from_secs(1));
    // The same port can be bound again right away.
    assert!(tokio::net::TcpListener::bind(addr).await.is_ok());
}

#[tokio::test]
async fn test_deadline_caps_the_wait() {
    let state = AuthState::with_token("abc123", Duration::from_millis(200));
    let listener = CallbackListener::bind(&state).await.unwrap();

    let started = Instant::now();
    let err = listener
        .await_callback(state, Duration::from_secs(60))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::CallbackTimeout);
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_interrupt_stops_listener() {
    let (listener, state) = CallbackListener::start(Duration::from_secs(60)).await.unwrap();
    let addr = listener.local_addr();
    let interrupt = listener.interrupt_handle();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        interrupt.cancel();
    });
    let err = listener.await_callback(state, WAIT).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::CallbackTimeout);
    assert!(err.to_string().contains("interrupted"));
    assert!(port_is_closed(addr).await);

    // A new attempt can start immediately.
    let (next, _state) = CallbackListener::start(Duration::from_secs(60)).await.unwrap();
    assert_ne!(next.local_addr().port(), 0);
}

#[tokio::test]
async fn test_state_from_another_attempt_is_rejected() {
    let listener = CallbackListener::bind(&abc123()).await.unwrap();
    let other = AuthState::generate(Duration::from_secs(60));

    let err = listener.await_callback(other, WAIT).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StateMismatch);
}

#[tokio::test]
async fn test_redirect_uri_shape() {
    let (listener, state) = CallbackListener::start(Duration::from_secs(60)).await.unwrap();
    let uri = listener.redirect_uri();
    assert_eq!(
        uri,
        format!("http://127.0.0.1:{}/callback", listener.local_addr().port())
    );
    assert_eq!(state.redirect_path(), "/callback");
    assert_eq!(state.token().len(), 43);
}
