//! HTTP client factory for the Dashtam CLI.
//!
//! Every outbound call is made with an explicit timeout so nothing hangs:
//! - `create_default_client()` - API calls, 30s
//! - `create_token_client()` - token exchange and refresh, 10s
//!
//! All clients include: User-Agent, tcp_nodelay, and a read timeout.

use reqwest::Client;
use std::time::Duration;

/// User-Agent string for all HTTP requests
pub const USER_AGENT: &str = concat!("dashtam-cli/", env!("CARGO_PKG_VERSION"));

/// Default timeout for standard API requests (30 seconds)
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Short timeout for token exchange and refresh (10 seconds)
pub const TOKEN_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection pool idle timeout so DNS is re-resolved periodically.
pub const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// Creates an HTTP client with default configuration (30s timeout).
pub fn create_default_client() -> Result<Client, String> {
    create_client_with_timeout(DEFAULT_TIMEOUT)
}

/// Creates an HTTP client for the token endpoints (10s timeout).
pub fn create_token_client() -> Result<Client, String> {
    create_client_with_timeout(TOKEN_TIMEOUT)
}

/// Creates an HTTP client with a custom timeout.
pub fn create_client_with_timeout(timeout: Duration) -> Result<Client, String> {
    let read_timeout = timeout.min(Duration::from_secs(60));

    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .read_timeout(read_timeout)
        .tcp_nodelay(true)
        .pool_idle_timeout(POOL_IDLE_TIMEOUT)
        .pool_max_idle_per_host(4)
        .build()
        .map_err(|e| format!("Failed to build HTTP client: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_default_client_succeeds() {
        assert!(create_default_client().is_ok());
    }

    #[test]
    fn test_create_token_client_succeeds() {
        assert!(create_token_client().is_ok());
    }

    #[test]
    fn test_user_agent_names_the_cli() {
        assert!(USER_AGENT.starts_with("dashtam-cli/"));
    }

    #[test]
    fn test_token_timeout_is_short() {
        assert!(TOKEN_TIMEOUT < DEFAULT_TIMEOUT);
    }
}
