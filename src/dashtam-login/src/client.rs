//! Authenticated API requests with a single refresh-and-retry on 401.

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;

use dashtam_common::create_default_client;

use crate::credentials::CredentialManager;
use crate::error::{AuthError, Outcome};
use crate::types::AccessToken;

/// An API request relative to the profile's base URL.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>, body: serde_json::Value) -> Self {
        Self::new(Method::POST, path).with_body(body)
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// Status and body of an API response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Decode the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Outcome<T> {
        serde_json::from_str(&self.body).map_err(|e| {
            AuthError::unexpected_status(self.status, format!("invalid JSON body: {e}"))
        })
    }
}

/// Carries one request to the API with the given bearer token.
///
/// Returns every HTTP response, whatever its status; only transport
/// failures are errors (`NetworkError`).
#[async_trait]
pub trait ApiTransport: Send + Sync {
    async fn execute(
        &self,
        base_url: &str,
        request: &ApiRequest,
        token: &AccessToken,
    ) -> Outcome<ApiResponse>;
}

/// [`ApiTransport`] over reqwest.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Outcome<Self> {
        let client = create_default_client().map_err(|e| AuthError::network(e, None))?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ApiTransport for ReqwestTransport {
    async fn execute(
        &self,
        base_url: &str,
        request: &ApiRequest,
        token: &AccessToken,
    ) -> Outcome<ApiResponse> {
        let url = format!("{base_url}{}", request.path);
        let mut builder = self
            .client
            .request(request.method.clone(), &url)
            .header(reqwest::header::AUTHORIZATION, token.bearer());
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        tracing::debug!(method = %request.method, url = %url, status, "API request completed");
        Ok(ApiResponse { status, body })
    }
}

/// Sends API requests on behalf of a profile.
pub struct AuthenticatedClient {
    credentials: Arc<CredentialManager>,
    transport: Arc<dyn ApiTransport>,
}

impl AuthenticatedClient {
    pub fn new(credentials: Arc<CredentialManager>, transport: Arc<dyn ApiTransport>) -> Self {
        Self {
            credentials,
            transport,
        }
    }

    /// Send `request` with `profile`'s credentials.
    ///
    /// On a 401 the token is force-refreshed once and the request retried
    /// once; a second 401 is `InvalidCredentials`. Other non-2xx statuses
    /// are `UnexpectedStatus` with the body attached.
    pub async fn send(&self, request: &ApiRequest, profile: &str) -> Outcome<ApiResponse> {
        let base_url = self.credentials.load_profile(profile)?.base_url().to_string();

        let token = self.credentials.get_valid_token(profile).await?;
        let response = self.transport.execute(&base_url, request, &token).await?;
        if response.status != StatusCode::UNAUTHORIZED.as_u16() {
            return into_outcome(response);
        }

        tracing::info!(profile = %profile, path = %request.path, "Request unauthorized, refreshing token");
        let token = self.credentials.force_refresh(profile, &token).await?;
        let retry = self.transport.execute(&base_url, request, &token).await?;
        if retry.status == StatusCode::UNAUTHORIZED.as_u16() {
            tracing::warn!(profile = %profile, "Request still unauthorized after refresh");
            return Err(AuthError::invalid_credentials(
                "server rejected the refreshed credentials, run `dashtam login`",
            ));
        }
        into_outcome(retry)
    }
}

fn into_outcome(response: ApiResponse) -> Outcome<ApiResponse> {
    if response.is_success() {
        Ok(response)
    } else {
        Err(AuthError::unexpected_status(response.status, response.body))
    }
}
