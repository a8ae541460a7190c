//! Dashtam Login - authentication and credential lifecycle for Dashtam CLI.
//!
//! Provides:
//! - Profiles: one TOML record per API environment, written atomically
//! - Browser login through a local OAuth redirect listener (PKCE S256)
//! - Token refresh ahead of expiry, serialized per profile
//! - An API client that retries once after a forced refresh on 401

// Core modules
pub mod constants;
pub mod error;
pub mod types;

// Profiles and configuration
pub mod config;
pub mod profile;
pub mod store;

// Credential lifecycle
pub mod credentials;
pub mod pkce;

// Login flow
pub mod flow;
pub mod server;

// API access
pub mod client;

pub use error::{AuthError, BoxError, ErrorKind, Outcome};

pub use types::{AccessToken, AuthorizationCode, TokenPair, TokenResponse};

pub use profile::{
    DisplayPreferences, MAX_PROFILE_NAME_LEN, OutputStyle, Profile, validate_base_url,
    validate_profile_name,
};
pub use store::{FileProfileStore, MemoryProfileStore, ProfileStore};

pub use config::{ConfigContext, GlobalConfig, ProfileSource, resolve_active_profile};

pub use credentials::{CodeExchange, CredentialManager, HttpTokenEndpoint, TokenEndpoint};
pub use pkce::Pkce;

pub use flow::{
    BrowserPresenter, LoginFlow, LoginOptions, LoginOutcome, UrlPresenter, authorize_url,
    is_headless_environment,
};
pub use server::{AuthState, CallbackListener, validate_callback};

pub use client::{ApiRequest, ApiResponse, ApiTransport, AuthenticatedClient, ReqwestTransport};
