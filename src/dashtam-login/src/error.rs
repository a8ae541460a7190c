//! Error taxonomy for the authentication subsystem.
//!
//! Every fallible operation returns [`Outcome`]. The set of failure kinds is
//! closed: callers match on [`AuthError::kind`] and never need to inspect
//! message text.

use std::path::PathBuf;

/// Boxed cause attached to an error.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result of every fallible operation in this crate.
pub type Outcome<T> = std::result::Result<T, AuthError>;

/// Discriminant of [`AuthError`], for matching without payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ConfigNotFound,
    ConfigParseError,
    ConfigWriteError,
    InvalidCredentials,
    TokenExpired,
    RefreshFailed,
    CallbackTimeout,
    StateMismatch,
    NetworkError,
    UnexpectedStatus(u16),
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::ConfigNotFound => write!(f, "config_not_found"),
            ErrorKind::ConfigParseError => write!(f, "config_parse_error"),
            ErrorKind::ConfigWriteError => write!(f, "config_write_error"),
            ErrorKind::InvalidCredentials => write!(f, "invalid_credentials"),
            ErrorKind::TokenExpired => write!(f, "token_expired"),
            ErrorKind::RefreshFailed => write!(f, "refresh_failed"),
            ErrorKind::CallbackTimeout => write!(f, "callback_timeout"),
            ErrorKind::StateMismatch => write!(f, "state_mismatch"),
            ErrorKind::NetworkError => write!(f, "network_error"),
            ErrorKind::UnexpectedStatus(code) => write!(f, "unexpected_status({code})"),
        }
    }
}

/// Failure of an authentication, profile, or API operation.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("configuration not found: {message}")]
    ConfigNotFound { message: String },

    #[error("failed to parse {}: {message}", path.display())]
    ConfigParseError {
        path: PathBuf,
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("failed to write {}: {message}", path.display())]
    ConfigWriteError {
        path: PathBuf,
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("invalid credentials: {message}")]
    InvalidCredentials { message: String },

    #[error("session expired: {message}")]
    TokenExpired { message: String },

    #[error("token refresh failed: {message}")]
    RefreshFailed {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("login callback not received: {message}")]
    CallbackTimeout { message: String },

    #[error("OAuth state mismatch: {message}")]
    StateMismatch { message: String },

    #[error("network error: {message}")]
    NetworkError {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("unexpected HTTP status {code}: {body}")]
    UnexpectedStatus { code: u16, body: String },
}

impl AuthError {
    pub fn config_not_found(message: impl Into<String>) -> Self {
        Self::ConfigNotFound {
            message: message.into(),
        }
    }

    pub fn config_parse(
        path: impl Into<PathBuf>,
        message: impl Into<String>,
        source: Option<BoxError>,
    ) -> Self {
        Self::ConfigParseError {
            path: path.into(),
            message: message.into(),
            source,
        }
    }

    pub fn config_write(
        path: impl Into<PathBuf>,
        message: impl Into<String>,
        source: Option<BoxError>,
    ) -> Self {
        Self::ConfigWriteError {
            path: path.into(),
            message: message.into(),
            source,
        }
    }

    pub fn invalid_credentials(message: impl Into<String>) -> Self {
        Self::InvalidCredentials {
            message: message.into(),
        }
    }

    pub fn token_expired(message: impl Into<String>) -> Self {
        Self::TokenExpired {
            message: message.into(),
        }
    }

    pub fn refresh_failed(message: impl Into<String>, source: Option<BoxError>) -> Self {
        Self::RefreshFailed {
            message: message.into(),
            source,
        }
    }

    pub fn callback_timeout(message: impl Into<String>) -> Self {
        Self::CallbackTimeout {
            message: message.into(),
        }
    }

    pub fn state_mismatch(message: impl Into<String>) -> Self {
        Self::StateMismatch {
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>, source: Option<BoxError>) -> Self {
        Self::NetworkError {
            message: message.into(),
            source,
        }
    }

    pub fn unexpected_status(code: u16, body: impl Into<String>) -> Self {
        Self::UnexpectedStatus {
            code,
            body: body.into(),
        }
    }

    /// The kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthError::ConfigNotFound { .. } => ErrorKind::ConfigNotFound,
            AuthError::ConfigParseError { .. } => ErrorKind::ConfigParseError,
            AuthError::ConfigWriteError { .. } => ErrorKind::ConfigWriteError,
            AuthError::InvalidCredentials { .. } => ErrorKind::InvalidCredentials,
            AuthError::TokenExpired { .. } => ErrorKind::TokenExpired,
            AuthError::RefreshFailed { .. } => ErrorKind::RefreshFailed,
            AuthError::CallbackTimeout { .. } => ErrorKind::CallbackTimeout,
            AuthError::StateMismatch { .. } => ErrorKind::StateMismatch,
            AuthError::NetworkError { .. } => ErrorKind::NetworkError,
            AuthError::UnexpectedStatus { code, .. } => ErrorKind::UnexpectedStatus(*code),
        }
    }

    /// Whether the user has to run `login` again to recover.
    pub fn requires_login(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::InvalidCredentials | ErrorKind::TokenExpired | ErrorKind::RefreshFailed
        )
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        let message = if err.is_timeout() {
            "request timed out".to_string()
        } else if err.is_connect() {
            "could not connect to server".to_string()
        } else {
            err.to_string()
        };
        AuthError::network(message, Some(Box::new(err)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_kind_matches_variant() {
        assert_eq!(
            AuthError::config_not_found("profile 'dev'").kind(),
            ErrorKind::ConfigNotFound
        );
        assert_eq!(
            AuthError::unexpected_status(503, "down").kind(),
            ErrorKind::UnexpectedStatus(503)
        );
        assert_eq!(
            AuthError::state_mismatch("x").kind(),
            ErrorKind::StateMismatch
        );
    }

    #[test]
    fn test_display_includes_path_and_message() {
        let err = AuthError::config_parse("/tmp/dev.toml", "expected table", None);
        assert_eq!(
            err.to_string(),
            "failed to parse /tmp/dev.toml: expected table"
        );
    }

    #[test]
    fn test_cause_is_preserved() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = AuthError::config_write("/tmp/dev.toml", "rename failed", Some(Box::new(io)));
        let source = err.source().expect("source");
        assert_eq!(source.to_string(), "denied");
    }

    #[test]
    fn test_requires_login() {
        assert!(AuthError::token_expired("refresh token expired").requires_login());
        assert!(AuthError::refresh_failed("rejected", None).requires_login());
        assert!(!AuthError::network("offline", None).requires_login());
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(ErrorKind::RefreshFailed.to_string(), "refresh_failed");
        assert_eq!(
            ErrorKind::UnexpectedStatus(404).to_string(),
            "unexpected_status(404)"
        );
    }
}
