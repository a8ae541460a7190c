//! Constants for the dashtam-login module.

use std::time::Duration;

/// Default OAuth client ID.
pub const CLIENT_ID: &str = "dashtam-cli";

/// Environment variable selecting the active profile.
pub const PROFILE_ENV_VAR: &str = "DASHTAM_PROFILE";

/// Profile used when neither flag, environment, nor global file name one.
pub const FALLBACK_PROFILE: &str = "default";

/// Access tokens closer than this to expiry are refreshed before use.
pub const REFRESH_SAFETY_MARGIN: Duration = Duration::from_secs(60);

/// Default time to wait for the browser redirect.
pub const DEFAULT_CALLBACK_TIMEOUT: Duration = Duration::from_secs(180);

/// Upper bound on waiting for the callback listener to release its port.
pub const LISTENER_SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Network timeout for token exchange and refresh.
pub const REFRESH_TIMEOUT: Duration = Duration::from_secs(10);

/// Path of the OAuth redirect on the local listener.
pub const CALLBACK_PATH: &str = "/callback";

/// Authorization endpoint, relative to the profile's base URL.
pub const AUTHORIZE_PATH: &str = "/oauth/authorize";

/// Authorization-code exchange endpoint, relative to the base URL.
pub const TOKEN_PATH: &str = "/oauth/token";

/// Refresh endpoint, relative to the base URL.
pub const REFRESH_PATH: &str = "/api/v1/auth/refresh";

/// Current-user endpoint, relative to the base URL.
pub const WHOAMI_PATH: &str = "/api/v1/users/me";

/// Refresh-token lifetime assumed when the server does not report one.
pub const DEFAULT_REFRESH_TOKEN_LIFETIME: Duration = Duration::from_secs(30 * 24 * 60 * 60);
