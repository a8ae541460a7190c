//! Dashtam CLI library module.
//!
//! - `cli/` - CLI argument parsing and command dispatch
//! - `login_cmd` - Login, logout, status and whoami
//! - `profile_cmd` - Profile management
//! - `report` - Command output in rich, plain or JSON form
//! - `styled_output` - Themed terminal messages

pub mod cli;
pub mod login_cmd;
pub mod profile_cmd;
pub mod report;
pub mod styled_output;

use dashtam_login::{AuthError, ErrorKind};

/// Process exit code for a failed command.
pub fn exit_code_for(kind: Option<ErrorKind>) -> u8 {
    match kind {
        Some(
            ErrorKind::ConfigNotFound | ErrorKind::ConfigParseError | ErrorKind::ConfigWriteError,
        ) => 2,
        Some(
            ErrorKind::InvalidCredentials | ErrorKind::TokenExpired | ErrorKind::RefreshFailed,
        ) => 3,
        Some(ErrorKind::CallbackTimeout | ErrorKind::StateMismatch) => 4,
        Some(ErrorKind::NetworkError | ErrorKind::UnexpectedStatus(_)) => 5,
        None => 1,
    }
}

/// Follow-up suggestion printed after an error, if one applies.
pub fn error_hint(err: &anyhow::Error) -> Option<&'static str> {
    let auth = err.downcast_ref::<AuthError>()?;
    if auth.requires_login() {
        return Some("Run `dashtam login` to start a new session.");
    }
    match auth.kind() {
        ErrorKind::ConfigNotFound => {
            Some("Add a profile with `dashtam profile add <name> --base-url <url>`.")
        }
        ErrorKind::CallbackTimeout => {
            Some("Run `dashtam login --no-browser` and open the printed URL manually.")
        }
        ErrorKind::StateMismatch => Some("Start the login again from this terminal."),
        _ => None,
    }
}

/// Exit code for an error returned from command dispatch.
pub fn exit_code_for_error(err: &anyhow::Error) -> u8 {
    exit_code_for(err.downcast_ref::<AuthError>().map(AuthError::kind))
}
