//! Login, logout, status and whoami handlers.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde_json::{Value, json};

use dashtam_login::constants::{REFRESH_SAFETY_MARGIN, WHOAMI_PATH};
use dashtam_login::{
    ApiRequest, AuthenticatedClient, BrowserPresenter, LoginFlow, LoginOptions, LoginOutcome,
    OutputStyle, Profile, ReqwestTransport, TokenPair, UrlPresenter,
};

use crate::cli::{CommandContext, LoginArgs};
use crate::report::{Report, relative_time};
use crate::styled_output::{MessageType, print_dim, print_info, print_success, print_warning};

/// Run the browser login for the active profile.
pub async fn run_login(ctx: &CommandContext, args: LoginArgs) -> Result<()> {
    let profile = ctx.config.active_profile();
    let manager = ctx.credential_manager()?;
    let presenter: Arc<dyn UrlPresenter> = Arc::new(if args.no_browser {
        BrowserPresenter::new(false)
    } else {
        BrowserPresenter::detect()
    });
    let options = LoginOptions {
        force: args.force,
        timeout: Duration::from_secs(args.timeout),
    };

    let outcome = LoginFlow::new(manager, presenter)
        .run(profile, &options)
        .await?;

    let now = Utc::now();
    match outcome {
        LoginOutcome::LoggedIn {
            refresh_expires_at, ..
        } => {
            print_success(&format!("Logged in to profile '{profile}'."));
            print_dim(&format!(
                "Session valid until {} ({}).",
                refresh_expires_at.to_rfc3339(),
                relative_time(refresh_expires_at, now)
            ));
        }
        LoginOutcome::AlreadyLoggedIn { refresh_expires_at } => {
            print_info(&format!(
                "Already logged in to profile '{profile}' (session expires {}).",
                relative_time(refresh_expires_at, now)
            ));
            print_dim("Use `dashtam login --force` to log in again.");
        }
    }
    Ok(())
}

/// Forget the stored credentials of the active profile.
pub async fn run_logout(ctx: &CommandContext) -> Result<()> {
    let profile = ctx.config.active_profile();
    let manager = ctx.credential_manager()?;
    if manager.clear(profile).await? {
        print_success(&format!("Logged out of profile '{profile}'."));
    } else {
        print_info(&format!("Profile '{profile}' was not logged in."));
    }
    Ok(())
}

/// Login state of a stored pair, judged locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SessionState {
    LoggedOut,
    Active,
    RefreshDue,
    Expired,
}

impl SessionState {
    pub(crate) fn of(tokens: Option<&TokenPair>, now: DateTime<Utc>) -> Self {
        match tokens {
            None => SessionState::LoggedOut,
            Some(pair) if pair.refresh_expired(now) => SessionState::Expired,
            Some(pair) if pair.needs_refresh(now, REFRESH_SAFETY_MARGIN) => {
                SessionState::RefreshDue
            }
            Some(_) => SessionState::Active,
        }
    }

    pub(crate) fn code(self) -> &'static str {
        match self {
            SessionState::LoggedOut => "logged_out",
            SessionState::Active => "active",
            SessionState::RefreshDue => "refresh_due",
            SessionState::Expired => "expired",
        }
    }

    fn describe(self) -> &'static str {
        match self {
            SessionState::LoggedOut => "not logged in",
            SessionState::Active => "logged in",
            SessionState::RefreshDue => "logged in (access token refreshes on next request)",
            SessionState::Expired => "session expired",
        }
    }

    fn message_type(self) -> MessageType {
        match self {
            SessionState::LoggedOut | SessionState::RefreshDue => MessageType::Warning,
            SessionState::Active => MessageType::Success,
            SessionState::Expired => MessageType::Error,
        }
    }
}

/// Build the status report without touching the network.
pub(crate) fn status_report(
    profile: &Profile,
    source: &str,
    now: DateTime<Utc>,
) -> (Report, SessionState) {
    let tokens = profile.tokens();
    let state = SessionState::of(tokens, now);

    let json = json!({
        "profile": profile.name(),
        "source": source,
        "base_url": profile.base_url(),
        "state": state.code(),
        "logged_in": matches!(state, SessionState::Active | SessionState::RefreshDue),
        "access_token_expires_at": tokens.map(|t| t.access_expires_at().to_rfc3339()),
        "refresh_token_expires_at": tokens.map(|t| t.refresh_expires_at().to_rfc3339()),
    });

    let mut report = Report::new(format!("Profile {}", profile.name()), json)
        .field("profile", format!("{} ({source})", profile.name()))
        .field("base_url", profile.base_url())
        .highlighted("state", state.describe(), state.message_type());
    if let Some(pair) = tokens {
        report = report
            .field("access_expires", expiry(pair.access_expires_at(), now))
            .field("session_expires", expiry(pair.refresh_expires_at(), now));
    }
    (report, state)
}

fn expiry(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    format!("{} ({})", at.to_rfc3339(), relative_time(at, now))
}

/// Show the local login state of the active profile.
pub fn run_status(ctx: &CommandContext) -> Result<()> {
    let profile = ctx.config.load_active_profile()?;
    let source = ctx.config.profile_source().to_string();
    let (report, state) = status_report(&profile, &source, Utc::now());
    report.print(ctx.style);

    if ctx.style != OutputStyle::Json {
        match state {
            SessionState::LoggedOut => print_dim("Run `dashtam login` to log in."),
            SessionState::Expired => print_warning("Run `dashtam login` to start a new session."),
            SessionState::Active | SessionState::RefreshDue => {}
        }
    }
    Ok(())
}

/// Ask the API who the active profile is logged in as.
pub async fn run_whoami(ctx: &CommandContext) -> Result<()> {
    let profile = ctx.config.active_profile();
    let manager = ctx.credential_manager()?;
    let transport = Arc::new(ReqwestTransport::new()?);
    let client = AuthenticatedClient::new(manager, transport);

    let response = client.send(&ApiRequest::get(WHOAMI_PATH), profile).await?;
    let user: Value = response.json()?;
    user_report(profile, user).print(ctx.style);
    Ok(())
}

/// Scalar fields of the user object; nested values stay in the JSON form.
pub(crate) fn user_report(profile: &str, user: Value) -> Report {
    let fields: Vec<(String, String)> = user
        .as_object()
        .map(|object| {
            object
                .iter()
                .filter_map(|(key, value)| scalar(value).map(|v| (key.clone(), v)))
                .collect()
        })
        .unwrap_or_default();

    let mut report = Report::new(format!("Logged in to '{profile}' as"), user);
    for (key, value) in fields {
        report = report.field(key, value);
    }
    report
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}
