//! Profile management handlers.

use anyhow::{Context, Result, bail};
use chrono::Utc;
use serde::Serialize;

use dashtam_login::constants::CLIENT_ID;
use dashtam_login::{OutputStyle, Profile, validate_base_url, validate_profile_name};

use crate::cli::{CommandContext, ProfileAddArgs, ProfileCommand};
use crate::login_cmd::SessionState;
use crate::report::{Report, relative_time};
use crate::styled_output::{
    MessageType, bold, print_dim, print_info, print_success, styled_label,
};

pub fn run(ctx: &mut CommandContext, action: ProfileCommand) -> Result<()> {
    match action {
        ProfileCommand::Add(args) => run_add(ctx, args),
        ProfileCommand::Remove { name } => run_remove(ctx, &name),
        ProfileCommand::List => run_list(ctx),
        ProfileCommand::Use { name } => run_use(ctx, &name),
        ProfileCommand::Show { name } => run_show(ctx, name.as_deref()),
    }
}

fn run_add(ctx: &mut CommandContext, args: ProfileAddArgs) -> Result<()> {
    if let Err(reason) = validate_profile_name(&args.name) {
        bail!("invalid profile name '{}': {reason}", args.name);
    }
    if let Err(reason) = validate_base_url(&args.base_url) {
        bail!("invalid base URL '{}': {reason}", args.base_url);
    }

    let mut profile = Profile::new(&args.name, &args.base_url);
    profile.client_id = args.client_id.filter(|id| !id.trim().is_empty());
    ctx.config.add_profile(&profile, args.default)?;

    print_success(&format!(
        "Added profile '{}' for {}.",
        profile.name(),
        profile.base_url()
    ));
    if ctx.config.global().default_profile.as_deref() == Some(profile.name()) {
        print_dim(&format!("'{}' is now the default profile.", profile.name()));
    }
    print_dim(&format!(
        "Run `dashtam login --profile {}` to log in.",
        profile.name()
    ));
    Ok(())
}

fn run_remove(ctx: &mut CommandContext, name: &str) -> Result<()> {
    let was_default = ctx.config.global().default_profile.as_deref() == Some(name);
    ctx.config
        .remove_profile(name)
        .with_context(|| format!("failed to remove profile '{name}'"))?;

    print_success(&format!("Removed profile '{name}' and its credentials."));
    if was_default {
        match &ctx.config.global().default_profile {
            Some(next) => print_info(&format!("Default profile is now '{next}'.")),
            None => print_info("No profiles left; there is no default profile."),
        }
    }
    Ok(())
}

fn run_use(ctx: &mut CommandContext, name: &str) -> Result<()> {
    ctx.config.set_default_profile(name)?;
    print_success(&format!("Default profile set to '{name}'."));
    Ok(())
}

/// One row of `profile list`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub(crate) struct ProfileEntry {
    pub name: String,
    pub base_url: Option<String>,
    pub default: bool,
    pub active: bool,
    pub state: &'static str,
}

pub(crate) fn list_entries(ctx: &CommandContext) -> Result<Vec<ProfileEntry>> {
    let store = ctx.config.store();
    let default = ctx.config.global().default_profile.as_deref();
    let active = ctx.config.active_profile();
    let now = Utc::now();

    let mut entries = Vec::new();
    for name in store.list()? {
        // An unreadable profile is listed rather than failing the whole listing.
        let (base_url, state) = match store.load(&name) {
            Ok(profile) => (
                Some(profile.base_url().to_string()),
                SessionState::of(profile.tokens(), now).code(),
            ),
            Err(e) => {
                tracing::warn!(profile = %name, error = %e, "Skipping unreadable profile");
                (None, "unreadable")
            }
        };
        entries.push(ProfileEntry {
            default: default == Some(name.as_str()),
            active: active == name,
            name,
            base_url,
            state,
        });
    }
    Ok(entries)
}

fn run_list(ctx: &CommandContext) -> Result<()> {
    let entries = list_entries(ctx)?;

    match ctx.style {
        OutputStyle::Json => {
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
        OutputStyle::Plain => {
            for entry in &entries {
                let mut flags = Vec::new();
                if entry.default {
                    flags.push("default");
                }
                if entry.active {
                    flags.push("active");
                }
                println!(
                    "{}\t{}\t{}\t{}",
                    entry.name,
                    entry.base_url.as_deref().unwrap_or("-"),
                    entry.state,
                    flags.join(",")
                );
            }
        }
        OutputStyle::Rich => {
            if entries.is_empty() {
                print_info("No profiles yet.");
                print_dim("Add one with `dashtam profile add <name> --base-url <url>`.");
                return Ok(());
            }
            let width = entries.iter().map(|e| e.name.len()).max().unwrap_or(0);
            for entry in &entries {
                let marker = if entry.active { "*" } else { " " };
                let name = format!("{:<width$}", entry.name);
                let name = if entry.active { bold(&name) } else { name };
                let state = match entry.state {
                    "active" | "refresh_due" => styled_label(MessageType::Success, "logged in"),
                    "expired" => styled_label(MessageType::Warning, "expired"),
                    "unreadable" => styled_label(MessageType::Error, "unreadable"),
                    _ => styled_label(MessageType::Dim, "logged out"),
                };
                let default = if entry.default {
                    styled_label(MessageType::Dim, " (default)")
                } else {
                    String::new()
                };
                println!(
                    "{marker} {name}  {}  {state}{default}",
                    entry.base_url.as_deref().unwrap_or("-")
                );
            }
        }
    }
    Ok(())
}

pub(crate) fn show_report(ctx: &CommandContext, profile: &Profile) -> Report {
    let now = Utc::now();
    let tokens = profile.tokens();
    let state = SessionState::of(tokens, now);
    let client_id = profile.client_id.as_deref().unwrap_or(CLIENT_ID);
    let is_default = ctx.config.global().default_profile.as_deref() == Some(profile.name());
    let path = ctx
        .config
        .dirs()
        .profiles_dir()
        .join(format!("{}.toml", profile.name()));

    let json = serde_json::json!({
        "name": profile.name(),
        "base_url": profile.base_url(),
        "client_id": client_id,
        "default": is_default,
        "state": state.code(),
        "output_style": profile.display.output_style.map(|s| s.to_string()),
        "color": profile.display.color,
        "path": path.display().to_string(),
    });

    let mut report = Report::new(format!("Profile {}", profile.name()), json)
        .field("name", profile.name())
        .field("base_url", profile.base_url())
        .field("client_id", client_id)
        .field("default", if is_default { "yes" } else { "no" })
        .field("state", state.code());
    if let Some(pair) = tokens {
        report = report.field(
            "session_expires",
            relative_time(pair.refresh_expires_at(), now),
        );
    }
    if let Some(style) = profile.display.output_style {
        report = report.field("output_style", style.to_string());
    }
    if let Some(color) = profile.display.color {
        report = report.field("color", color.to_string());
    }
    report.field("path", path.display().to_string())
}

fn run_show(ctx: &CommandContext, name: Option<&str>) -> Result<()> {
    let name = name.unwrap_or_else(|| ctx.config.active_profile());
    let profile = ctx.config.store().load(name)?;
    show_report(ctx, &profile).print(ctx.style);
    Ok(())
}
