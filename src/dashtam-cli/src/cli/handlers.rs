//! Command context setup and dispatch.

use anyhow::{Context, Result};
use std::sync::Arc;

use dashtam_common::AppDirs;
use dashtam_login::{ConfigContext, CredentialManager, HttpTokenEndpoint, OutputStyle};

use super::args::{Cli, ColorMode, Commands};
use crate::{login_cmd, profile_cmd};

/// Everything a command needs, resolved once at startup.
#[derive(Debug)]
pub struct CommandContext {
    pub config: ConfigContext,
    pub style: OutputStyle,
    pub color: bool,
}

impl CommandContext {
    /// Resolve the configuration root, active profile and display settings.
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let dirs = AppDirs::new().context(
            "could not determine a configuration directory; set DASHTAM_HOME to choose one",
        )?;
        let config = ConfigContext::load(dirs, cli.profile.as_deref())?;
        Ok(Self::with_config(config, cli))
    }

    pub fn with_config(config: ConfigContext, cli: &Cli) -> Self {
        // Display overrides come from the active profile when it is readable.
        let profile = config.load_active_profile().ok();
        let style = cli
            .output
            .map(OutputStyle::from)
            .unwrap_or_else(|| config.output_style(profile.as_ref()));
        let color = match cli.color {
            ColorMode::Always => true,
            ColorMode::Never => false,
            ColorMode::Auto => config.color_enabled(profile.as_ref()),
        };
        Self {
            config,
            style,
            color,
        }
    }

    /// Credential manager over the configured profile store.
    pub fn credential_manager(&self) -> Result<Arc<CredentialManager>> {
        let endpoint = HttpTokenEndpoint::new()?;
        Ok(Arc::new(CredentialManager::new(
            self.config.store(),
            Arc::new(endpoint),
        )))
    }
}

/// Run the parsed command.
pub async fn dispatch_command(command: Commands, mut ctx: CommandContext) -> Result<()> {
    tracing::debug!(
        profile = %ctx.config.active_profile(),
        source = %ctx.config.profile_source(),
        style = %ctx.style,
        "Dispatching command"
    );

    match command {
        Commands::Login(args) => login_cmd::run_login(&ctx, args).await,
        Commands::Logout => login_cmd::run_logout(&ctx).await,
        Commands::Status => login_cmd::run_status(&ctx),
        Commands::Whoami => login_cmd::run_whoami(&ctx).await,
        Commands::Profile(profile) => profile_cmd::run(&mut ctx, profile.action),
    }
}
