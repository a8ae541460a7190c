//! CLI argument structures and parsing.

use clap::{Args, Parser, Subcommand};

use dashtam_login::OutputStyle;

use super::styles::{AFTER_HELP, get_styles};

/// Build-time version string with commit hash.
pub fn get_long_version() -> &'static str {
    const VERSION: &str = env!("CARGO_PKG_VERSION");
    const GIT_HASH: &str = match option_env!("DASHTAM_GIT_HASH") {
        Some(v) => v,
        None => "unknown",
    };
    const BUILD_DATE: &str = match option_env!("DASHTAM_BUILD_DATE") {
        Some(v) => v,
        None => "unknown",
    };

    static LONG_VERSION: std::sync::OnceLock<String> = std::sync::OnceLock::new();
    LONG_VERSION.get_or_init(|| format!("{VERSION} ({GIT_HASH} {BUILD_DATE})"))
}

/// Log verbosity level for CLI output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogLevel {
    /// Only show errors
    Error,
    /// Show warnings and errors (default)
    #[default]
    Warn,
    /// Show informational messages, warnings, and errors
    Info,
    /// Show debug messages and above
    Debug,
    /// Show all messages including trace-level details
    Trace,
}

impl LogLevel {
    /// Convert to tracing filter string.
    pub fn as_filter_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }

    /// Parse from string (case-insensitive).
    pub fn from_str_loose(s: &str) -> Option<LogLevel> {
        match s.trim().to_lowercase().as_str() {
            "error" => Some(LogLevel::Error),
            "warn" | "warning" => Some(LogLevel::Warn),
            "info" => Some(LogLevel::Info),
            "debug" => Some(LogLevel::Debug),
            "trace" => Some(LogLevel::Trace),
            _ => None,
        }
    }
}

/// Color output mode for CLI.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum ColorMode {
    /// Follow the configuration and terminal detection
    #[default]
    Auto,
    /// Always output with colors
    Always,
    /// Never output with colors
    Never,
}

/// Output format override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Rich,
    Plain,
    Json,
}

impl From<OutputFormat> for OutputStyle {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Rich => OutputStyle::Rich,
            OutputFormat::Plain => OutputStyle::Plain,
            OutputFormat::Json => OutputStyle::Json,
        }
    }
}

/// Dashtam CLI - command-line access to the Dashtam API
#[derive(Debug, Parser)]
#[command(name = "dashtam")]
#[command(author, version, long_version = get_long_version())]
#[command(about = "Dashtam - command-line access to the Dashtam API", long_about = None)]
#[command(styles = get_styles(), after_help = AFTER_HELP)]
pub struct Cli {
    /// Profile to use (overrides DASHTAM_PROFILE and the default profile)
    #[arg(long = "profile", short = 'p', global = true, value_name = "NAME")]
    pub profile: Option<String>,

    /// Enable verbose output (same as --log-level debug)
    #[arg(long = "verbose", short = 'v', global = true)]
    pub verbose: bool,

    /// Log verbosity
    #[arg(long = "log-level", global = true, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Control color output: auto (default), always, or never
    #[arg(long = "color", global = true, value_enum, default_value_t = ColorMode::Auto)]
    pub color: ColorMode,

    /// Output format (overrides the configured output style)
    #[arg(long = "output", short = 'o', global = true, value_enum, value_name = "FORMAT")]
    pub output: Option<OutputFormat>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Log in to the active profile through the browser
    Login(LoginArgs),

    /// Remove the stored credentials of the active profile
    Logout,

    /// Show the login state of the active profile (offline)
    Status,

    /// Show the user the active profile is logged in as
    Whoami,

    /// Manage API environment profiles
    Profile(ProfileCli),
}

#[derive(Debug, Args)]
pub struct LoginArgs {
    /// Log in again even if the stored session is still valid
    #[arg(long)]
    pub force: bool,

    /// Seconds to wait for the browser to complete the login
    #[arg(
        long,
        value_name = "SECS",
        default_value_t = 180,
        value_parser = clap::value_parser!(u64).range(1..=3600)
    )]
    pub timeout: u64,

    /// Print the login URL without opening a browser
    #[arg(long = "no-browser")]
    pub no_browser: bool,
}

#[derive(Debug, Args)]
pub struct ProfileCli {
    #[command(subcommand)]
    pub action: ProfileCommand,
}

#[derive(Debug, Subcommand)]
pub enum ProfileCommand {
    /// Add a profile for an API environment
    Add(ProfileAddArgs),

    /// Remove a profile and its credentials
    #[command(visible_alias = "rm")]
    Remove {
        /// Profile name
        name: String,
    },

    /// List profiles
    #[command(visible_alias = "ls")]
    List,

    /// Make a profile the default
    Use {
        /// Profile name
        name: String,
    },

    /// Show a profile (the active one if no name is given)
    Show {
        /// Profile name
        name: Option<String>,
    },
}

#[derive(Debug, Args)]
pub struct ProfileAddArgs {
    /// Profile name (letters, digits, '-', '_' and '.')
    pub name: String,

    /// Base URL of the API, e.g. https://api.dashtam.dev
    #[arg(long = "base-url", value_name = "URL")]
    pub base_url: String,

    /// OAuth client id, if not the CLI default
    #[arg(long = "client-id", value_name = "ID")]
    pub client_id: Option<String>,

    /// Make this the default profile
    #[arg(long)]
    pub default: bool,
}
