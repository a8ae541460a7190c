//! CLI argument parsing and command dispatch.
//!
//! - `args` - Command-line argument structures
//! - `styles` - ANSI styling for help output
//! - `handlers` - Command context and dispatch

pub mod args;
pub mod handlers;
pub mod styles;

pub use args::{
    Cli, ColorMode, Commands, LogLevel, LoginArgs, OutputFormat, ProfileAddArgs, ProfileCli,
    ProfileCommand,
};
pub use handlers::{CommandContext, dispatch_command};
pub use styles::{AFTER_HELP, get_styles};
