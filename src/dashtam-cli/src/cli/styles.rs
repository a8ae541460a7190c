//! CLI styling for the help output.

use clap::builder::styling::{AnsiColor, Effects, Styles};

/// Help theme: cyan headers, green literals.
pub fn get_styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Yellow.on_default())
        .error(AnsiColor::Red.on_default() | Effects::BOLD)
        .valid(AnsiColor::Cyan.on_default())
        .invalid(AnsiColor::Yellow.on_default())
}

/// After-help section with quick start and environment variables.
pub const AFTER_HELP: &str = color_print::cstr!(
    r#"<cyan,bold>QUICK START</>
    <green,bold>dashtam profile add</> <dim>dev --base-url https://dev.dashtam.dev</>
    <green,bold>dashtam login</>                  Log in through the browser
    <green,bold>dashtam whoami</>                 Show the authenticated user
    <green,bold>dashtam --profile prod status</>  Inspect another environment

<cyan,bold>ENVIRONMENT VARIABLES</>
    <yellow>DASHTAM_HOME</>         Override the configuration directory
    <yellow>DASHTAM_PROFILE</>      Active profile (overridden by --profile)
    <yellow>DASHTAM_LOG_LEVEL</>    Log verbosity (error, warn, info, debug, trace)
    <yellow>NO_COLOR</>             Disable colored output (set to '1' or 'true')"#
);
