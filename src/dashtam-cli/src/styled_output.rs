//! Styled terminal messages.
//!
//! Status messages go to stderr so stdout stays clean for command output.
//! Colors are used only on a terminal and never when `NO_COLOR` is set.

use std::io::IsTerminal;

/// Check if colors should be disabled based on NO_COLOR env var.
fn colors_disabled() -> bool {
    std::env::var("NO_COLOR")
        .map(|v| !v.is_empty() && v != "0" && v.to_lowercase() != "false")
        .unwrap_or(false)
}

fn use_colors(stderr: bool) -> bool {
    if colors_disabled() {
        return false;
    }
    if stderr {
        std::io::stderr().is_terminal()
    } else {
        std::io::stdout().is_terminal()
    }
}

struct Theme {
    success: &'static str,
    error: &'static str,
    warning: &'static str,
    info: &'static str,
    dim: &'static str,
}

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";

const DARK: Theme = Theme {
    success: "\x1b[38;2;0;245;212m",
    error: "\x1b[38;2;255;107;107m",
    warning: "\x1b[38;2;255;200;87m",
    info: "\x1b[38;2;72;202;228m",
    dim: "\x1b[38;2;130;154;177m",
};

const LIGHT: Theme = Theme {
    success: "\x1b[38;2;0;150;125m",
    error: "\x1b[38;2;217;61;61m",
    warning: "\x1b[38;2;201;154;46m",
    info: "\x1b[38;2;0;100;160m",
    dim: "\x1b[38;2;100;100;100m",
};

/// Light background if COLORFGBG says so; dark otherwise.
fn theme() -> &'static Theme {
    let light = std::env::var("COLORFGBG")
        .ok()
        .and_then(|v| v.rsplit(';').next().and_then(|bg| bg.parse::<u8>().ok()))
        .is_some_and(|bg| bg >= 7);
    if light { &LIGHT } else { &DARK }
}

/// Message type for styled output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Success,
    Error,
    Warning,
    Info,
    Dim,
}

impl MessageType {
    fn icon(&self) -> &'static str {
        match self {
            MessageType::Success => "[OK]",
            MessageType::Error => "[ERROR]",
            MessageType::Warning => "[WARN]",
            MessageType::Info => "[INFO]",
            MessageType::Dim => "-",
        }
    }

    fn color(&self) -> &'static str {
        let theme = theme();
        match self {
            MessageType::Success => theme.success,
            MessageType::Error => theme.error,
            MessageType::Warning => theme.warning,
            MessageType::Info => theme.info,
            MessageType::Dim => theme.dim,
        }
    }
}

fn format_message(msg_type: MessageType, message: &str, colors: bool) -> String {
    if colors {
        format!("{}{} {}{RESET}", msg_type.color(), msg_type.icon(), message)
    } else {
        format!("{} {}", msg_type.icon(), message)
    }
}

fn print_styled(msg_type: MessageType, message: &str) {
    eprintln!("{}", format_message(msg_type, message, use_colors(true)));
}

pub fn print_success(message: &str) {
    print_styled(MessageType::Success, message);
}

pub fn print_error(message: &str) {
    print_styled(MessageType::Error, message);
}

pub fn print_warning(message: &str) {
    print_styled(MessageType::Warning, message);
}

pub fn print_info(message: &str) {
    print_styled(MessageType::Info, message);
}

/// Print a dimmed note, e.g. a hint following an error.
pub fn print_dim(message: &str) {
    print_styled(MessageType::Dim, message);
}

/// Colored label for inline use on stdout.
pub fn styled_label(msg_type: MessageType, label: &str) -> String {
    if use_colors(false) {
        format!("{}{label}{RESET}", msg_type.color())
    } else {
        label.to_string()
    }
}

/// Bold text for inline use on stdout.
pub fn bold(text: &str) -> String {
    if use_colors(false) {
        format!("{BOLD}{text}{RESET}")
    } else {
        text.to_string()
    }
}
