//! Dashtam CLI entry point.

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use dashtam_cli::cli::{Cli, ColorMode, CommandContext, LogLevel, dispatch_command};
use dashtam_cli::styled_output::{print_dim, print_error};
use dashtam_cli::{error_hint, exit_code_for_error};

const LOG_LEVEL_ENV_VAR: &str = "DASHTAM_LOG_LEVEL";

fn init_logging(cli: &Cli) {
    let explicit = if let Some(level) = cli.log_level {
        Some(level)
    } else if cli.verbose {
        Some(LogLevel::Debug)
    } else {
        std::env::var(LOG_LEVEL_ENV_VAR)
            .ok()
            .and_then(|v| LogLevel::from_str_loose(&v))
    };

    let filter = match explicit {
        Some(level) => crate_filter(level),
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| crate_filter(LogLevel::default())),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn crate_filter(level: LogLevel) -> EnvFilter {
    let l = level.as_filter_str();
    EnvFilter::new(format!(
        "warn,dashtam_cli={l},dashtam_login={l},dashtam_common={l}"
    ))
}

fn report_failure(err: &anyhow::Error) -> ExitCode {
    print_error(&format!("{err:#}"));
    if let Some(hint) = error_hint(err) {
        print_dim(hint);
    }
    ExitCode::from(exit_code_for_error(err))
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli);

    let ctx = match CommandContext::from_cli(&cli) {
        Ok(ctx) => ctx,
        Err(e) => return report_failure(&e),
    };

    // SAFETY: Environment variable mutations happen before the runtime spawns threads
    if !ctx.color {
        unsafe { std::env::set_var("NO_COLOR", "1") };
    } else if cli.color == ColorMode::Always {
        unsafe { std::env::remove_var("NO_COLOR") };
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => return report_failure(&anyhow::Error::new(e).context("failed to start runtime")),
    };

    match runtime.block_on(dispatch_command(cli.command, ctx)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => report_failure(&e),
    }
}
