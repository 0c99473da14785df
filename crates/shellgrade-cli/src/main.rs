//! Shellgrade CLI: score an interactive shell over a pseudo-terminal.
//!
//! Runs the plaid shell conversation against one executable, streams failure
//! lines, and prints the score summary.

// CLI-specific lint allowances (CLI binary, not library)
#![allow(missing_docs)]
#![allow(clippy::print_stdout)] // CLI must print to stdout
#![allow(clippy::print_stderr)] // CLI must print to stderr
#![allow(clippy::exit)] // CLI uses exit codes

use clap::{Parser, ValueEnum};
use miette::{IntoDiagnostic, Result};
use shellgrade::report::render_summary;
use shellgrade::run::grade;
use shellgrade::runner::HarnessError;
use shellgrade::{HarnessConfig, RunReport};
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod progress;

use progress::ConsoleProgress;

/// Exit status when the run completed but was not clean.
const EXIT_TEST_FAILURES: i32 = 1;

/// Color output mode
#[derive(Copy, Clone, Debug, Default, ValueEnum)]
enum ColorMode {
    /// Auto-detect based on terminal and `NO_COLOR` env
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

#[derive(Debug, Parser)]
#[command(
    name = "shellgrade",
    version,
    about = "Score an interactive shell against a scripted conversation"
)]
struct Cli {
    /// Shell executable to grade
    executable: String,
    #[arg(long, default_value_t = 1000, help = "Timeout for every expectation")]
    timeout_ms: u64,
    #[arg(long, help = "Session log path (default: <executable>_test.log)")]
    log: Option<PathBuf>,
    #[arg(long, help = "Emit the run report as JSON instead of text")]
    json: bool,
    #[arg(long, short = 'v', help = "Show case-by-case progress and debug logs on stderr")]
    verbose: bool,
    #[arg(long, value_enum, default_value = "auto")]
    color: ColorMode,
}

/// Configure color output based on CLI flag and environment
fn configure_colors(mode: ColorMode) {
    let use_color = match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => {
            if std::env::var("NO_COLOR").is_ok() {
                false
            } else {
                // Diagnostics go to stderr
                supports_color::on(supports_color::Stream::Stderr).is_some()
            }
        }
    };

    miette::set_hook(Box::new(move |_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .color(use_color)
                .unicode(use_color)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set
}

/// Logs go to stderr; stdout carries only the report.
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "error" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    configure_colors(cli.color);
    init_tracing(cli.verbose);

    let config = HarnessConfig {
        timeout_ms: cli.timeout_ms,
        log_path: cli.log.clone(),
        ..HarnessConfig::default()
    };
    debug!(
        executable = %cli.executable,
        timeout_ms = config.timeout_ms,
        log = ?config.log_path,
        "grading"
    );
    let progress = ConsoleProgress::new(!cli.json, cli.verbose);

    match grade(&cli.executable, &config, &progress) {
        Ok(report) => emit_report(cli.json, &report),
        Err(err) => emit_error(cli.json, err),
    }
}

fn emit_report(json: bool, report: &RunReport) -> Result<()> {
    if json {
        let payload = serde_json::to_string_pretty(report).into_diagnostic()?;
        println!("{payload}");
    } else {
        print!("{}", render_summary(&report.score));
    }
    if !report.score.clean_run {
        std::process::exit(EXIT_TEST_FAILURES);
    }
    Ok(())
}

fn emit_error(json: bool, err: HarnessError) -> Result<()> {
    let exit_code = err.code.exit_code();
    if json {
        let payload = serde_json::to_string_pretty(&err.to_error_info()).into_diagnostic()?;
        println!("{payload}");
    } else {
        if err.message.contains("open pty") {
            eprintln!(
                "warning: PTY support appears unavailable; this is common in minimal containers"
            );
        }
        eprintln!("{:?}", miette::Report::new(err));
    }
    std::process::exit(exit_code);
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn executable_is_required() {
        assert!(Cli::try_parse_from(["shellgrade"]).is_err());
    }

    #[test]
    fn second_positional_is_rejected() {
        assert!(Cli::try_parse_from(["shellgrade", "./a", "./b"]).is_err());
    }

    #[test]
    fn flags_parse_with_defaults() {
        let cli = Cli::try_parse_from(["shellgrade", "./plaidsh"]).unwrap();
        assert_eq!(cli.executable, "./plaidsh");
        assert_eq!(cli.timeout_ms, 1000);
        assert!(cli.log.is_none());
        assert!(!cli.json);

        let cli = Cli::try_parse_from([
            "shellgrade",
            "--timeout-ms",
            "250",
            "--log",
            "/tmp/x.log",
            "--json",
            "./plaidsh",
        ])
        .unwrap();
        assert_eq!(cli.timeout_ms, 250);
        assert_eq!(cli.log, Some(PathBuf::from("/tmp/x.log")));
        assert!(cli.json);
    }
}
