//! Fixture shell: a minimal line-oriented shell honouring the grading contract.
//! Prints a `#? ` prompt, runs a few built-ins, and can be told to misbehave
//! through flags or the matching `FAKE_SHELL_*` environment variables.

// Test fixtures require special allowances - they are not production code
#![allow(clippy::print_stdout)] // The shell's output is the fixture's purpose
#![allow(clippy::print_stderr)]
#![allow(clippy::exit)] // `exit` must set the process status

use clap::Parser;
use std::io::{self, BufRead, Write};

#[derive(Parser, Debug)]
#[command(name = "shellgrade-fake-shell")]
struct Args {
    /// Print a stray line after every command.
    #[arg(long, env = "FAKE_SHELL_EXTRA_OUTPUT")]
    extra_output: bool,
    /// Never print a prompt.
    #[arg(long, env = "FAKE_SHELL_SILENT")]
    silent: bool,
    /// Status to exit with on `exit`.
    #[arg(long, env = "FAKE_SHELL_EXIT_CODE", default_value_t = 0)]
    exit_code: i32,
    /// Report a memory leak on `exit`.
    #[arg(long, env = "FAKE_SHELL_LEAK")]
    leak: bool,
    /// Ignore `exit`.
    #[arg(long, env = "FAKE_SHELL_NO_EXIT")]
    no_exit: bool,
    /// Print a welcome banner before the first prompt.
    #[arg(long, env = "FAKE_SHELL_BANNER")]
    banner: bool,
}

fn main() -> io::Result<()> {
    let args = Args::parse();
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    if args.banner {
        writeln!(stdout, "Welcome to the fake shell")?;
    }
    prompt(&mut stdout, &args)?;

    for line in stdin.lock().lines() {
        let line = line?;
        let command = line.trim_end_matches('\r');
        match command.trim() {
            "exit" if !args.no_exit => {
                if args.leak {
                    writeln!(stdout, "1 memory leak detected")?;
                }
                stdout.flush()?;
                std::process::exit(args.exit_code);
            }
            "exit" | "" => {}
            "pwd" => writeln!(stdout, "{}", std::env::current_dir()?.display())?,
            other => run_command(&mut stdout, other)?,
        }
        if args.extra_output {
            writeln!(stdout, "debug: extra output")?;
        }
        prompt(&mut stdout, &args)?;
    }

    Ok(())
}

fn run_command(stdout: &mut dyn Write, command: &str) -> io::Result<()> {
    if let Some(text) = command.strip_prefix("echo ") {
        writeln!(stdout, "{text}")
    } else if let Some(dir) = command.strip_prefix("cd ") {
        match std::env::set_current_dir(dir.trim()) {
            Ok(()) => Ok(()),
            Err(err) => writeln!(stdout, "cd: {dir}: {err}"),
        }
    } else {
        let name = command.split_whitespace().next().unwrap_or(command);
        writeln!(stdout, "{name}: Command not found")
    }
}

fn prompt(stdout: &mut dyn Write, args: &Args) -> io::Result<()> {
    if !args.silent {
        write!(stdout, "#? ")?;
    }
    stdout.flush()
}
