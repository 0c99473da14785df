//! Console progress output: streamed failure lines, plus an indicatif spinner
//! per case in verbose mode.

use indicatif::{ProgressBar, ProgressStyle};
use shellgrade::report::format_failure;
use shellgrade::runner::{ProgressCallback, ProgressEvent};
use std::io::Write;
use std::sync::Mutex;

/// Progress callback used by the CLI.
///
/// Failure lines go to stdout as they happen (they are part of the report);
/// verbose status goes to stderr so it never mixes with the report.
pub struct ConsoleProgress {
    stream_failures: bool,
    verbose: bool,
    spinner: Mutex<Option<ProgressBar>>,
    total_cases: Mutex<usize>,
}

impl ConsoleProgress {
    pub fn new(stream_failures: bool, verbose: bool) -> Self {
        Self {
            stream_failures,
            verbose,
            spinner: Mutex::new(None),
            total_cases: Mutex::new(0),
        }
    }

    fn finish_spinner(&self) {
        if let Ok(mut spinner) = self.spinner.lock() {
            if let Some(pb) = spinner.take() {
                pb.finish_and_clear();
            }
        }
    }

    fn print_failure(&self, line: &str) {
        let print = || {
            let mut stdout = std::io::stdout();
            let _ = writeln!(stdout, "{line}");
            let _ = stdout.flush();
        };
        match self.spinner.lock() {
            Ok(spinner) => match spinner.as_ref() {
                Some(pb) => pb.suspend(print),
                None => print(),
            },
            Err(_) => print(),
        }
    }

    fn start_case(&self, index: usize, input: &str) {
        let total = self.total_cases.lock().map(|g| *g).unwrap_or(0);
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} [{elapsed_precise}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(format!("[{}/{total}] {}", index + 1, input.escape_debug()));
        pb.enable_steady_tick(std::time::Duration::from_millis(100));

        if let Ok(mut spinner) = self.spinner.lock() {
            *spinner = Some(pb);
        }
    }
}

impl ProgressCallback for ConsoleProgress {
    fn on_progress(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::Failure(notice) => {
                if self.stream_failures {
                    self.print_failure(&format_failure(notice));
                }
            }
            _ if !self.verbose => {}
            ProgressEvent::RunStarted {
                run_id,
                total_cases,
            } => {
                if let Ok(mut total) = self.total_cases.lock() {
                    *total = *total_cases;
                }
                let _ = writeln!(
                    std::io::stderr(),
                    "run started: {run_id} ({total_cases} cases)"
                );
            }
            ProgressEvent::CaseStarted { index, input } => self.start_case(*index, input),
            ProgressEvent::CaseCompleted {
                report,
                duration_ms,
            } => {
                self.finish_spinner();
                let icon = if report.passed {
                    "\x1b[32m✓\x1b[0m"
                } else {
                    "\x1b[31m✗\x1b[0m"
                };
                let _ = writeln!(
                    std::io::stderr(),
                    "  {icon} {} ({} pt, {duration_ms}ms)",
                    report.input.escape_debug(),
                    report.points
                );
            }
            ProgressEvent::RunCompleted {
                run_id: _,
                score,
                duration_ms,
            } => {
                self.finish_spinner();
                let status = if score.clean_run {
                    "\x1b[32mclean\x1b[0m"
                } else {
                    "\x1b[31mfailures\x1b[0m"
                };
                let _ = writeln!(
                    std::io::stderr(),
                    "run {status}: {duration_ms}ms total"
                );
            }
        }
    }
}
