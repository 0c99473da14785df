//! Scenario runner: drives the case table through a [`Session`].
//!
//! Each case walks an explicit [`CasePhase`] state machine. Case-level
//! problems (timeouts, early end of output, stray output in strict mode) are
//! recorded and the run moves on; only environment failures that prevent a
//! run from happening at all surface as [`HarnessError`].

pub mod error;
pub mod progress;

pub use error::*;
pub use progress::*;

use crate::filter::OutputFilter;
use crate::matcher::{check_exactness, Pattern};
use crate::model::{
    CaseFailure, CaseReport, ExitCheck, FinalCheckFailure, HarnessConfig, LeakCheck, RunId,
    RunReport, ScoreSummary, SessionState, TestCase, RUN_REPORT_VERSION,
};
use crate::session::{ExitReport, ExpectError, Session, SessionConfig};
use crate::transcript::log_contains;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

/// How the executable under test is launched.
#[derive(Clone, Debug, Default)]
pub struct RunnerOptions {
    /// Arguments passed to the executable.
    pub args: Vec<String>,
    /// Working directory; inherits the harness's when `None`.
    pub cwd: Option<PathBuf>,
    /// Extra environment variables.
    pub env: Vec<(String, String)>,
}

/// Where a single case currently is.
#[derive(Debug)]
enum CasePhase {
    SendInput,
    AwaitEcho,
    AwaitExpected,
    AwaitNextPrompt,
    VerifyStrictness { trailing: String },
    Score,
}

/// A case with its pattern compiled.
struct PreparedCase<'a> {
    case: &'a TestCase,
    pattern: Pattern,
}

/// Run `cases` against `executable` and score the result.
///
/// Every pattern is compiled before anything is spawned, so a bad table fails
/// fast without leaving a session log behind.
///
/// Once the shell is running, every problem is scored rather than returned,
/// so a started run always produces a report.
///
/// # Errors
/// - `E_INVALID_PATTERN`: a configured or case pattern does not compile
/// - `E_SPAWN`: the executable could not be launched
/// - `E_IO`: the session log could not be created
pub fn run_harness(
    executable: &str,
    cases: &[TestCase],
    config: &HarnessConfig,
    options: RunnerOptions,
    progress: &dyn ProgressCallback,
) -> HarnessResult<RunReport> {
    let run_id = RunId::new();
    let run_started = Instant::now();
    let runner = Runner::new(config, progress)?;
    let prepared = cases
        .iter()
        .map(|case| {
            Ok(PreparedCase {
                case,
                pattern: Pattern::new(&case.expected_pattern)?,
            })
        })
        .collect::<HarnessResult<Vec<_>>>()?;

    let log_path = config.log_path_for(executable);
    let mut session_config = SessionConfig::new(executable, log_path.clone());
    session_config.args = options.args;
    session_config.cwd = options.cwd;
    session_config.env = options.env;
    session_config.size = config.terminal_size.clone();
    session_config.line_terminator = config.line_terminator.clone();

    let mut session = Session::spawn(session_config)?;
    info!(%run_id, executable, cases = cases.len(), "run started");
    progress.on_progress(&ProgressEvent::RunStarted {
        run_id,
        total_cases: cases.len(),
    });

    let mut state = SessionState::new();
    let initial_prompt = runner.await_initial_prompt(&mut session, &mut state);

    let mut reports = Vec::with_capacity(prepared.len());
    for (index, prepared_case) in prepared.iter().enumerate() {
        let case_started = Instant::now();
        progress.on_progress(&ProgressEvent::CaseStarted {
            index,
            input: prepared_case.case.input.clone(),
        });
        let report = runner.run_case(&mut session, index, prepared_case, &mut state);
        state.record(report.points, report.passed);
        info!(index, input = %report.input.escape_debug(), passed = report.passed, "case finished");
        progress.on_progress(&ProgressEvent::CaseCompleted {
            report: report.clone(),
            duration_ms: elapsed_ms(&case_started),
        });
        reports.push(report);
    }

    let (exit_check, output) = runner.check_exit(session, executable, &mut state);
    state.record(exit_check.points, exit_check.passed);
    let leak_check = runner.check_leaks(&log_path, &output, executable);
    state.record(leak_check.points, leak_check.passed);

    let score = ScoreSummary::from_state(&state, state.is_perfect(), config.clean_run_bonus);
    let duration_ms = elapsed_ms(&run_started);
    info!(
        %run_id,
        earned = score.total_earned,
        possible = score.total_possible,
        clean = score.clean_run,
        "run completed"
    );
    progress.on_progress(&ProgressEvent::RunCompleted {
        run_id,
        score: score.clone(),
        duration_ms,
    });

    Ok(RunReport {
        report_version: RUN_REPORT_VERSION,
        run_id,
        executable: executable.to_string(),
        log_path,
        initial_prompt,
        cases: reports,
        exit_check,
        leak_check,
        score,
        duration_ms,
    })
}

/// Compiled harness-wide patterns plus the reporting sink.
struct Runner<'a> {
    config: &'a HarnessConfig,
    progress: &'a dyn ProgressCallback,
    prompt: Pattern,
    echo: Pattern,
    filter: OutputFilter,
}

impl<'a> Runner<'a> {
    fn new(config: &'a HarnessConfig, progress: &'a dyn ProgressCallback) -> HarnessResult<Self> {
        Ok(Self {
            config,
            progress,
            prompt: Pattern::new(&config.prompt_pattern)?,
            echo: Pattern::new(&config.echo_pattern)?,
            filter: OutputFilter::with_grammar(&config.escape_grammar)?,
        })
    }

    /// Skip any banner up to the first prompt.
    fn await_initial_prompt(
        &self,
        session: &mut Session,
        state: &mut SessionState,
    ) -> Option<CaseFailure> {
        match session.expect(&self.prompt, self.config.timeout()) {
            Ok(found) => {
                state.capture(found.before);
                None
            }
            Err(err) => {
                let failure = classify(&err, CaseFailure::PromptTimeout, CaseFailure::PromptEof);
                state.capture(err.before());
                self.report_prompt_failure(&failure);
                Some(failure)
            }
        }
    }

    fn run_case(
        &self,
        session: &mut Session,
        index: usize,
        prepared: &PreparedCase<'_>,
        state: &mut SessionState,
    ) -> CaseReport {
        let case = prepared.case;
        let timeout = self.config.timeout();
        let mut failures = Vec::new();
        let mut matched = false;
        let mut phase = CasePhase::SendInput;

        loop {
            phase = match phase {
                CasePhase::SendInput => {
                    if let Err(err) = session.send_line(&case.input) {
                        // The echo wait below turns a dead child into EchoEof.
                        warn!(error = %err, "failed to send input");
                    }
                    CasePhase::AwaitEcho
                }
                CasePhase::AwaitEcho => match session.expect(&self.echo, timeout) {
                    Ok(_) => CasePhase::AwaitExpected,
                    Err(err) => {
                        let failure =
                            classify(&err, CaseFailure::EchoTimeout, CaseFailure::EchoEof);
                        self.report_case_failure(case, &failure);
                        failures.push(failure);
                        CasePhase::AwaitNextPrompt
                    }
                },
                CasePhase::AwaitExpected => match session.expect(&prepared.pattern, timeout) {
                    Ok(_) => {
                        matched = true;
                        CasePhase::AwaitNextPrompt
                    }
                    Err(err) => {
                        let failure = classify(
                            &err,
                            CaseFailure::ExpectationTimeout,
                            CaseFailure::ExpectationEof,
                        );
                        self.report_case_failure(case, &failure);
                        failures.push(failure);
                        CasePhase::AwaitNextPrompt
                    }
                },
                CasePhase::AwaitNextPrompt => {
                    let trailing = self.await_next_prompt(session, &mut failures);
                    state.capture(trailing.clone());
                    CasePhase::VerifyStrictness { trailing }
                }
                CasePhase::VerifyStrictness { trailing } => {
                    if matched {
                        failures.extend(self.verify_strictness(case, &trailing));
                    }
                    CasePhase::Score
                }
                CasePhase::Score => break,
            };
        }

        CaseReport {
            index,
            input: case.input.clone(),
            expected_pattern: case.expected_pattern.clone(),
            exactness: case.exactness(),
            points: case.points,
            passed: matched && !failures.iter().any(CaseFailure::fails_case),
            failures,
        }
    }

    /// Text between the case's output and the next prompt.
    ///
    /// A missing prompt is recorded; whatever was buffered stands in for the
    /// trailing text.
    fn await_next_prompt(&self, session: &mut Session, failures: &mut Vec<CaseFailure>) -> String {
        match session.expect(&self.prompt, self.config.timeout()) {
            Ok(found) => found.before,
            Err(err) => {
                let failure = classify(&err, CaseFailure::PromptTimeout, CaseFailure::PromptEof);
                self.report_prompt_failure(&failure);
                failures.push(failure);
                err.before().to_string()
            }
        }
    }

    fn verify_strictness(&self, case: &TestCase, trailing: &str) -> Option<CaseFailure> {
        let text = check_exactness(case.exactness(), trailing, &self.filter).err()?;
        let failure = CaseFailure::UnexpectedOutput { text };
        self.report_case_failure(case, &failure);
        Some(failure)
    }

    /// Ask the shell to exit, then reap it.
    ///
    /// Also hands back everything the shell printed, for the leak check.
    fn check_exit(
        &self,
        mut session: Session,
        executable: &str,
        state: &mut SessionState,
    ) -> (ExitCheck, String) {
        if let Err(err) = session.send_line(&self.config.exit_command) {
            warn!(error = %err, "failed to send exit command");
        }
        let reached_eof = match session.expect_eof(self.config.timeout()) {
            Ok(rest) => {
                state.capture(rest);
                true
            }
            Err(err) => {
                state.capture(err.before());
                false
            }
        };
        let output = session.output();
        let exit = session.close(self.config.exit_grace()).unwrap_or_else(|err| {
            warn!(error = %err, "failed to reap shell");
            ExitReport {
                exit_code: None,
                did_not_exit: true,
            }
        });

        let check = score_exit(reached_eof, &exit, self.config.exit_bonus);
        for failure in &check.failures {
            self.report_final_failure(executable, failure);
        }
        (check, output)
    }

    /// Search the session log for the leak marker.
    ///
    /// Falls back to the in-memory `output` when the log cannot be read.
    fn check_leaks(&self, log_path: &Path, output: &str, executable: &str) -> LeakCheck {
        let marker = self.config.leak_marker.clone();
        let leaked = log_contains(log_path, &marker).unwrap_or_else(|err| {
            warn!(error = %err, "session log unreadable; searching captured output");
            output.contains(&marker)
        });
        if leaked {
            self.report_final_failure(
                executable,
                &FinalCheckFailure::LeakDetected {
                    marker: marker.clone(),
                },
            );
        }
        LeakCheck {
            marker,
            passed: !leaked,
            points: self.config.leak_bonus,
        }
    }

    fn report_prompt_failure(&self, failure: &CaseFailure) {
        warn!(?failure, "no prompt");
        self.progress
            .on_progress(&ProgressEvent::Failure(FailureNotice::Prompt(failure.clone())));
    }

    fn report_case_failure(&self, case: &TestCase, failure: &CaseFailure) {
        warn!(input = %case.input.escape_debug(), ?failure, "case failure");
        self.progress
            .on_progress(&ProgressEvent::Failure(FailureNotice::Case {
                input: case.input.clone(),
                expected_pattern: case.expected_pattern.clone(),
                failure: failure.clone(),
            }));
    }

    fn report_final_failure(&self, executable: &str, failure: &FinalCheckFailure) {
        warn!(?failure, "final check failed");
        self.progress
            .on_progress(&ProgressEvent::Failure(FailureNotice::Final {
                executable: executable.to_string(),
                failure: failure.clone(),
            }));
    }
}

/// The exit bonus needs the output to close and the child to leave with status 0.
fn score_exit(reached_eof: bool, exit: &ExitReport, points: u32) -> ExitCheck {
    let mut failures = Vec::new();
    if !reached_eof {
        failures.push(FinalCheckFailure::DidNotExit);
    }
    if exit.exit_code != Some(0) {
        failures.push(FinalCheckFailure::NonZeroExit {
            exit_code: exit.exit_code,
        });
    }
    ExitCheck {
        reached_eof,
        exit_code: exit.exit_code,
        passed: reached_eof && exit.success(),
        points,
        failures,
    }
}

fn classify(err: &ExpectError, on_timeout: CaseFailure, on_eof: CaseFailure) -> CaseFailure {
    if err.is_timeout() {
        on_timeout
    } else {
        on_eof
    }
}

fn elapsed_ms(started_at: &Instant) -> u64 {
    u64::try_from(started_at.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_maps_timeout_and_eof() {
        let timeout = ExpectError::Timeout {
            pattern: "x".to_string(),
            waited_ms: 1,
            before: String::new(),
        };
        let eof = ExpectError::EndOfStream {
            pattern: "x".to_string(),
            before: String::new(),
        };
        assert_eq!(
            classify(&timeout, CaseFailure::EchoTimeout, CaseFailure::EchoEof),
            CaseFailure::EchoTimeout
        );
        assert_eq!(
            classify(&eof, CaseFailure::EchoTimeout, CaseFailure::EchoEof),
            CaseFailure::EchoEof
        );
    }

    #[test]
    fn late_exit_after_output_timeout_earns_no_bonus() {
        let exit = ExitReport {
            exit_code: Some(0),
            did_not_exit: false,
        };
        let check = score_exit(false, &exit, 2);
        assert!(!check.passed);
        assert_eq!(check.failures, vec![FinalCheckFailure::DidNotExit]);

        let check = score_exit(true, &exit, 2);
        assert!(check.passed);
        assert!(check.failures.is_empty());
    }

    #[test]
    fn unreaped_shell_scores_as_unknown_exit() {
        let exit = ExitReport {
            exit_code: None,
            did_not_exit: true,
        };
        let check = score_exit(true, &exit, 2);
        assert!(!check.passed);
        assert_eq!(
            check.failures,
            vec![FinalCheckFailure::NonZeroExit { exit_code: None }]
        );
    }

    #[test]
    fn invalid_case_pattern_fails_before_spawn() {
        let dir = tempfile::tempdir().unwrap();
        let config = HarnessConfig {
            log_path: Some(dir.path().join("never.log")),
            ..HarnessConfig::default()
        };
        let cases = vec![TestCase::new("pwd", "([unclosed", true, 1)];
        let err = run_harness("/bin/sh", &cases, &config, RunnerOptions::default(), &NoopProgress)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidPattern);
        assert!(!dir.path().join("never.log").exists());
    }

    #[test]
    fn invalid_prompt_pattern_is_rejected() {
        let config = HarnessConfig {
            prompt_pattern: "(".to_string(),
            ..HarnessConfig::default()
        };
        let err = run_harness("/bin/sh", &[], &config, RunnerOptions::default(), &NoopProgress)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidPattern);
    }

    #[test]
    fn missing_executable_is_a_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = HarnessConfig {
            log_path: Some(dir.path().join("missing.log")),
            ..HarnessConfig::default()
        };
        let err = run_harness(
            "/nonexistent/shellgrade-no-such-shell",
            &[],
            &config,
            RunnerOptions::default(),
            &NoopProgress,
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::Spawn);
    }
}
