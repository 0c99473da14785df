use crate::model::{Exactness, RunId};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Why a single case (or the prompt around it) did not go as scripted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CaseFailure {
    /// No prompt appeared before the timeout.
    PromptTimeout,
    /// Output closed while waiting for a prompt.
    PromptEof,
    /// The echoed input line never completed.
    EchoTimeout,
    /// Output closed before the echoed input line completed.
    EchoEof,
    /// The expected pattern did not appear before the timeout.
    ExpectationTimeout,
    /// Output closed before the expected pattern appeared.
    ExpectationEof,
    /// A strict case matched but left text before the next prompt.
    UnexpectedOutput {
        /// Filtered leftover text.
        text: String,
    },
}

impl CaseFailure {
    /// Whether this failure costs the case its points.
    ///
    /// A missing prompt after the case is reported but does not change the
    /// case's own outcome.
    #[must_use]
    pub fn fails_case(&self) -> bool {
        !matches!(self, Self::PromptTimeout | Self::PromptEof)
    }
}

/// Outcome of one scripted case.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseReport {
    /// Zero-based position in the case table.
    pub index: usize,
    /// Line sent to the shell.
    pub input: String,
    /// Regex the response had to contain.
    pub expected_pattern: String,
    /// Exactness mode the case ran under.
    pub exactness: Exactness,
    /// Weight of the case.
    pub points: u32,
    /// Whether the case earned its points.
    pub passed: bool,
    /// Every failure observed while running the case, in order.
    pub failures: Vec<CaseFailure>,
}

/// Why one of the fixed end-of-run checks withheld its bonus.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FinalCheckFailure {
    /// Output did not close after the exit command.
    DidNotExit,
    /// The process was reaped with a non-zero (or unknown) status.
    NonZeroExit {
        /// Exit code, when the process could be reaped at all.
        exit_code: Option<u32>,
    },
    /// The session log contained the leak marker.
    LeakDetected {
        /// Marker that was found.
        marker: String,
    },
}

/// Result of the clean-exit check.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitCheck {
    /// Output closed after the exit command.
    pub reached_eof: bool,
    /// Exit code once the child was reaped.
    pub exit_code: Option<u32>,
    /// Bonus earned.
    pub passed: bool,
    /// Bonus value.
    pub points: u32,
    /// Failures observed, in order.
    pub failures: Vec<FinalCheckFailure>,
}

/// Result of the leak-marker check.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeakCheck {
    /// Marker searched for in the session log.
    pub marker: String,
    /// Bonus earned.
    pub passed: bool,
    /// Bonus value.
    pub points: u32,
}

/// Running score owned by the scenario runner.
///
/// `score_possible` grows by every case's points (and by each bonus) whether or
/// not it passed, so `score_earned <= score_possible` always holds.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    /// Points earned so far.
    pub score_earned: u32,
    /// Points available so far.
    pub score_possible: u32,
    /// Raw text captured before the most recent prompt (or end of output).
    pub last_captured_output: String,
}

impl SessionState {
    /// Create an empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Account for a case or bonus worth `points`.
    pub fn record(&mut self, points: u32, passed: bool) {
        self.score_possible = self.score_possible.saturating_add(points);
        if passed {
            self.score_earned = self.score_earned.saturating_add(points);
        }
    }

    /// Remember the text captured before the latest prompt.
    pub fn capture(&mut self, text: impl Into<String>) {
        self.last_captured_output = text.into();
    }

    /// True when nothing has been lost so far.
    #[must_use]
    pub fn is_perfect(&self) -> bool {
        self.score_earned == self.score_possible
    }
}

/// Final numbers printed in the summary.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreSummary {
    /// Points earned from cases and final checks.
    pub raw_earned: u32,
    /// Points available from cases and final checks.
    pub raw_possible: u32,
    /// Whether every case and final check passed.
    pub clean_run: bool,
    /// Bonus value offered for a clean run.
    pub clean_run_bonus: u32,
    /// Raw points plus the clean-run bonus when earned.
    pub total_earned: u32,
    /// Raw points available plus the clean-run bonus.
    pub total_possible: u32,
}

impl ScoreSummary {
    /// Derive the summary from the runner's final state.
    #[must_use]
    pub fn from_state(state: &SessionState, clean_run: bool, clean_run_bonus: u32) -> Self {
        let bonus = if clean_run { clean_run_bonus } else { 0 };
        Self {
            raw_earned: state.score_earned,
            raw_possible: state.score_possible,
            clean_run,
            clean_run_bonus,
            total_earned: state.score_earned.saturating_add(bonus),
            total_possible: state.score_possible.saturating_add(clean_run_bonus),
        }
    }
}

/// Everything a grading run produced.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunReport {
    /// Layout version of this report.
    pub report_version: u32,
    /// Identifier of this run.
    pub run_id: RunId,
    /// Executable under test.
    pub executable: String,
    /// Raw session log.
    pub log_path: PathBuf,
    /// Failure while waiting for the very first prompt, if any.
    pub initial_prompt: Option<CaseFailure>,
    /// Per-case outcomes in table order.
    pub cases: Vec<CaseReport>,
    /// Clean-exit bonus check.
    pub exit_check: ExitCheck,
    /// Leak-marker bonus check.
    pub leak_check: LeakCheck,
    /// Final scores.
    pub score: ScoreSummary,
    /// Wall-clock duration of the run.
    pub duration_ms: u64,
}

/// Serializable projection of a fatal harness error.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable error code (e.g. `E_SPAWN`).
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Structured context.
    pub context: Option<serde_json::Value>,
}
