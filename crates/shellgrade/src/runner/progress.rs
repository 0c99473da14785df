//! Progress callback for reporting a grading run as it happens.
//!
//! Failure lines are streamed through this trait rather than printed, so the
//! library never writes to stdout and the CLI decides how to render them.

use crate::model::{CaseFailure, CaseReport, FinalCheckFailure, RunId, ScoreSummary};

/// Something that went wrong, tagged with the input it happened on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureNotice {
    /// The initial prompt, or the prompt after a case, did not appear.
    Prompt(CaseFailure),
    /// A case failed.
    Case {
        /// Line that was sent.
        input: String,
        /// Pattern that was awaited.
        expected_pattern: String,
        /// What happened.
        failure: CaseFailure,
    },
    /// An end-of-run check failed.
    Final {
        /// Executable under test.
        executable: String,
        /// What happened.
        failure: FinalCheckFailure,
    },
}

/// Event emitted during a grading run.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Run has started.
    RunStarted {
        /// Unique run identifier.
        run_id: RunId,
        /// Number of cases in the table.
        total_cases: usize,
    },
    /// A case is about to be sent.
    CaseStarted {
        /// Zero-based case index.
        index: usize,
        /// Line about to be sent.
        input: String,
    },
    /// A case finished.
    CaseCompleted {
        /// Outcome of the case.
        report: CaseReport,
        /// Duration in milliseconds.
        duration_ms: u64,
    },
    /// A failure was observed.
    Failure(FailureNotice),
    /// Run has completed.
    RunCompleted {
        /// Unique run identifier.
        run_id: RunId,
        /// Final score.
        score: ScoreSummary,
        /// Total duration in milliseconds.
        duration_ms: u64,
    },
}

/// Trait for receiving progress events during a run.
pub trait ProgressCallback: Send {
    /// Called for each progress event.
    fn on_progress(&self, event: &ProgressEvent);
}

/// A no-op progress callback that discards all events.
pub struct NoopProgress;

impl ProgressCallback for NoopProgress {
    fn on_progress(&self, _event: &ProgressEvent) {}
}
