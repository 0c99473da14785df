//! Human-readable rendering of failures and the final score.
//!
//! The text produced here is the harness's stable output contract; graders
//! and scripts read it line by line.

use crate::model::{CaseFailure, FinalCheckFailure, RunReport, ScoreSummary};
use crate::runner::FailureNotice;
use std::fmt::Write as _;

/// One `FAIL` line for a failure notice.
#[must_use]
pub fn format_failure(notice: &FailureNotice) -> String {
    match notice {
        FailureNotice::Prompt(_) => "FAIL: No prompt".to_string(),
        FailureNotice::Case {
            input,
            expected_pattern,
            failure,
        } => format_case_failure(input, expected_pattern, failure),
        FailureNotice::Final {
            executable,
            failure,
        } => format_final_failure(executable, failure),
    }
}

/// `FAIL` line for a case-level failure.
#[must_use]
pub fn format_case_failure(input: &str, expected_pattern: &str, failure: &CaseFailure) -> String {
    match failure {
        CaseFailure::PromptTimeout | CaseFailure::PromptEof => "FAIL: No prompt".to_string(),
        CaseFailure::EchoTimeout => format!("FAIL: Input '{input}': No echo"),
        CaseFailure::EchoEof => format!("FAIL (EOF): Input '{input}': No echo"),
        CaseFailure::ExpectationTimeout => {
            format!("FAIL: Input '{input}': Expected '{expected_pattern}'")
        }
        CaseFailure::ExpectationEof => {
            format!("FAIL (EOF): Input '{input}': Expected '{expected_pattern}'")
        }
        CaseFailure::UnexpectedOutput { text } => {
            format!("FAIL: Unexpected output '{text}' with input '{input}'")
        }
    }
}

/// `FAIL` line for an end-of-run check.
#[must_use]
pub fn format_final_failure(executable: &str, failure: &FinalCheckFailure) -> String {
    match failure {
        FinalCheckFailure::DidNotExit => "FAIL: Program did not exit as expected".to_string(),
        FinalCheckFailure::NonZeroExit { exit_code } => {
            let status = exit_code.map_or_else(|| "None".to_string(), |code| code.to_string());
            format!("FAIL: {executable} exited with status {status}")
        }
        FinalCheckFailure::LeakDetected { .. } => "FAIL: Memory leaks detected".to_string(),
    }
}

/// Every failure line a run produced, in the order they happened.
#[must_use]
pub fn failure_lines(report: &RunReport) -> Vec<String> {
    let mut lines = Vec::new();
    if report.initial_prompt.is_some() {
        lines.push("FAIL: No prompt".to_string());
    }
    for case in &report.cases {
        for failure in &case.failures {
            lines.push(format_case_failure(
                &case.input,
                &case.expected_pattern,
                failure,
            ));
        }
    }
    for failure in &report.exit_check.failures {
        lines.push(format_final_failure(&report.executable, failure));
    }
    if !report.leak_check.passed {
        lines.push(format_final_failure(
            &report.executable,
            &FinalCheckFailure::LeakDetected {
                marker: report.leak_check.marker.clone(),
            },
        ));
    }
    lines
}

/// Score summary printed after the run.
#[must_use]
pub fn render_summary(score: &ScoreSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Raw Score: {} out of {}",
        score.raw_earned, score.raw_possible
    );
    if score.clean_run {
        let _ = writeln!(
            out,
            "  ...plus {} bonus points for passing all the tests!",
            score.clean_run_bonus
        );
    } else {
        out.push_str("TEST FAILURES EXIST\n");
    }
    let _ = writeln!(
        out,
        "Total score: {} out of {}",
        score.total_earned, score.total_possible
    );
    out
}

/// Failure lines followed by the summary, as the CLI prints them.
#[must_use]
pub fn render_report(report: &RunReport) -> String {
    let mut out = String::new();
    for line in failure_lines(report) {
        out.push_str(&line);
        out.push('\n');
    }
    out.push_str(&render_summary(&report.score));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        CaseReport, Exactness, ExitCheck, LeakCheck, RunId, SessionState, RUN_REPORT_VERSION,
    };
    use std::path::PathBuf;

    fn summary(earned: u32, possible: u32, clean: bool) -> ScoreSummary {
        let mut state = SessionState::new();
        state.record(earned, true);
        state.record(possible - earned, false);
        ScoreSummary::from_state(&state, clean, 5)
    }

    #[test]
    fn clean_summary_adds_bonus_to_both_sides() {
        let text = render_summary(&summary(65, 65, true));
        assert_eq!(
            text,
            "Raw Score: 65 out of 65\n  ...plus 5 bonus points for passing all the tests!\nTotal score: 70 out of 70\n"
        );
    }

    #[test]
    fn failing_summary_still_offers_bonus() {
        let text = render_summary(&summary(60, 65, false));
        assert_eq!(
            text,
            "Raw Score: 60 out of 65\nTEST FAILURES EXIST\nTotal score: 60 out of 70\n"
        );
    }

    #[test]
    fn case_failure_lines_name_input_and_pattern() {
        assert_eq!(
            format_case_failure("ls", "README", &CaseFailure::ExpectationTimeout),
            "FAIL: Input 'ls': Expected 'README'"
        );
        assert_eq!(
            format_case_failure("ls", "README", &CaseFailure::ExpectationEof),
            "FAIL (EOF): Input 'ls': Expected 'README'"
        );
        assert_eq!(
            format_case_failure(
                "pwd",
                "/tmp",
                &CaseFailure::UnexpectedOutput {
                    text: "extra".to_string()
                }
            ),
            "FAIL: Unexpected output 'extra' with input 'pwd'"
        );
        assert_eq!(
            format_case_failure("pwd", "/tmp", &CaseFailure::PromptTimeout),
            "FAIL: No prompt"
        );
    }

    #[test]
    fn final_failure_lines() {
        assert_eq!(
            format_final_failure("./plaidsh", &FinalCheckFailure::DidNotExit),
            "FAIL: Program did not exit as expected"
        );
        assert_eq!(
            format_final_failure(
                "./plaidsh",
                &FinalCheckFailure::NonZeroExit { exit_code: Some(3) }
            ),
            "FAIL: ./plaidsh exited with status 3"
        );
        assert_eq!(
            format_final_failure(
                "./plaidsh",
                &FinalCheckFailure::LeakDetected {
                    marker: "memory leak".to_string()
                }
            ),
            "FAIL: Memory leaks detected"
        );
    }

    #[test]
    fn report_lists_failures_in_run_order() {
        let report = RunReport {
            report_version: RUN_REPORT_VERSION,
            run_id: RunId::new(),
            executable: "./plaidsh".to_string(),
            log_path: PathBuf::from("./plaidsh_test.log"),
            initial_prompt: None,
            cases: vec![CaseReport {
                index: 0,
                input: "pwd".to_string(),
                expected_pattern: "/tmp".to_string(),
                exactness: Exactness::Strict,
                points: 1,
                passed: false,
                failures: vec![CaseFailure::ExpectationTimeout, CaseFailure::PromptTimeout],
            }],
            exit_check: ExitCheck {
                reached_eof: true,
                exit_code: Some(1),
                passed: false,
                points: 2,
                failures: vec![FinalCheckFailure::NonZeroExit { exit_code: Some(1) }],
            },
            leak_check: LeakCheck {
                marker: "memory leak".to_string(),
                passed: false,
                points: 5,
            },
            score: summary(0, 8, false),
            duration_ms: 10,
        };

        let text = render_report(&report);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "FAIL: Input 'pwd': Expected '/tmp'",
                "FAIL: No prompt",
                "FAIL: ./plaidsh exited with status 1",
                "FAIL: Memory leaks detected",
                "Raw Score: 0 out of 8",
                "TEST FAILURES EXIST",
                "Total score: 0 out of 13",
            ]
        );
    }
}
