// Test module - relaxed lint rules
#![allow(clippy::indexing_slicing)]
#![allow(clippy::panic)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(missing_docs)]

//! Runs the harness against small `/bin/sh` scripts that play the part of the
//! shell under test.

use shellgrade::run::grade_cases;
use shellgrade::runner::{FailureNotice, ProgressCallback, ProgressEvent, RunnerOptions};
use shellgrade::{CaseFailure, FinalCheckFailure, HarnessConfig, RunReport, TestCase};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// A well-behaved shell: prompt, `pwd`, `noisy`, an unknown-command error.
const GOOD_SHELL: &str = r#"printf '#? '
while IFS= read -r line; do
  case "$line" in
    exit) exit 0 ;;
    pwd) pwd -P ;;
    noisy) echo first; echo second ;;
    "") ;;
    *) echo "$line: Command not found" ;;
  esac
  printf '#? '
done"#;

/// Prompts and answers, but the terminal no longer echoes typed input.
const NO_ECHO_SHELL: &str = r#"stty -echo
printf '#? '
while IFS= read -r line; do
  case "$line" in
    exit) exit 0 ;;
  esac
  printf '#? '
done"#;

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<ProgressEvent>>,
}

impl Recorder {
    fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().unwrap().clone()
    }

    fn failures(&self) -> Vec<FailureNotice> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                ProgressEvent::Failure(notice) => Some(notice),
                _ => None,
            })
            .collect()
    }
}

impl ProgressCallback for Recorder {
    fn on_progress(&self, event: &ProgressEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

fn config_for(dir: &Path) -> HarnessConfig {
    HarnessConfig {
        timeout_ms: 300,
        exit_grace_ms: 300,
        log_path: Some(dir.join("sh_test.log")),
        ..HarnessConfig::default()
    }
}

fn sh_options(script: &str, cwd: &Path) -> RunnerOptions {
    RunnerOptions {
        args: vec!["-c".to_string(), script.to_string()],
        cwd: Some(cwd.to_path_buf()),
        env: Vec::new(),
    }
}

fn run_script(script: &str, cases: &[TestCase], dir: &Path, progress: &Recorder) -> RunReport {
    run_script_with(script, cases, dir, &config_for(dir), progress)
}

fn run_script_with(
    script: &str,
    cases: &[TestCase],
    dir: &Path,
    config: &HarnessConfig,
    progress: &Recorder,
) -> RunReport {
    grade_cases("/bin/sh", cases, config, sh_options(script, dir), progress).unwrap()
}

fn canonical(dir: &Path) -> PathBuf {
    std::fs::canonicalize(dir).unwrap()
}

#[test]
fn clean_run_earns_every_bonus() {
    let dir = tempfile::tempdir().unwrap();
    let cwd = regex::escape(&canonical(dir.path()).display().to_string());
    let cases = vec![
        TestCase::new("", "", true, 1),
        TestCase::new("pwd", cwd, true, 1),
        TestCase::new("frobnicate", "Command not found|No such file", false, 2),
    ];
    let progress = Recorder::default();

    let report = run_script(GOOD_SHELL, &cases, dir.path(), &progress);

    assert!(report.initial_prompt.is_none());
    assert!(report.cases.iter().all(|case| case.passed), "{:?}", report.cases);
    assert!(report.exit_check.passed);
    assert_eq!(report.exit_check.exit_code, Some(0));
    assert!(report.leak_check.passed);
    assert!(report.score.clean_run);
    assert_eq!(report.score.raw_earned, 11);
    assert_eq!(report.score.raw_possible, 11);
    assert_eq!(report.score.total_earned, 16);
    assert_eq!(report.score.total_possible, 16);
    assert!(progress.failures().is_empty());
}

#[test]
fn strict_case_fails_on_extra_output() {
    let dir = tempfile::tempdir().unwrap();
    let cases = vec![TestCase::new("noisy", "first", true, 2)];
    let progress = Recorder::default();

    let report = run_script(GOOD_SHELL, &cases, dir.path(), &progress);

    let case = &report.cases[0];
    assert!(!case.passed);
    assert_eq!(
        case.failures,
        vec![CaseFailure::UnexpectedOutput {
            text: "second".to_string()
        }]
    );
    assert_eq!(report.score.raw_possible, 9);
    assert_eq!(report.score.raw_earned, 7);
    assert!(!report.score.clean_run);
    assert_eq!(report.score.total_possible, 14);
}

#[test]
fn loose_case_ignores_extra_output() {
    let dir = tempfile::tempdir().unwrap();
    let cases = vec![TestCase::new("noisy", "first", false, 1)];
    let progress = Recorder::default();

    let report = run_script(GOOD_SHELL, &cases, dir.path(), &progress);

    assert!(report.cases[0].passed);
    assert!(report.score.clean_run);
}

#[test]
fn never_matching_pattern_fails_within_timeout() {
    let dir = tempfile::tempdir().unwrap();
    let cases = vec![TestCase::new("hello", "never appears", false, 1)];
    let progress = Recorder::default();

    let started = Instant::now();
    let report = run_script(GOOD_SHELL, &cases, dir.path(), &progress);

    assert_eq!(report.cases[0].failures, vec![CaseFailure::ExpectationTimeout]);
    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(
        progress.failures(),
        vec![FailureNotice::Case {
            input: "hello".to_string(),
            expected_pattern: "never appears".to_string(),
            failure: CaseFailure::ExpectationTimeout,
        }]
    );
    // The remaining cases and final checks still ran.
    assert!(report.exit_check.passed);
}

#[test]
fn non_zero_exit_withholds_exit_bonus() {
    let dir = tempfile::tempdir().unwrap();
    let script = GOOD_SHELL.replace("exit) exit 0", "exit) exit 3");
    let progress = Recorder::default();

    let report = run_script(&script, &[], dir.path(), &progress);

    assert!(report.exit_check.reached_eof);
    assert_eq!(report.exit_check.exit_code, Some(3));
    assert!(!report.exit_check.passed);
    assert_eq!(
        report.exit_check.failures,
        vec![FinalCheckFailure::NonZeroExit { exit_code: Some(3) }]
    );
    assert_eq!(report.score.raw_earned, 5);
    assert_eq!(report.score.raw_possible, 7);
}

#[test]
fn leak_marker_in_log_withholds_leak_bonus() {
    let dir = tempfile::tempdir().unwrap();
    let script = GOOD_SHELL.replace(
        "exit) exit 0",
        "exit) echo '2 memory leaks found'; exit 0",
    );
    let progress = Recorder::default();

    let report = run_script(&script, &[], dir.path(), &progress);

    assert!(report.exit_check.passed);
    assert!(!report.leak_check.passed);
    assert_eq!(report.score.raw_earned, 2);
    assert!(progress.failures().contains(&FailureNotice::Final {
        executable: "/bin/sh".to_string(),
        failure: FinalCheckFailure::LeakDetected {
            marker: "memory leak".to_string()
        },
    }));
}

#[test]
fn ignored_exit_is_reported_and_child_is_killed() {
    let dir = tempfile::tempdir().unwrap();
    let script = GOOD_SHELL.replace("exit) exit 0 ;;", "exit) ;;");
    let progress = Recorder::default();

    let report = run_script(&script, &[], dir.path(), &progress);

    assert!(!report.exit_check.reached_eof);
    assert!(!report.exit_check.passed);
    assert_eq!(
        report.exit_check.failures.first(),
        Some(&FinalCheckFailure::DidNotExit)
    );
}

#[test]
fn exit_after_output_timeout_withholds_exit_and_clean_run_bonus() {
    let dir = tempfile::tempdir().unwrap();
    let script = GOOD_SHELL.replace("exit) exit 0", "exit) sleep 0.8; exit 0");
    let config = HarnessConfig {
        exit_grace_ms: 2000,
        ..config_for(dir.path())
    };
    let progress = Recorder::default();

    let report = run_script_with(&script, &[], dir.path(), &config, &progress);

    assert!(!report.exit_check.reached_eof);
    assert_eq!(report.exit_check.exit_code, Some(0));
    assert_eq!(report.exit_check.failures, vec![FinalCheckFailure::DidNotExit]);
    assert!(!report.exit_check.passed);
    assert!(!report.score.clean_run);
    assert_eq!(report.score.raw_earned, 5);
    assert_eq!(report.score.total_earned, 5);
    assert_eq!(report.score.total_possible, 12);
}

#[test]
fn removed_session_log_still_gets_a_leak_check() {
    let dir = tempfile::tempdir().unwrap();
    let script = GOOD_SHELL.replace(
        "exit) exit 0 ;;",
        "exit) echo '1 memory leak'; exit 0 ;;\n    rmlog) rm -f sh_test.log ;;",
    );
    let cases = vec![TestCase::new("rmlog", "", false, 1)];
    let progress = Recorder::default();

    let report = run_script(&script, &cases, dir.path(), &progress);

    assert!(!dir.path().join("sh_test.log").exists());
    assert!(report.cases[0].passed);
    assert!(report.exit_check.passed);
    assert!(!report.leak_check.passed);
    assert_eq!(report.score.raw_earned, 3);
    assert!(progress.failures().contains(&FailureNotice::Final {
        executable: "/bin/sh".to_string(),
        failure: FinalCheckFailure::LeakDetected {
            marker: "memory leak".to_string()
        },
    }));
}

#[test]
fn banner_before_first_prompt_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let script = format!("echo 'Welcome to sh'\n{GOOD_SHELL}");
    let cases = vec![TestCase::new("frobnicate", "Command not found", true, 1)];
    let progress = Recorder::default();

    let report = run_script(&script, &cases, dir.path(), &progress);

    assert!(report.initial_prompt.is_none());
    assert!(report.cases[0].passed, "{:?}", report.cases[0]);
    assert!(report.score.clean_run);
}

#[test]
fn missing_echo_fails_case_and_skips_to_next_prompt() {
    let dir = tempfile::tempdir().unwrap();
    let cases = vec![
        TestCase::new("quiet", "never appears", false, 1),
        TestCase::new("again", "never appears", false, 1),
    ];
    let progress = Recorder::default();

    let report = run_script(NO_ECHO_SHELL, &cases, dir.path(), &progress);

    for case in &report.cases {
        assert!(!case.passed);
        // The expected pattern is never awaited once the echo is missing.
        assert_eq!(case.failures, vec![CaseFailure::EchoTimeout]);
    }
    assert_eq!(
        progress.failures().first(),
        Some(&FailureNotice::Case {
            input: "quiet".to_string(),
            expected_pattern: "never appears".to_string(),
            failure: CaseFailure::EchoTimeout,
        })
    );
    assert!(report.exit_check.passed);
}

#[test]
fn missing_initial_prompt_is_reported_but_cases_continue() {
    let dir = tempfile::tempdir().unwrap();
    let script = GOOD_SHELL.replacen("printf '#? '\n", "", 1);
    let cases = vec![TestCase::new("hello", "Command not found", false, 1)];
    let progress = Recorder::default();

    let report = run_script(&script, &cases, dir.path(), &progress);

    assert_eq!(report.initial_prompt, Some(CaseFailure::PromptTimeout));
    assert!(report.cases[0].passed);
    assert_eq!(
        progress.failures().first(),
        Some(&FailureNotice::Prompt(CaseFailure::PromptTimeout))
    );
}

#[test]
fn shell_that_dies_mid_run_fails_remaining_cases_with_eof() {
    let dir = tempfile::tempdir().unwrap();
    let script = "printf '#? '; IFS= read -r line; exit 0";
    let cases = vec![
        TestCase::new("first", "never appears", false, 1),
        TestCase::new("second", "never appears", false, 1),
    ];
    let progress = Recorder::default();

    let report = run_script(script, &cases, dir.path(), &progress);

    assert!(report.cases.iter().all(|case| !case.passed));
    let second = &report.cases[1];
    assert!(
        second
            .failures
            .iter()
            .any(|failure| matches!(failure, CaseFailure::EchoEof | CaseFailure::ExpectationEof)),
        "{:?}",
        second.failures
    );
    assert!(report.exit_check.reached_eof);
}

#[test]
fn session_log_mirrors_raw_output() {
    let dir = tempfile::tempdir().unwrap();
    let cases = vec![TestCase::new("frobnicate", "Command not found", false, 1)];
    let progress = Recorder::default();

    let report = run_script(GOOD_SHELL, &cases, dir.path(), &progress);

    let log = std::fs::read_to_string(&report.log_path).unwrap();
    assert!(log.starts_with("#? "));
    assert!(log.contains("frobnicate\r\n"));
    assert!(log.contains("frobnicate: Command not found"));
}

#[test]
fn progress_events_bracket_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let cases = vec![
        TestCase::new("", "", true, 1),
        TestCase::new("frobnicate", "Command not found", false, 1),
    ];
    let progress = Recorder::default();

    let report = run_script(GOOD_SHELL, &cases, dir.path(), &progress);
    let events = progress.events();

    match events.first() {
        Some(ProgressEvent::RunStarted {
            run_id,
            total_cases,
        }) => {
            assert_eq!(*run_id, report.run_id);
            assert_eq!(*total_cases, 2);
        }
        other => panic!("unexpected first event: {other:?}"),
    }
    match events.last() {
        Some(ProgressEvent::RunCompleted { score, .. }) => assert_eq!(*score, report.score),
        other => panic!("unexpected last event: {other:?}"),
    }
    let completed = events
        .iter()
        .filter(|event| matches!(event, ProgressEvent::CaseCompleted { .. }))
        .count();
    assert_eq!(completed, 2);
}
