//! Shellgrade: a PTY-driven conformance harness for interactive shells.
//!
//! The harness spawns a shell on a pseudo-terminal, types a scripted sequence
//! of lines into it, matches what comes back against regular expressions, and
//! scores the conversation. Cases run in loose mode (the pattern must appear)
//! or strict mode (nothing but the pattern may appear before the next
//! prompt, once terminal control sequences are filtered out). Two fixed checks
//! close every run: the shell must exit with status zero, and its output must
//! not mention a memory leak.
//!
//! ```no_run
//! use shellgrade::run::grade;
//! use shellgrade::runner::NoopProgress;
//! use shellgrade::HarnessConfig;
//!
//! # fn example() -> Result<(), shellgrade::runner::HarnessError> {
//! let report = grade("./plaidsh", &HarnessConfig::default(), &NoopProgress)?;
//! print!("{}", shellgrade::report::render_summary(&report.score));
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
// Helper constructors on error types are self-describing.
#![allow(missing_docs)]

pub mod filter;
pub mod matcher;
pub mod model;
pub mod report;
pub mod runner;
pub mod scenario;
pub mod session;
pub mod transcript;

pub use crate::model::*;

pub mod run {
    use super::runner::{run_harness, HarnessResult, ProgressCallback, RunnerOptions};
    use super::scenario::{plaid_shell_cases, ScenarioEnv};
    use super::{HarnessConfig, RunReport, TestCase};

    /// Grade `executable` against the plaid shell conversation.
    ///
    /// The case table is parameterized by the current process environment.
    pub fn grade(
        executable: &str,
        config: &HarnessConfig,
        progress: &dyn ProgressCallback,
    ) -> HarnessResult<RunReport> {
        let scenario_env = ScenarioEnv::discover()?;
        let cases = plaid_shell_cases(&scenario_env);
        run_harness(
            executable,
            &cases,
            config,
            RunnerOptions::default(),
            progress,
        )
    }

    /// Grade `executable` against a caller-supplied case table.
    pub fn grade_cases(
        executable: &str,
        cases: &[TestCase],
        config: &HarnessConfig,
        options: RunnerOptions,
        progress: &dyn ProgressCallback,
    ) -> HarnessResult<RunReport> {
        run_harness(executable, cases, config, options, progress)
    }
}
