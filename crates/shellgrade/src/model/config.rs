use crate::model::TerminalSize;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Prompt printed by the shell under test: a `#?` marker, anything, then a space.
pub const DEFAULT_PROMPT_PATTERN: &str = r"#\?.* ";

/// Line ending the terminal driver emits after echoing an input line.
pub const DEFAULT_ECHO_PATTERN: &str = r"\r\n";

/// Escape-sequence grammar stripped by the output filter.
///
/// Covers 7-bit `ESC`-introduced sequences and 8-bit C1 introducers, followed by
/// parameter bytes, intermediate bytes and a final byte.
pub const DEFAULT_ESCAPE_GRAMMAR: &str = r"(?:\x1B[@-_]|[\x80-\x9F])[0-?]*[ -/]*[@-~]";

/// Diagnostic substring the shell's allocator checker prints on a leak.
pub const DEFAULT_LEAK_MARKER: &str = "memory leak";

/// Harness-wide settings applied uniformly to every case.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// Timeout applied to every `expect` call.
    pub timeout_ms: u64,
    /// Regex marking the shell's readiness for the next line.
    pub prompt_pattern: String,
    /// Regex consuming the echoed input line.
    pub echo_pattern: String,
    /// Appended to every line sent to the shell.
    pub line_terminator: String,
    /// Command that asks the shell to terminate.
    pub exit_command: String,
    /// How long to wait for the process to be reaped once its output closed.
    pub exit_grace_ms: u64,
    /// Substring in the session log that withholds the leak bonus.
    pub leak_marker: String,
    /// Awarded when the shell exits with status zero.
    pub exit_bonus: u32,
    /// Awarded when the session log contains no leak marker.
    pub leak_bonus: u32,
    /// Added to the total when every case and final check passed.
    pub clean_run_bonus: u32,
    /// Escape-sequence grammar used by the output filter.
    pub escape_grammar: String,
    /// Pseudo-terminal size presented to the shell.
    pub terminal_size: TerminalSize,
    /// Session log location; defaults to `<executable>_test.log`.
    #[serde(default)]
    pub log_path: Option<PathBuf>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 1000,
            prompt_pattern: DEFAULT_PROMPT_PATTERN.to_string(),
            echo_pattern: DEFAULT_ECHO_PATTERN.to_string(),
            line_terminator: "\n".to_string(),
            exit_command: "exit".to_string(),
            exit_grace_ms: 1000,
            leak_marker: DEFAULT_LEAK_MARKER.to_string(),
            exit_bonus: 2,
            leak_bonus: 5,
            clean_run_bonus: 5,
            escape_grammar: DEFAULT_ESCAPE_GRAMMAR.to_string(),
            terminal_size: TerminalSize::default(),
            log_path: None,
        }
    }
}

impl HarnessConfig {
    /// Uniform `expect` timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Grace period for reaping the child after its output closed.
    #[must_use]
    pub fn exit_grace(&self) -> Duration {
        Duration::from_millis(self.exit_grace_ms)
    }

    /// Session log path for `executable`, honouring an explicit override.
    ///
    /// The default mirrors the executable path with a `_test.log` suffix, so
    /// `./plaidsh` logs to `./plaidsh_test.log`.
    #[must_use]
    pub fn log_path_for(&self, executable: &str) -> PathBuf {
        self.log_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("{executable}_test.log")))
    }

    /// Sum of the two fixed end-of-run bonuses.
    #[must_use]
    pub fn final_check_points(&self) -> u32 {
        self.exit_bonus + self.leak_bonus
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_path_defaults_next_to_executable() {
        let config = HarnessConfig::default();
        assert_eq!(
            config.log_path_for("./plaidsh"),
            PathBuf::from("./plaidsh_test.log")
        );
    }

    #[test]
    fn log_path_override_wins() {
        let config = HarnessConfig {
            log_path: Some(PathBuf::from("/tmp/custom.log")),
            ..HarnessConfig::default()
        };
        assert_eq!(
            config.log_path_for("./plaidsh"),
            PathBuf::from("/tmp/custom.log")
        );
    }

    #[test]
    fn default_bonuses_match_grading_scheme() {
        let config = HarnessConfig::default();
        assert_eq!(config.final_check_points(), 7);
        assert_eq!(config.clean_run_bonus, 5);
        assert_eq!(config.timeout(), Duration::from_secs(1));
    }

    #[test]
    fn config_roundtrips_through_json() {
        let config = HarnessConfig::default();
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["prompt_pattern"], DEFAULT_PROMPT_PATTERN);
        let back: HarnessConfig = serde_json::from_value(json).unwrap();
        assert_eq!(back, config);
    }
}
