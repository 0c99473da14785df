use crate::model::ErrorInfo;
use miette::Diagnostic;
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};

/// Result alias for fatal harness operations.
pub type HarnessResult<T> = Result<T, HarnessError>;

/// Stable codes for errors that abort a run before scoring.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCode {
    /// The shell under test could not be launched.
    Spawn,
    /// A harness-side file or pty operation failed.
    Io,
    /// `setup_playground.sh` was not found in any candidate directory.
    SetupScriptNotFound,
    /// The working directory has no visible entry to list.
    NoCandidateFile,
    /// A configured pattern is not a valid regular expression.
    InvalidPattern,
}

impl ErrorCode {
    /// Wire form of the code.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Spawn => "E_SPAWN",
            Self::Io => "E_IO",
            Self::SetupScriptNotFound => "E_SETUP_SCRIPT",
            Self::NoCandidateFile => "E_NO_CANDIDATE_FILE",
            Self::InvalidPattern => "E_INVALID_PATTERN",
        }
    }

    /// Process exit code the CLI uses for this error.
    #[must_use]
    pub fn exit_code(self) -> i32 {
        match self {
            Self::Spawn => 3,
            Self::Io => 4,
            Self::SetupScriptNotFound | Self::NoCandidateFile => 5,
            Self::InvalidPattern => 6,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fatal error: the run cannot start (or cannot continue to produce a log).
#[derive(Debug, thiserror::Error)]
#[error("{code}: {message}")]
pub struct HarnessError {
    /// Stable error code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
    /// Structured context for JSON output.
    pub context: Option<Value>,
}

impl HarnessError {
    fn new(code: ErrorCode, message: impl Into<String>, context: Option<Value>) -> Self {
        Self {
            code,
            message: message.into(),
            context,
        }
    }

    pub fn spawn(message: impl Into<String>, err: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::Spawn,
            message,
            Some(serde_json::json!({ "source": err.to_string() })),
        )
    }

    pub fn io(message: impl Into<String>, err: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::Io,
            message,
            Some(serde_json::json!({ "source": err.to_string() })),
        )
    }

    pub fn setup_script_not_found(script: &str, searched: &[PathBuf]) -> Self {
        Self::new(
            ErrorCode::SetupScriptNotFound,
            format!("{script} not found"),
            Some(serde_json::json!({ "searched": searched })),
        )
    }

    pub fn no_candidate_file(dir: &Path) -> Self {
        Self::new(
            ErrorCode::NoCandidateFile,
            "No files found in cwd...",
            Some(serde_json::json!({ "dir": dir })),
        )
    }

    pub fn invalid_pattern(pattern: &str, reason: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::InvalidPattern,
            format!("invalid pattern '{pattern}'"),
            Some(serde_json::json!({ "pattern": pattern, "reason": reason.to_string() })),
        )
    }

    /// Serializable projection for `--json` output.
    #[must_use]
    pub fn to_error_info(&self) -> ErrorInfo {
        ErrorInfo {
            code: self.code.as_str().to_string(),
            message: self.message.clone(),
            context: self.context.clone(),
        }
    }
}

impl Diagnostic for HarnessError {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        Some(Box::new(self.code))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        let hint = match self.code {
            ErrorCode::Spawn => "check that the executable exists and is runnable",
            ErrorCode::SetupScriptNotFound => {
                "place setup_playground.sh next to the harness or in the current directory"
            }
            ErrorCode::NoCandidateFile => "run the harness from a directory containing files",
            ErrorCode::InvalidPattern => "case patterns are regular expressions; escape literals",
            ErrorCode::Io => return None,
        };
        Some(Box::new(hint))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_code_and_message() {
        let err = HarnessError::spawn("failed to spawn ./nope", "No such file");
        assert_eq!(err.to_string(), "E_SPAWN: failed to spawn ./nope");
    }

    #[test]
    fn setup_script_error_lists_searched_dirs() {
        let err = HarnessError::setup_script_not_found(
            "setup_playground.sh",
            &[PathBuf::from("/a"), PathBuf::from("/b")],
        );
        let info = err.to_error_info();
        assert_eq!(info.code, "E_SETUP_SCRIPT");
        assert_eq!(info.message, "setup_playground.sh not found");
        assert_eq!(info.context.unwrap()["searched"][1], "/b");
    }

    #[test]
    fn every_code_has_distinct_wire_form() {
        let codes = [
            ErrorCode::Spawn,
            ErrorCode::Io,
            ErrorCode::SetupScriptNotFound,
            ErrorCode::NoCandidateFile,
            ErrorCode::InvalidPattern,
        ];
        let mut seen: Vec<&str> = codes.iter().map(|code| code.as_str()).collect();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), codes.len());
        assert!(codes.iter().all(|code| code.exit_code() != 0));
    }
}
