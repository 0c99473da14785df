//! Raw session log.
//!
//! Every byte read from the pseudo-terminal is appended here before it is
//! matched, so the log is a faithful record of what the shell printed. The
//! file is flushed after each write; a run that fails half way still leaves a
//! complete log for post-mortem inspection and for the final leak check.

use crate::runner::{HarnessError, HarnessResult};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Append-only log of raw child output.
#[derive(Debug)]
pub struct SessionLog {
    file: fs::File,
}

impl SessionLog {
    /// Create (or truncate) the log at `path`.
    pub fn create(path: impl Into<PathBuf>) -> HarnessResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|err| HarnessError::io("failed to create session log dir", err))?;
        }
        let file = fs::File::create(&path)
            .map_err(|err| HarnessError::io("failed to create session log", err))?;
        Ok(Self { file })
    }

    /// Append raw output and flush it to disk.
    pub fn append(&mut self, bytes: &[u8]) -> HarnessResult<()> {
        self.file
            .write_all(bytes)
            .map_err(|err| HarnessError::io("failed to write session log", err))?;
        self.file
            .flush()
            .map_err(|err| HarnessError::io("failed to flush session log", err))
    }
}

/// Read a session log back as text.
///
/// Invalid UTF-8 is replaced rather than rejected; the log holds whatever the
/// shell printed.
pub fn read_log(path: &Path) -> HarnessResult<String> {
    let data =
        fs::read(path).map_err(|err| HarnessError::io("failed to read session log", err))?;
    Ok(String::from_utf8_lossy(&data).into_owned())
}

/// Whether the log at `path` contains `marker`.
pub fn log_contains(path: &Path, marker: &str) -> HarnessResult<bool> {
    Ok(read_log(path)?.contains(marker))
}
