//! PTY session management for driving the shell under test.
//!
//! This module provides [`Session`], which owns a child process attached to a
//! pseudo-terminal and exposes the request/response primitives the runner is
//! built from.
//!
//! # Key Operations
//!
//! - [`Session::spawn`] - Create a PTY, launch the executable, open the session log
//! - [`Session::send_line`] - Type a line as a user would
//! - [`Session::expect`] - Block until a pattern appears, the timeout passes, or output closes
//! - [`Session::expect_eof`] - Block until output closes
//! - [`Session::close`] - Reap the child and report its exit code
//!
//! # Example
//!
//! ```no_run
//! use shellgrade::matcher::Pattern;
//! use shellgrade::session::{Session, SessionConfig};
//! use std::time::Duration;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut session = Session::spawn(SessionConfig::new("/bin/cat", "/tmp/cat_test.log"))?;
//! session.send_line("hello")?;
//! let echoed = session.expect(&Pattern::new(r"\r\n")?, Duration::from_secs(1))?;
//! assert_eq!(echoed.before, "hello");
//! let report = session.close(Duration::from_millis(500))?;
//! # Ok(())
//! # }
//! ```
//!
//! `expect` is the only blocking call. The master side of the PTY is
//! non-blocking and polled with short sleeps, so every wait is bounded by its
//! timeout.

use crate::matcher::{search, MatchResult, Pattern};
use crate::model::TerminalSize;
use crate::runner::{HarnessError, HarnessResult};
use crate::transcript::SessionLog;
#[cfg(unix)]
use nix::fcntl::{fcntl, FcntlArg, OFlag};
#[cfg(unix)]
use nix::sys::signal::{killpg, Signal};
#[cfg(unix)]
use nix::unistd::Pid;
use portable_pty::{native_pty_system, CommandBuilder, PtySize};
use std::io::{ErrorKind, Read, Write};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Size of a single read from the PTY master.
const READ_CHUNK: usize = 4096;
/// Sleep between polls of the non-blocking master.
const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Why an `expect` call returned without a match.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ExpectError {
    /// The pattern did not appear before the deadline.
    #[error("timed out after {waited_ms}ms waiting for '{pattern}'")]
    Timeout {
        /// Pattern that was awaited.
        pattern: String,
        /// How long the call waited.
        waited_ms: u64,
        /// Unconsumed text at the deadline.
        before: String,
    },
    /// The child's output closed before the pattern appeared.
    #[error("output closed while waiting for '{pattern}'")]
    EndOfStream {
        /// Pattern that was awaited.
        pattern: String,
        /// Unconsumed text when the stream closed.
        before: String,
    },
}

impl ExpectError {
    /// Text that was buffered but not consumed when the call gave up.
    #[must_use]
    pub fn before(&self) -> &str {
        match self {
            Self::Timeout { before, .. } | Self::EndOfStream { before, .. } => before,
        }
    }

    /// True for the timeout variant.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// How the child ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExitReport {
    /// Exit code once reaped; `None` if it never could be.
    pub exit_code: Option<u32>,
    /// The child had to be killed because it did not exit within the grace period.
    pub did_not_exit: bool,
}

impl ExitReport {
    /// Exit code is exactly zero and the child left on its own.
    #[must_use]
    pub fn success(&self) -> bool {
        !self.did_not_exit && self.exit_code == Some(0)
    }
}

/// Configuration for spawning a session.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Executable to launch.
    pub command: String,
    /// Command arguments.
    pub args: Vec<String>,
    /// Working directory; inherits the harness's when `None`.
    pub cwd: Option<PathBuf>,
    /// Extra environment variables.
    pub env: Vec<(String, String)>,
    /// Initial terminal size.
    pub size: TerminalSize,
    /// Where raw output is mirrored.
    pub log_path: PathBuf,
    /// Appended to every line sent.
    pub line_terminator: String,
}

impl SessionConfig {
    /// Config with default size, no arguments and a `\n` line terminator.
    pub fn new(command: impl Into<String>, log_path: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            cwd: None,
            env: Vec::new(),
            size: TerminalSize::default(),
            log_path: log_path.into(),
            line_terminator: "\n".to_string(),
        }
    }

    /// Replace the argument list.
    #[must_use]
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    /// Add an environment variable.
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Run the child in `dir`.
    #[must_use]
    pub fn with_cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }
}

/// A PTY-backed child process plus its unconsumed output.
pub struct Session {
    command: String,
    // Held so the master end stays open for the session's lifetime.
    _master: Box<dyn portable_pty::MasterPty + Send>,
    writer: Box<dyn Write + Send>,
    reader: Box<dyn Read + Send>,
    child: Box<dyn portable_pty::Child + Send + Sync>,
    log: SessionLog,
    buffer: Vec<u8>,
    // Everything read so far, consumed or not.
    history: Vec<u8>,
    eof: bool,
    line_terminator: String,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("command", &self.command)
            .field("pid", &self.child.process_id())
            .field("buffered", &self.buffer.len())
            .field("eof", &self.eof)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Spawn `config.command` on a fresh pseudo-terminal.
    ///
    /// # Errors
    /// - `E_SPAWN`: the PTY could not be opened or the command could not be launched
    /// - `E_IO`: the session log could not be created or the PTY could not be configured
    pub fn spawn(config: SessionConfig) -> HarnessResult<Self> {
        let log = SessionLog::create(&config.log_path)?;

        let system = native_pty_system();
        let pair = system
            .openpty(PtySize {
                rows: config.size.rows,
                cols: config.size.cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|err| HarnessError::spawn("failed to open pty", err))?;

        let mut cmd = CommandBuilder::new(&config.command);
        cmd.args(&config.args);
        // portable-pty falls back to $HOME, not the caller's directory.
        let cwd = match &config.cwd {
            Some(cwd) => cwd.clone(),
            None => std::env::current_dir()
                .map_err(|err| HarnessError::io("failed to read current directory", err))?,
        };
        cmd.cwd(cwd.as_os_str());
        for (key, value) in &config.env {
            cmd.env(key, value);
        }

        let child = pair.slave.spawn_command(cmd).map_err(|err| {
            HarnessError::spawn(format!("failed to spawn {}", config.command), err)
        })?;
        // The child holds its own copy of the slave; dropping ours lets EOF reach us.
        drop(pair.slave);

        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|err| HarnessError::io("failed to clone pty reader", err))?;
        let writer = pair
            .master
            .take_writer()
            .map_err(|err| HarnessError::io("failed to take pty writer", err))?;

        #[cfg(unix)]
        {
            if let Some(fd) = pair.master.as_raw_fd() {
                let flags = OFlag::from_bits_truncate(
                    fcntl(fd, FcntlArg::F_GETFL)
                        .map_err(|err| HarnessError::io("failed to get fd flags", err))?,
                );
                fcntl(fd, FcntlArg::F_SETFL(flags | OFlag::O_NONBLOCK))
                    .map_err(|err| HarnessError::io("failed to set nonblocking", err))?;
            }
        }

        debug!(command = %config.command, pid = ?child.process_id(), "spawned shell");

        Ok(Self {
            command: config.command,
            _master: pair.master,
            writer,
            reader,
            child,
            log,
            buffer: Vec::new(),
            history: Vec::new(),
            eof: false,
            line_terminator: config.line_terminator,
        })
    }

    /// Write `text` plus the line terminator, as if typed.
    ///
    /// # Errors
    /// - `E_IO`: the PTY refused the write
    pub fn send_line(&mut self, text: &str) -> HarnessResult<()> {
        debug!(line = %text.escape_debug(), "send");
        self.writer
            .write_all(text.as_bytes())
            .and_then(|()| self.writer.write_all(self.line_terminator.as_bytes()))
            .map_err(|err| HarnessError::io("failed to write line", err))?;
        self.writer
            .flush()
            .map_err(|err| HarnessError::io("failed to flush line", err))
    }

    /// Wait for `pattern` to appear in the unconsumed output.
    ///
    /// On success everything through the end of the match is consumed. On
    /// failure nothing is consumed and the error carries the buffered text.
    pub fn expect(
        &mut self,
        pattern: &Pattern,
        timeout: Duration,
    ) -> Result<MatchResult, ExpectError> {
        let started = Instant::now();
        let deadline = started + timeout;
        loop {
            let result = search(&self.buffer, pattern);
            if result.matched {
                self.buffer.drain(..result.consumed_len());
                debug!(pattern = %pattern, matched = %result.matched_text.escape_debug(), "match");
                return Ok(result);
            }
            if self.eof {
                return Err(ExpectError::EndOfStream {
                    pattern: pattern.as_str().to_string(),
                    before: self.buffered_text(),
                });
            }
            if Instant::now() >= deadline {
                return Err(ExpectError::Timeout {
                    pattern: pattern.as_str().to_string(),
                    waited_ms: elapsed_ms(started),
                    before: self.buffered_text(),
                });
            }
            if !self.fill_buffer() {
                std::thread::sleep(POLL_INTERVAL);
            }
        }
    }

    /// Wait for the child's output to close, consuming everything buffered.
    pub fn expect_eof(&mut self, timeout: Duration) -> Result<String, ExpectError> {
        let started = Instant::now();
        let deadline = started + timeout;
        while !self.eof {
            if Instant::now() >= deadline {
                return Err(ExpectError::Timeout {
                    pattern: "<EOF>".to_string(),
                    waited_ms: elapsed_ms(started),
                    before: self.buffered_text(),
                });
            }
            if !self.fill_buffer() {
                std::thread::sleep(POLL_INTERVAL);
            }
        }
        let rest = self.buffered_text();
        self.buffer.clear();
        Ok(rest)
    }

    /// Read whatever is available into the buffer.
    ///
    /// Returns `true` if any bytes arrived. A zero-length read, `EIO` (what
    /// Linux reports once the slave side is gone) or any other hard read error
    /// marks the stream closed.
    fn fill_buffer(&mut self) -> bool {
        let mut chunk = [0u8; READ_CHUNK];
        match self.reader.read(&mut chunk) {
            Ok(0) => {
                self.mark_eof("read returned 0");
                false
            }
            Ok(count) => {
                let bytes = chunk.get(..count).unwrap_or_default();
                if let Err(err) = self.log.append(bytes) {
                    warn!(error = %err, "session log write failed");
                }
                self.buffer.extend_from_slice(bytes);
                self.history.extend_from_slice(bytes);
                debug!(bytes = count, "read");
                true
            }
            Err(err) if err.kind() == ErrorKind::WouldBlock || err.kind() == ErrorKind::Interrupted => {
                false
            }
            Err(err) => {
                #[cfg(unix)]
                if err.raw_os_error() == Some(nix::errno::Errno::EIO as i32) {
                    self.mark_eof("EIO");
                    return false;
                }
                warn!(error = %err, "pty read failed; treating as end of output");
                self.mark_eof("read error");
                false
            }
        }
    }

    fn mark_eof(&mut self, reason: &str) {
        if !self.eof {
            debug!(reason, "end of output");
        }
        self.eof = true;
    }

    fn buffered_text(&self) -> String {
        String::from_utf8_lossy(&self.buffer).into_owned()
    }

    /// Everything the child has printed so far, as lossy UTF-8.
    ///
    /// Unlike the session log this never touches the filesystem, so it stays
    /// available when the log file is removed or unreadable.
    #[must_use]
    pub fn output(&self) -> String {
        String::from_utf8_lossy(&self.history).into_owned()
    }

    /// Wait up to `timeout` for the child to exit.
    ///
    /// # Errors
    /// - `E_IO`: the process status could not be queried
    pub fn wait_for_exit(
        &mut self,
        timeout: Duration,
    ) -> HarnessResult<Option<portable_pty::ExitStatus>> {
        let deadline = Instant::now() + timeout;
        loop {
            match self.child.try_wait() {
                Ok(Some(status)) => return Ok(Some(status)),
                Ok(None) => {
                    if Instant::now() >= deadline {
                        return Ok(None);
                    }
                    std::thread::sleep(Duration::from_millis(10));
                }
                Err(err) => return Err(HarnessError::io("failed to wait for child", err)),
            }
        }
    }

    /// Reap the child, killing it if it does not exit within `grace`.
    ///
    /// The session is consumed; the PTY is closed when it drops.
    ///
    /// # Errors
    /// - `E_IO`: the process could not be waited on or signalled
    pub fn close(mut self, grace: Duration) -> HarnessResult<ExitReport> {
        if let Some(status) = self.wait_for_exit(grace)? {
            debug!(exit_code = status.exit_code(), "child exited");
            return Ok(ExitReport {
                exit_code: Some(status.exit_code()),
                did_not_exit: false,
            });
        }
        warn!(command = %self.command, "child did not exit; terminating process group");
        let status = self.terminate_process_group(grace)?;
        Ok(ExitReport {
            exit_code: status.map(|status| status.exit_code()),
            did_not_exit: true,
        })
    }

    /// SIGTERM the process group, falling back to SIGKILL after `grace`.
    ///
    /// # Errors
    /// - `E_IO`: failed to signal or wait for the process
    pub fn terminate_process_group(
        &mut self,
        grace: Duration,
    ) -> HarnessResult<Option<portable_pty::ExitStatus>> {
        #[cfg(unix)]
        if let Some(pid) = self.child.process_id() {
            // Process IDs are always positive and fit in i32
            #[allow(clippy::cast_possible_wrap)]
            let pgid = Pid::from_raw(pid as i32);
            signal_process_group(pgid, Signal::SIGTERM)?;
            if let Some(status) = self.wait_for_exit(grace)? {
                return Ok(Some(status));
            }
            signal_process_group(pgid, Signal::SIGKILL)?;
            return self.wait_for_exit(Duration::from_millis(200));
        }

        self.child
            .kill()
            .map_err(|err| HarnessError::io("failed to kill child", err))?;
        self.wait_for_exit(grace)
    }

    /// Best-effort cleanup used by `Drop`; errors are ignored.
    fn cleanup_process_best_effort(&mut self) {
        if self.child.try_wait().ok().flatten().is_some() {
            return;
        }
        let _ = self.writer.flush();

        #[cfg(unix)]
        if let Some(pid) = self.child.process_id() {
            #[allow(clippy::cast_possible_wrap)]
            let pgid = Pid::from_raw(pid as i32);
            let _ = signal_process_group(pgid, Signal::SIGTERM);

            let deadline = Instant::now() + Duration::from_millis(100);
            while Instant::now() < deadline {
                if self.child.try_wait().ok().flatten().is_some() {
                    return;
                }
                std::thread::sleep(POLL_INTERVAL);
            }
            let _ = signal_process_group(pgid, Signal::SIGKILL);
        }

        #[cfg(not(unix))]
        {
            let _ = self.child.kill();
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.cleanup_process_best_effort();
    }
}

#[cfg(unix)]
fn signal_process_group(pgid: Pid, signal: Signal) -> HarnessResult<()> {
    match killpg(pgid, signal) {
        // ESRCH means process already gone, which is fine
        Ok(()) | Err(nix::errno::Errno::ESRCH) => Ok(()),
        Err(err) => Err(HarnessError::io("failed to signal process group", err)),
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
