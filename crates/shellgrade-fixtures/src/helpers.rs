//! Common test helper functions.
//!
//! These utilities reduce boilerplate in integration tests by providing
//! standard implementations for temp directories and a grading workspace.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Name of the fake shell binary built by this crate.
pub const FAKE_SHELL_BIN: &str = "shellgrade-fake-shell";

static TEMP_DIR_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Create a unique temporary directory for a test.
///
/// The name combines the prefix, process id, a timestamp and a per-process
/// counter, so parallel tests never collide. The directory is created
/// immediately.
///
/// # Panics
///
/// Panics if the directory cannot be created.
#[must_use]
pub fn temp_dir(prefix: &str) -> PathBuf {
    let mut dir = std::env::temp_dir();
    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    let sequence = TEMP_DIR_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    dir.push(format!(
        "shellgrade-{prefix}-{}-{stamp}-{sequence}",
        std::process::id()
    ));

    #[allow(clippy::expect_used)]
    fs::create_dir_all(&dir).expect("failed to create temp directory");

    dir
}

/// Write an executable `setup_playground.sh` into `dir` and return its path.
///
/// The script builds a small `Plaid Shell Playground` directory and prints
/// the confirmation line graders look for.
///
/// # Panics
///
/// Panics if the script cannot be written.
pub fn write_setup_script(dir: &Path) -> PathBuf {
    let path = dir.join("setup_playground.sh");
    let script = "#!/bin/sh\n\
        mkdir -p \"Plaid Shell Playground\"\n\
        echo \"Plaid Shell playground created...\"\n";

    #[allow(clippy::expect_used)]
    fs::write(&path, script).expect("failed to write setup script");

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        #[allow(clippy::expect_used)]
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755))
            .expect("failed to mark setup script executable");
    }

    path
}

/// Create a directory laid out the way a grading run expects.
///
/// It holds the setup script and one visible file, so environment discovery
/// succeeds when the harness runs with this directory as its working
/// directory.
///
/// # Panics
///
/// Panics if any file cannot be written.
#[must_use]
pub fn grading_workspace(prefix: &str) -> PathBuf {
    let dir = temp_dir(prefix);
    write_setup_script(&dir);

    #[allow(clippy::expect_used)]
    fs::write(dir.join("README"), "fixture workspace\n").expect("failed to write README");

    dir
}

/// Path of a binary that sits next to `sibling`, typically another
/// `CARGO_BIN_EXE_*` of the same workspace build.
///
/// # Panics
///
/// Panics if the binary has not been built.
#[must_use]
pub fn sibling_binary(sibling: &str, name: &str) -> PathBuf {
    let path = Path::new(sibling)
        .parent()
        .map(|dir| dir.join(name))
        .unwrap_or_else(|| PathBuf::from(name));
    assert!(
        path.exists(),
        "Fixture binary not found: {}. Run 'cargo build --workspace' first.",
        path.display()
    );
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temp_dir_creates_unique_directories() {
        let dir1 = temp_dir("test");
        let dir2 = temp_dir("test");

        assert!(dir1.exists());
        assert!(dir2.exists());
        assert_ne!(dir1, dir2);

        let _ = fs::remove_dir_all(&dir1);
        let _ = fs::remove_dir_all(&dir2);
    }

    #[test]
    fn temp_dir_includes_prefix() {
        let dir = temp_dir("myprefix");
        let name = dir.file_name().unwrap().to_string_lossy().into_owned();

        assert!(name.contains("myprefix"));
        assert!(name.starts_with("shellgrade-"));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn grading_workspace_has_script_and_visible_file() {
        let dir = grading_workspace("layout");
        assert!(dir.join("setup_playground.sh").is_file());
        assert!(dir.join("README").is_file());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(dir.join("setup_playground.sh"))
                .unwrap()
                .permissions()
                .mode();
            assert_eq!(mode & 0o111, 0o111);
        }

        let _ = fs::remove_dir_all(&dir);
    }
}
