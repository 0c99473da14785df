//! The fixed conversation a shell under test is graded against.
//!
//! A handful of expected strings depend on where the harness runs (the
//! working directory, `HOME`, `PATH`, a file that exists in the working
//! directory). [`ScenarioEnv::discover`] gathers those once; the case table is
//! then a pure function of it.

use crate::model::TestCase;
use crate::runner::{HarnessError, HarnessResult};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Script that builds the playground directory the later cases explore.
pub const SETUP_SCRIPT_NAME: &str = "setup_playground.sh";

/// System-wide fallback location for the setup script.
pub const SYSTEM_SETUP_DIR: &str = "/var/local/isse-12";

/// Environment values the case table is parameterized by.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScenarioEnv {
    /// Working directory the shell starts in.
    pub initial_cwd: String,
    /// `HOME` of the harness process.
    pub home: String,
    /// `PATH` of the harness process.
    pub path: String,
    /// Absolute path of the setup script.
    pub setup_script: String,
    /// Some non-hidden entry of the working directory.
    pub a_file: String,
}

impl ScenarioEnv {
    /// Inspect the running process's environment.
    ///
    /// # Errors
    /// - `E_SETUP_SCRIPT`: no candidate directory holds the setup script
    /// - `E_NO_CANDIDATE_FILE`: the working directory has no visible entry
    /// - `E_IO`: the working directory cannot be read
    pub fn discover() -> HarnessResult<Self> {
        let cwd = env::current_dir()
            .map_err(|err| HarnessError::io("failed to read current directory", err))?;
        let setup_script = locate_setup_script(&default_candidate_dirs(&cwd))?;
        let a_file = first_visible_entry(&cwd)?;
        let scenario_env = Self {
            initial_cwd: cwd.to_string_lossy().into_owned(),
            home: env::var("HOME").unwrap_or_default(),
            path: env::var("PATH").unwrap_or_default(),
            setup_script: setup_script.to_string_lossy().into_owned(),
            a_file,
        };
        debug!(
            cwd = %scenario_env.initial_cwd,
            setup_script = %scenario_env.setup_script,
            a_file = %scenario_env.a_file,
            "scenario environment"
        );
        Ok(scenario_env)
    }
}

/// Directories searched for the setup script, in order: next to the harness
/// binary, the working directory, then the system location.
#[must_use]
pub fn default_candidate_dirs(cwd: &Path) -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    if let Some(exe_dir) = env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        dirs.push(exe_dir);
    }
    dirs.push(cwd.to_path_buf());
    dirs.push(PathBuf::from(SYSTEM_SETUP_DIR));
    dirs
}

/// First `dirs` entry containing the setup script, resolved to an absolute path.
pub fn locate_setup_script(dirs: &[PathBuf]) -> HarnessResult<PathBuf> {
    dirs.iter()
        .map(|dir| dir.join(SETUP_SCRIPT_NAME))
        .find(|candidate| candidate.is_file())
        .map(|found| fs::canonicalize(&found).unwrap_or(found))
        .ok_or_else(|| HarnessError::setup_script_not_found(SETUP_SCRIPT_NAME, dirs))
}

/// First entry of `dir` whose name does not start with `.`.
pub fn first_visible_entry(dir: &Path) -> HarnessResult<String> {
    let entries =
        fs::read_dir(dir).map_err(|err| HarnessError::io("failed to list directory", err))?;
    entries
        .filter_map(Result::ok)
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .find(|name| !name.starts_with('.'))
        .ok_or_else(|| HarnessError::no_candidate_file(dir))
}

/// The plaid shell conversation: input, expected pattern, strictness, points.
///
/// Environment values are regex-escaped before they become patterns, so a
/// working directory containing `+` or `(` still matches itself.
#[must_use]
#[allow(clippy::too_many_lines)]
pub fn plaid_shell_cases(scenario_env: &ScenarioEnv) -> Vec<TestCase> {
    let cwd = regex::escape(&scenario_env.initial_cwd);
    let home = regex::escape(&scenario_env.home);
    let path = regex::escape(&scenario_env.path);
    let a_file = regex::escape(&scenario_env.a_file);
    let playground = format!(
        "{}/Plaid Shell Playground",
        regex::escape(&scenario_env.initial_cwd)
    );

    let table: Vec<(String, String, bool, u32)> = vec![
        // blank lines
        case("", "", true, 1),
        case("    ", "", true, 1),
        case("  \\  ", "Command not found|No such file", false, 1),
        // walking into the playground
        case("pwd", &cwd, true, 1),
        case("ls --color", &a_file, false, 1),
        case(
            &scenario_env.setup_script,
            "Plaid Shell playground created",
            true,
            1,
        ),
        case(r"cd Plaid\ Shell\ Playground", "", true, 1),
        case("pwd", &playground, true, 1),
        case(
            "ls",
            "README +'best sitcoms.txt'[ \t]+'seven dwarfs.txt'[ \t]+shells.txt",
            true,
            1,
        ),
        case(
            "ls *.txt",
            "'best sitcoms.txt'[ \t]+'seven dwarfs.txt'[ \t]+shells.txt",
            true,
            1,
        ),
        case("echo $PATH", r"\$PATH", true, 1),
        case("author", "", false, 1),
        case("author | sed -e \"s/^/Written by /\"", "Written by ", false, 1),
        case(
            "grep Happy *.txt",
            "best sitcoms.txt:Happy Days.*seven dwarfs.txt:Happy",
            true,
            1,
        ),
        case("cat \"best sitcoms.txt\" | grep Seinfeld", "Seinfeld", true, 1),
        case("cat \"best sitcoms.txt\"|grep Seinfeld|wc -l", "1", true, 1),
        case(
            "sed -ne \"s/The Simpsons/I Love Lucy/p\" < best\\ sitcoms.txt > output",
            "",
            true,
            2,
        ),
        case("ls -l", "output", false, 1),
        case("cat output", "I Love Lucy", true, 1),
        case(
            "this is not a command",
            "Command not found|No such file",
            false,
            2,
        ),
        case("echo Hello > /usr/bin/cant_write", "Permission denied", true, 2),
        // cd and home
        case("cd", "", true, 1),
        case("pwd", &home, true, 2),
        case(&format!("cd {}", scenario_env.initial_cwd), "", true, 1),
        case("pwd", &cwd, true, 1),
        case("cd ~", "", true, 1),
        case("pwd", &home, true, 2),
        // history recall with the up arrow
        case(
            "echo \"Operator could you help me place this call?\"",
            r"Operator could you help me place this call\?",
            true,
            1,
        ),
        case("seq 10 | wc\"-l\"", "10", true, 1),
        case(
            "\x1b[A\x1b[A",
            r"Operator could you help me place this call\?",
            true,
            2,
        ),
        // quoting, escapes and malformed pipelines
        case("env\t|grep PATH", &path, true, 2),
        case(
            "echo Hello World | cat -n | cat -n | cat -n",
            "1[ \t]+1[ \t]+1[ \t]+Hello World",
            true,
            2,
        ),
        case("echo \\c", "Illegal escape character '?c'?", true, 2),
        case("echo \"\\c\"", "Illegal escape character '?c'?", true, 1),
        case("echo \"hi", "Unterminated quote", true, 2),
        case(
            "echo \"|1|2|3|\" | sed -e \"s/[0-9]//g\"",
            r"\|\|\|\|",
            true,
            1,
        ),
        case(
            "printf \"=%s=\\n\" one two three four five six seven eight nine ten \
             eleven twelve thirteen fourteen fifteen sixteen seventeen eighteen \
             nineteen twenty twenty-one twenty-two twenty-three twenty-four|wc -l",
            "24",
            true,
            2,
        ),
        case(
            "printf\"+%s\"one\"two\"three\n",
            r"\+one\+two\+three",
            true,
            2,
        ),
        case("echo > file1 >file2", "Multiple redirection", true, 1),
        case("cat <", "Expect filename after", false, 1),
        case("cat | cat | cat >", "Expect filename after", false, 1),
        case("grep | ", "No command (specified|found)", true, 1),
        case("| grep", "No command (specified|found)", true, 1),
        case("echo || grep", "No command (specified|found)", true, 1),
        case("echo \\<\\|\\> | cat", r"<\|>", true, 1),
        case("echo hello\\|grep ell", r"hello\|grep ell", true, 1),
    ];

    table
        .into_iter()
        .map(|(input, pattern, strict, points)| TestCase::new(input, pattern, strict, points))
        .collect()
}

fn case(input: &str, pattern: &str, strict: bool, points: u32) -> (String, String, bool, u32) {
    (input.to_string(), pattern.to_string(), strict, points)
}
