//! Process execution for release-manager.
//!
//! Thin wrappers around [`std::process::Command`] that capture stdout,
//! stderr and the exit code. Shell strings go through `sh -c` (or
//! `cmd /C` on Windows); the working directory is always passed to the
//! child explicitly, never changed for the whole process.
//!
//! # Example
//!
//! ```ignore
//! use release_manager_process::run_shell;
//!
//! let result = run_shell("echo hello").expect("run");
//! assert!(result.success);
//! assert_eq!(result.stdout.trim(), "hello");
//! ```

use std::path::Path;
use std::process::{Command, Output};

use anyhow::{Context, Result};

/// Captured outcome of a finished child process.
#[derive(Debug, Clone)]
pub struct CommandResult {
    /// Exit code 0.
    pub success: bool,
    /// `None` when the child was killed by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl From<Output> for CommandResult {
    fn from(output: Output) -> Self {
        Self {
            success: output.status.success(),
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }
}

/// Run `program` with `args` inside `dir`.
pub fn run_command_in_dir(program: &str, args: &[&str], dir: &Path) -> Result<CommandResult> {
    let output = Command::new(program)
        .args(args)
        .current_dir(dir)
        .output()
        .with_context(|| {
            format!(
                "failed to run command: {} {:?} in {}",
                program,
                args,
                dir.display()
            )
        })?;

    Ok(output.into())
}

/// Run a command string through the platform shell.
pub fn run_shell(command: &str) -> Result<CommandResult> {
    let output = shell_command(command)
        .output()
        .with_context(|| format!("failed to run shell command: {command}"))?;

    Ok(output.into())
}

/// Same as [`run_shell`], with `dir` as the child's working directory.
pub fn run_shell_in_dir(command: &str, dir: &Path) -> Result<CommandResult> {
    let output = shell_command(command)
        .current_dir(dir)
        .output()
        .with_context(|| {
            format!(
                "failed to run shell command: {command} in {}",
                dir.display()
            )
        })?;

    Ok(output.into())
}

#[cfg(windows)]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.args(["/C", command]);
    cmd
}

#[cfg(not(windows))]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.args(["-c", command]);
    cmd
}

/// Whether `program` resolves on `PATH`.
pub fn command_exists(program: &str) -> bool {
    which::which(program).is_ok()
}
