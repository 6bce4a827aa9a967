//! Command runner for the external CLIs
//!
//! Every collaborator (kubectl, kubecfg, kubeless, minikube, kind) is driven
//! through [`run`]:
//! - spawn the program with stdin closed
//! - capture stdout/stderr
//! - report the exit code without judging it

use std::ffi::OsStr;
use std::process::Stdio;

use tokio::process::Command;
use tracing::debug;

/// Errors that prevent a command from producing an exit code at all
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("command not found: {0}")]
    CommandNotFound(String),

    #[error("failed to execute command: {0}")]
    ExecutionFailed(String),
}

/// Captured result of one command invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunResult {
    /// Exit code, `-1` when the process was killed by a signal
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl RunResult {
    /// Whether the command exited with status 0
    pub fn passed(&self) -> bool {
        self.exit_code == 0
    }

    /// Trimmed stdout
    pub fn stdout_trimmed(&self) -> &str {
        self.stdout.trim()
    }

    /// Best human-readable reason for a failure
    pub fn failure_reason(&self) -> String {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            format!("exit code {}", self.exit_code)
        } else {
            format!("exit code {}: {}", self.exit_code, stderr)
        }
    }
}

/// Run a program with arguments and capture its output
pub async fn run<S: AsRef<OsStr>>(program: &str, args: &[S]) -> Result<RunResult, RunnerError> {
    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    debug!(program = %program, args = ?command.as_std().get_args().collect::<Vec<_>>(), "Running command");

    let output = command.output().await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => RunnerError::CommandNotFound(program.to_string()),
        _ => RunnerError::ExecutionFailed(format!("{program}: {e}")),
    })?;

    let result = RunResult {
        exit_code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    };

    debug!(program = %program, exit_code = result.exit_code, "Command finished");
    Ok(result)
}
