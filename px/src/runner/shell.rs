//! Shell command runner

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::debug;

use super::{CommandOutput, CommandRunner};
use crate::error::RunnerError;

/// Runs commands through `sh -c` in a fixed working directory
#[derive(Debug, Clone)]
pub struct ShellRunner {
    workdir: PathBuf,
}

impl ShellRunner {
    /// Create a runner rooted at the project directory
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }

    /// Working directory for spawned commands
    pub fn workdir(&self) -> &Path {
        &self.workdir
    }
}

#[async_trait]
impl CommandRunner for ShellRunner {
    async fn run(&self, command: &str, timeout: Duration) -> Result<CommandOutput, RunnerError> {
        debug!(%command, ?timeout, workdir = ?self.workdir, "ShellRunner::run: called");
        let start = Instant::now();

        // kill_on_drop terminates the child when the timeout drops the future
        let output = tokio::time::timeout(
            timeout,
            tokio::process::Command::new("sh")
                .arg("-c")
                .arg(command)
                .current_dir(&self.workdir)
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| {
            debug!(%command, "ShellRunner::run: command timed out");
            RunnerError::Timeout(timeout)
        })??;

        let duration_ms = start.elapsed().as_millis() as u64;
        debug!(status = ?output.status, duration_ms, "ShellRunner::run: command completed");

        Ok(CommandOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            duration_ms,
        })
    }
}
