//! Command and task execution
//!
//! [`CommandRunner`] is the seam to the outside world: every step, verify and
//! context-loading command goes through it. [`TaskRunner`] applies the task
//! contract on top: executable-step detection, timeouts, failure capture.

mod shell;
mod task;

pub use shell::ShellRunner;
pub use task::{TaskOutcome, TaskRunner, executable_command};

use async_trait::async_trait;
use std::time::Duration;

use crate::error::RunnerError;

/// Result of running one external command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code (-1 when terminated by a signal)
    pub exit_code: i32,

    /// Standard output
    pub stdout: String,

    /// Standard error
    pub stderr: String,

    /// How long the command took
    pub duration_ms: u64,
}

impl CommandOutput {
    /// Check if the command exited with status zero
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Diagnostic text for a failed command: stderr, else stdout, else the exit code
    pub fn failure_detail(&self) -> String {
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            return stderr.to_string();
        }
        let stdout = self.stdout.trim();
        if !stdout.is_empty() {
            return stdout.to_string();
        }
        format!("exit code {}", self.exit_code)
    }
}

/// Runs a command string to completion
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `command`, failing with [`RunnerError::Timeout`] after `timeout`
    async fn run(&self, command: &str, timeout: Duration) -> Result<CommandOutput, RunnerError>;
}
