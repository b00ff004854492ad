//! Task execution
//!
//! Runs the executable steps of a task and then its verify command. Every
//! command goes through the shared [`CommandRunner`]; cancellation is checked
//! before each command starts, never while one is in flight.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::CommandRunner;
use crate::config::ExecutionConfig;
use crate::domain::{Task, TaskStatus};
use crate::error::{PlanError, RunnerError};
use crate::events::ExecutionLog;

/// How a single task run ended
#[derive(Debug)]
pub enum TaskOutcome {
    /// All executable steps and the verify command succeeded
    Completed,

    /// A step or the verify command failed
    Failed(PlanError),

    /// Cancellation was observed before the next command started
    Cancelled,
}

/// Return the command to execute for a step, or None if the step is documentation only
///
/// A step is executable when it starts with `$` (stripped) or when its first
/// word is a configured prefix, optionally followed by version characters
/// (`python3`, `python3.12`).
pub fn executable_command<'a>(step: &'a str, prefixes: &[String]) -> Option<&'a str> {
    let step = step.trim();
    if let Some(rest) = step.strip_prefix('$') {
        let rest = rest.trim_start();
        return (!rest.is_empty()).then_some(rest);
    }

    let word = step.split_whitespace().next()?;
    let matched = prefixes
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty() && *p != "$")
        .any(|prefix| {
            word.strip_prefix(prefix)
                .is_some_and(|rest| rest.chars().all(|c| c.is_ascii_digit() || c == '.'))
        });

    matched.then_some(step)
}

/// Which part of a task a command belongs to
#[derive(Debug, Clone, Copy)]
enum Phase {
    Step,
    Verify,
}

/// Executes tasks one at a time against a command runner
pub struct TaskRunner {
    runner: Arc<dyn CommandRunner>,
    prefixes: Vec<String>,
    timeout: Duration,
    log: Arc<ExecutionLog>,
}

impl TaskRunner {
    /// Create a task runner from execution settings
    pub fn new(runner: Arc<dyn CommandRunner>, config: &ExecutionConfig, log: Arc<ExecutionLog>) -> Self {
        Self {
            runner,
            prefixes: config.command_prefixes.clone(),
            timeout: config.command_timeout(),
            log,
        }
    }

    /// Execution log shared with the scheduler
    pub fn log(&self) -> &ExecutionLog {
        &self.log
    }

    /// Run one task to a terminal state, or back to pending when cancelled
    ///
    /// On failure `task.error` holds the captured diagnostic and the returned
    /// error names the failing command.
    pub async fn run_task(&self, task: &mut Task, cancel: &CancellationToken) -> TaskOutcome {
        debug!(task = %task.id, name = %task.name, "TaskRunner::run_task: called");
        if cancel.is_cancelled() {
            debug!(task = %task.id, "TaskRunner::run_task: cancelled before start");
            return TaskOutcome::Cancelled;
        }

        self.log.info(format!("  Task: {}", task.name));
        task.status = TaskStatus::InProgress;
        task.error = None;

        if !task.context.is_empty() {
            self.log.detail(format!("    Context: {}", task.context));
        }

        let steps = task.steps.clone();
        for step in &steps {
            self.log.detail(format!("    Step: {}", step));
            let Some(command) = executable_command(step, &self.prefixes) else {
                debug!(%step, "TaskRunner::run_task: documentation-only step");
                continue;
            };
            if let Err(outcome) = self.run_command(task, command, Phase::Step, cancel).await {
                return outcome;
            }
        }

        if task.has_verify() {
            let verify = task.verify.trim().to_string();
            self.log.detail(format!("    Verify: {}", verify));
            if let Err(outcome) = self.run_command(task, &verify, Phase::Verify, cancel).await {
                return outcome;
            }
        }

        task.status = TaskStatus::Completed;
        self.log.success(format!("    Task completed: {}", task.name));
        info!(task = %task.id, "TaskRunner::run_task: task completed");
        TaskOutcome::Completed
    }

    async fn run_command(
        &self,
        task: &mut Task,
        command: &str,
        phase: Phase,
        cancel: &CancellationToken,
    ) -> Result<(), TaskOutcome> {
        debug!(task = %task.id, %command, ?phase, "TaskRunner::run_command: called");
        let result = if cancel.is_cancelled() {
            Err(RunnerError::Cancelled)
        } else {
            self.runner.run(command, self.timeout).await
        };

        let detail = match result {
            Ok(output) if output.success() => return Ok(()),
            Ok(output) => output.failure_detail(),
            Err(RunnerError::Cancelled) => {
                debug!(task = %task.id, "TaskRunner::run_command: cancelled between commands");
                task.status = TaskStatus::Pending;
                return Err(TaskOutcome::Cancelled);
            }
            Err(e) => e.to_string(),
        };

        warn!(task = %task.id, %command, %detail, ?phase, "TaskRunner::run_command: command failed");
        task.fail(detail.clone());

        let error = match phase {
            Phase::Step => {
                self.log.error(format!("    Step failed: {}", detail));
                PlanError::StepFailed {
                    task: task.name.clone(),
                    command: command.to_string(),
                    detail,
                }
            }
            Phase::Verify => {
                self.log.error(format!("    Verification failed: {}", detail));
                PlanError::VerifyFailed {
                    task: task.name.clone(),
                    command: command.to_string(),
                    detail,
                }
            }
        };
        Err(TaskOutcome::Failed(error))
    }
}
