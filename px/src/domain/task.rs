//! Task domain type
//!
//! A Task is the smallest unit of work in a plan: ordered steps plus a
//! verify command whose exit status decides whether the task is accepted.

use serde::{Deserialize, Serialize};

use super::status::TaskStatus;

/// A single numbered task inside a task group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Identifier derived from the declared number (e.g., "task-2")
    pub id: String,

    /// Declared task number
    pub number: u32,

    /// Free-text title
    pub name: String,

    /// Path/scope hint, informational only
    pub context: String,

    /// Ordered step texts
    pub steps: Vec<String>,

    /// Command validating the outcome; empty means trivially satisfied
    pub verify: String,

    /// Current status
    pub status: TaskStatus,

    /// Captured diagnostic text, set only on failure
    pub error: Option<String>,

    /// Zero-based document line of each step, when parsed from text
    #[serde(skip)]
    pub step_lines: Vec<usize>,
}

impl Task {
    /// Create a pending task from its declared number and title
    pub fn new(number: u32, name: impl Into<String>) -> Self {
        Self {
            id: format!("task-{}", number),
            number,
            name: name.into(),
            context: String::new(),
            steps: Vec::new(),
            verify: String::new(),
            status: TaskStatus::Pending,
            error: None,
            step_lines: Vec::new(),
        }
    }

    /// Set the context hint
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    /// Append a step
    pub fn with_step(mut self, step: impl Into<String>) -> Self {
        self.steps.push(step.into());
        self
    }

    /// Set the verify command
    pub fn with_verify(mut self, verify: impl Into<String>) -> Self {
        self.verify = verify.into();
        self
    }

    /// Check if a verify command is present
    pub fn has_verify(&self) -> bool {
        !self.verify.trim().is_empty()
    }

    /// Mark the task failed with captured diagnostics
    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = TaskStatus::Failed;
        self.error = Some(error.into());
    }

    /// Check if the task is in a terminal state
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
