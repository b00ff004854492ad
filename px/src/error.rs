//! Error types for parsing and executing plans

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// A structural problem found while parsing plan text
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("no Tasks section found")]
    MissingTasks,

    #[error("line {line}: {reason}")]
    Invalid {
        /// One-based line number
        line: usize,
        reason: String,
    },
}

impl ParseError {
    /// Create an error at a zero-based line index
    pub fn at(index: usize, reason: impl Into<String>) -> Self {
        ParseError::Invalid {
            line: index + 1,
            reason: reason.into(),
        }
    }
}

/// Errors that abort a plan run
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("Plan not found: {}", .0.display())]
    PlanNotFound(PathBuf),

    #[error("Plan already exists: {}", .0.display())]
    PlanExists(PathBuf),

    #[error("Malformed plan {}: {reason}", .path.display())]
    MalformedPlan { path: PathBuf, reason: String },

    #[error("Step failed in {task}: `{command}`: {detail}")]
    StepFailed {
        task: String,
        command: String,
        detail: String,
    },

    #[error("Verification failed in {task}: `{command}`: {detail}")]
    VerifyFailed {
        task: String,
        command: String,
        detail: String,
    },

    #[error("No ready groups found - unmet dependencies for: {}", .pending.join(", "))]
    UnmetDependency { pending: Vec<String> },

    #[error("Possible circular dependency: {detail}")]
    CircularDependency { detail: String },

    #[error("Worker for group {group} panicked: {detail}")]
    WorkerPanicked { group: String, detail: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PlanError {
    /// Wrap a parse error with the plan path it came from
    pub fn malformed(path: impl Into<PathBuf>, err: ParseError) -> Self {
        PlanError::MalformedPlan {
            path: path.into(),
            reason: err.to_string(),
        }
    }

    /// Check if this error was raised before any execution started
    pub fn is_load_error(&self) -> bool {
        matches!(self, PlanError::PlanNotFound(_) | PlanError::MalformedPlan { .. })
    }
}

/// Errors from running a single external command
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("Failed to execute command: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("cancelled before start")]
    Cancelled,
}
