//! Status enums shared by tasks, groups and the plan header

use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::str::FromStr;

/// Execution status of a task or a task group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Not started yet
    #[default]
    Pending,
    /// Currently executing
    InProgress,
    /// Finished and verified
    Completed,
    /// A step or verify command failed
    Failed,
    /// Abandoned after a sibling failure
    Skipped,
}

impl TaskStatus {
    /// Check if the status is terminal (no further transitions)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Skipped)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

/// Coarse run state persisted in the plan's `**Status:**` marker
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PlanStatus {
    #[default]
    Draft,
    InProgress,
    Completed,
    Failed,
    /// Any other word an author put in the marker (e.g. `APPROVED`)
    Other(String),
}

impl PlanStatus {
    /// The marker word as written into the document
    pub fn as_marker(&self) -> &str {
        match self {
            Self::Draft => "DRAFT",
            Self::InProgress => "IN_PROGRESS",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Other(word) => word,
        }
    }
}

impl std::fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_marker())
    }
}

impl FromStr for PlanStatus {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let word = s.trim();
        Ok(match word.to_uppercase().as_str() {
            "" | "DRAFT" => Self::Draft,
            "IN_PROGRESS" => Self::InProgress,
            "COMPLETED" => Self::Completed,
            "FAILED" => Self::Failed,
            _ => Self::Other(word.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_status_display() {
        assert_eq!(TaskStatus::Pending.to_string(), "pending");
        assert_eq!(TaskStatus::InProgress.to_string(), "in_progress");
        assert_eq!(TaskStatus::Skipped.to_string(), "skipped");
    }

    #[test]
    fn test_task_status_terminal() {
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(!TaskStatus::InProgress.is_terminal());
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(TaskStatus::Skipped.is_terminal());
    }

    #[test]
    fn test_task_status_serde() {
        let json = serde_json::to_string(&TaskStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
    }

    #[test]
    fn test_plan_status_from_str() {
        assert_eq!("DRAFT".parse::<PlanStatus>().unwrap(), PlanStatus::Draft);
        assert_eq!("in_progress".parse::<PlanStatus>().unwrap(), PlanStatus::InProgress);
        assert_eq!("COMPLETED".parse::<PlanStatus>().unwrap(), PlanStatus::Completed);
        assert_eq!(
            "APPROVED".parse::<PlanStatus>().unwrap(),
            PlanStatus::Other("APPROVED".to_string())
        );
    }

    #[test]
    fn test_plan_status_marker() {
        assert_eq!(PlanStatus::InProgress.as_marker(), "IN_PROGRESS");
        assert_eq!(PlanStatus::Other("Review".to_string()).to_string(), "Review");
    }
}
