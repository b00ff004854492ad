//! Run report and plan summary

use crate::domain::{PlanDocument, PlanStatus, TaskStatus};
use crate::error::PlanError;
use crate::events::LogEntry;

const RULE_WIDTH: usize = 60;

/// Outcome of one plan run
#[derive(Debug)]
pub struct RunReport {
    /// True when every group completed (or the run was a dry run)
    pub success: bool,

    /// Groups that reached `completed`, in document order
    pub completed_groups: Vec<String>,

    /// Groups that ended `failed`, in document order
    pub failed_groups: Vec<String>,

    /// The error that aborted the run
    pub error: Option<PlanError>,

    /// Plan status after the run
    pub final_status: PlanStatus,

    /// Execution log entries recorded during the run
    pub log: Vec<LogEntry>,
}

impl RunReport {
    /// Build a report from the document state after a run
    pub fn from_document(doc: &PlanDocument, error: Option<PlanError>, log: Vec<LogEntry>) -> Self {
        let names_with = |status: TaskStatus| {
            doc.groups
                .iter()
                .filter(|g| g.status == status)
                .map(|g| g.name.clone())
                .collect::<Vec<_>>()
        };

        Self {
            success: error.is_none(),
            completed_groups: names_with(TaskStatus::Completed),
            failed_groups: names_with(TaskStatus::Failed),
            error,
            final_status: doc.specification.status.clone(),
            log,
        }
    }

    /// Process exit code for this report
    pub fn exit_code(&self) -> u8 {
        if self.success { 0 } else { 1 }
    }
}

/// Human-readable plan summary printed before execution
pub fn summary(doc: &PlanDocument) -> String {
    let spec = &doc.specification;
    let rule = "=".repeat(RULE_WIDTH);
    let goal = if spec.goal.is_empty() {
        "Not specified"
    } else {
        spec.goal.as_str()
    };

    let mut out = format!("\n{}\n", rule);
    out.push_str(&format!("Plan: {}\n", doc.name()));
    out.push_str(&format!("Type: {}\n", spec.plan_type));
    out.push_str(&format!("Goal: {}\n", goal));
    out.push_str(&format!("\nTask Groups: {}\n", doc.groups.len()));
    for group in &doc.groups {
        out.push_str(&format!("  - {}: {} tasks\n", group.name, group.tasks.len()));
    }
    out.push_str(&format!("{}\n", rule));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Task, TaskGroup};
    use std::path::PathBuf;

    fn document() -> PlanDocument {
        let mut general = TaskGroup::new("General");
        general.add_task(Task::new(1, "Setup"));
        general.status = TaskStatus::Completed;

        let mut backend = TaskGroup::new("Backend");
        backend.add_task(Task::new(2, "Api"));
        backend.add_task(Task::new(3, "Db"));
        backend.status = TaskStatus::Failed;

        let mut doc = PlanDocument {
            path: Some(PathBuf::from("plans/2026-01-01-auth.md")),
            groups: vec![general, backend, TaskGroup::new("Docs")],
            ..Default::default()
        };
        doc.specification.goal = "Add auth".to_string();
        doc.specification.plan_type = "Feature".to_string();
        doc
    }

    #[test]
    fn test_summary() {
        let text = summary(&document());
        assert!(text.contains("Plan: 2026-01-01-auth\n"));
        assert!(text.contains("Type: Feature\n"));
        assert!(text.contains("Goal: Add auth\n"));
        assert!(text.contains("Task Groups: 3\n"));
        assert!(text.contains("  - Backend: 2 tasks\n"));
        assert!(text.contains("  - Docs: 0 tasks\n"));
    }

    #[test]
    fn test_summary_missing_goal() {
        let doc = PlanDocument::default();
        let text = summary(&doc);
        assert!(text.contains("Plan: plan\n"));
        assert!(text.contains("Type: Unknown\n"));
        assert!(text.contains("Goal: Not specified\n"));
    }

    #[test]
    fn test_report_from_document() {
        let doc = document();
        let report = RunReport::from_document(
            &doc,
            Some(PlanError::UnmetDependency {
                pending: vec!["Docs".to_string()],
            }),
            Vec::new(),
        );

        assert!(!report.success);
        assert_eq!(report.exit_code(), 1);
        assert_eq!(report.completed_groups, vec!["General"]);
        assert_eq!(report.failed_groups, vec!["Backend"]);
        assert_eq!(report.final_status, PlanStatus::Draft);
    }
}
