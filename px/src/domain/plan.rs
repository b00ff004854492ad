//! Plan domain types
//!
//! A PlanDocument is created once per run by the parser, mutated in place by
//! the executor (task/group status) and the status writer (header status and
//! persisted text), and dropped at exit. Only the rewritten text survives.

use std::path::PathBuf;

use super::group::TaskGroup;
use super::status::PlanStatus;

/// Parsed header metadata of a plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanSpecification {
    /// What the plan sets out to achieve
    pub goal: String,

    /// Checklist item texts, in order
    pub success_criteria: Vec<String>,

    /// Plan type (Feature, Bugfix, ...)
    pub plan_type: String,

    /// Coarse run state; only mutated through the status writer
    pub status: PlanStatus,
}

impl Default for PlanSpecification {
    fn default() -> Self {
        Self {
            goal: String::new(),
            success_criteria: Vec::new(),
            plan_type: "Unknown".to_string(),
            status: PlanStatus::Draft,
        }
    }
}

/// A parsed plan: raw text plus the model extracted from it
#[derive(Debug, Clone, Default)]
pub struct PlanDocument {
    /// File the plan was read from, if any
    pub path: Option<PathBuf>,

    /// Raw document text, kept current by the status writer
    pub raw: String,

    /// Header metadata
    pub specification: PlanSpecification,

    /// Setup commands run once before the first batch
    pub context_loading: Vec<String>,

    /// Task groups in document order
    pub groups: Vec<TaskGroup>,

    /// Zero-based line of the `**Status:**` marker, if present
    pub status_line: Option<usize>,
}

impl PlanDocument {
    /// Display name of the plan (file stem, or "plan" for in-memory text)
    pub fn name(&self) -> String {
        self.path
            .as_ref()
            .and_then(|p| p.file_stem())
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "plan".to_string())
    }

    /// Look up a group by name
    pub fn group(&self, name: &str) -> Option<&TaskGroup> {
        self.groups.iter().find(|g| g.name == name)
    }

    /// Group names in document order
    pub fn group_names(&self) -> Vec<&str> {
        self.groups.iter().map(|g| g.name.as_str()).collect()
    }

    /// Total number of tasks across all groups
    pub fn total_tasks(&self) -> usize {
        self.groups.iter().map(|g| g.tasks.len()).sum()
    }

    /// Highest declared task number, or 0 if the plan has no tasks
    pub fn max_task_number(&self) -> u32 {
        self.groups
            .iter()
            .flat_map(|g| g.tasks.iter())
            .map(|t| t.number)
            .max()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Task;

    #[test]
    fn test_specification_defaults() {
        let spec = PlanSpecification::default();
        assert_eq!(spec.plan_type, "Unknown");
        assert_eq!(spec.status, PlanStatus::Draft);
        assert!(spec.goal.is_empty());
        assert!(spec.success_criteria.is_empty());
    }

    #[test]
    fn test_document_name() {
        let mut doc = PlanDocument::default();
        assert_eq!(doc.name(), "plan");

        doc.path = Some(PathBuf::from("/plans/2025-01-15-feature.md"));
        assert_eq!(doc.name(), "2025-01-15-feature");
    }

    #[test]
    fn test_document_lookup_and_counts() {
        let mut a = TaskGroup::new("A");
        a.add_task(Task::new(1, "one"));
        a.add_task(Task::new(4, "four"));
        let mut b = TaskGroup::new("B");
        b.add_task(Task::new(2, "two"));

        let doc = PlanDocument {
            groups: vec![a, b],
            ..Default::default()
        };

        assert_eq!(doc.group_names(), vec!["A", "B"]);
        assert_eq!(doc.total_tasks(), 3);
        assert_eq!(doc.max_task_number(), 4);
        assert!(doc.group("B").is_some());
        assert!(doc.group("C").is_none());
    }
}
