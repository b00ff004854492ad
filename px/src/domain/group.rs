//! TaskGroup domain type
//!
//! A TaskGroup is a named set of tasks sharing context. Tasks inside a group
//! run strictly in order; groups are the unit of dependency and parallelism.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

use super::status::TaskStatus;
use super::task::Task;

/// A named, sequentially executed set of tasks
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskGroup {
    /// Group name, used as the dependency key
    pub name: String,

    /// Subsystem label
    pub subsystem: String,

    /// Tasks in execution order
    pub tasks: Vec<Task>,

    /// Names of groups that must complete before this one may start
    pub dependencies: BTreeSet<String>,

    /// Current status
    pub status: TaskStatus,
}

impl TaskGroup {
    /// Create an empty pending group whose subsystem equals its name
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            subsystem: name.clone(),
            name,
            tasks: Vec::new(),
            dependencies: BTreeSet::new(),
            status: TaskStatus::Pending,
        }
    }

    /// Append a task, preserving insertion order
    pub fn add_task(&mut self, task: Task) {
        self.tasks.push(task);
    }

    /// Add a dependency on another group
    pub fn add_dependency(&mut self, group_name: impl Into<String>) {
        self.dependencies.insert(group_name.into());
    }

    /// Check if every dependency is in the completed set
    pub fn is_ready(&self, completed: &HashSet<String>) -> bool {
        self.dependencies.iter().all(|dep| completed.contains(dep))
    }

    /// Look up a task by id
    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Number of tasks that reached `completed`
    pub fn completed_tasks(&self) -> usize {
        self.tasks.iter().filter(|t| t.status == TaskStatus::Completed).count()
    }

    /// The first failed task, if any
    pub fn failed_task(&self) -> Option<&Task> {
        self.tasks.iter().find(|t| t.status == TaskStatus::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn completed(names: &[&str]) -> HashSet<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_group_new() {
        let group = TaskGroup::new("Backend");
        assert_eq!(group.name, "Backend");
        assert_eq!(group.subsystem, "Backend");
        assert!(group.tasks.is_empty());
        assert!(group.dependencies.is_empty());
        assert_eq!(group.status, TaskStatus::Pending);
    }

    #[test]
    fn test_group_no_deps_is_ready() {
        let group = TaskGroup::new("A");
        assert!(group.is_ready(&completed(&[])));
    }

    #[test]
    fn test_group_is_ready() {
        let mut group = TaskGroup::new("C");
        group.add_dependency("A");
        group.add_dependency("B");

        assert!(!group.is_ready(&completed(&["A"])));
        assert!(group.is_ready(&completed(&["A", "B"])));
        assert!(group.is_ready(&completed(&["A", "B", "Z"])));
    }

    #[test]
    fn test_group_task_order_preserved() {
        let mut group = TaskGroup::new("A");
        group.add_task(Task::new(3, "third"));
        group.add_task(Task::new(1, "first"));

        let ids: Vec<_> = group.tasks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["task-3", "task-1"]);
        assert!(group.task("task-1").is_some());
        assert!(group.task("task-9").is_none());
    }

    #[test]
    fn test_group_task_counters() {
        let mut group = TaskGroup::new("A");
        group.add_task(Task::new(1, "one"));
        group.add_task(Task::new(2, "two"));
        group.tasks[0].status = TaskStatus::Completed;
        group.tasks[1].fail("bad");

        assert_eq!(group.completed_tasks(), 1);
        assert_eq!(group.failed_task().map(|t| t.id.as_str()), Some("task-2"));
    }
}
