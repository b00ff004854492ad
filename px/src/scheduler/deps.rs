//! Group dependency resolution
//!
//! Groups depend on their immediate predecessor in document order. The
//! readiness check and cycle detection work on arbitrary dependency sets.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::domain::{TaskGroup, TaskStatus};

/// Make every group except the first depend on the group before it
pub fn resolve_dependencies(groups: &mut [TaskGroup]) {
    debug!(groups = groups.len(), "resolve_dependencies: called");
    for i in 1..groups.len() {
        let previous = groups[i - 1].name.clone();
        groups[i].add_dependency(previous);
    }
}

/// Validate that the dependency graph has no cycles
///
/// Returns Ok(()) if valid, or Err with the cycle path if a cycle is found.
/// Dependencies on unknown groups are not cycles; the scheduler reports them
/// as unmet.
pub fn validate_dependency_graph(groups: &[TaskGroup]) -> Result<(), Vec<String>> {
    let graph: HashMap<&str, &TaskGroup> = groups.iter().map(|g| (g.name.as_str(), g)).collect();

    let mut visited = HashSet::new();
    let mut rec_stack = HashSet::new();
    let mut cycle_path = Vec::new();

    // Document order keeps the reported path deterministic
    for group in groups {
        let name = group.name.as_str();
        if !visited.contains(name) && has_cycle_dfs(name, &graph, &mut visited, &mut rec_stack, &mut cycle_path) {
            return Err(cycle_path);
        }
    }

    Ok(())
}

fn has_cycle_dfs<'a>(
    node: &'a str,
    graph: &HashMap<&'a str, &'a TaskGroup>,
    visited: &mut HashSet<&'a str>,
    rec_stack: &mut HashSet<&'a str>,
    cycle_path: &mut Vec<String>,
) -> bool {
    visited.insert(node);
    rec_stack.insert(node);
    cycle_path.push(node.to_string());

    if let Some(group) = graph.get(node) {
        for dep in &group.dependencies {
            if !visited.contains(dep.as_str()) {
                if graph.contains_key(dep.as_str()) && has_cycle_dfs(dep.as_str(), graph, visited, rec_stack, cycle_path)
                {
                    return true;
                }
            } else if rec_stack.contains(dep.as_str()) {
                cycle_path.push(dep.clone());
                return true;
            }
        }
    }

    rec_stack.remove(node);
    cycle_path.pop();
    false
}

/// Indices of pending groups whose dependencies have all completed, in document order
pub fn ready_groups(groups: &[TaskGroup], completed: &HashSet<String>) -> Vec<usize> {
    groups
        .iter()
        .enumerate()
        .filter(|(_, g)| g.status == TaskStatus::Pending && g.is_ready(completed))
        .map(|(i, _)| i)
        .collect()
}
