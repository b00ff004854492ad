//! Render the document model back to plan markdown

use std::fmt::Write;

use crate::domain::{PlanDocument, TaskGroup};

use super::DEFAULT_GROUP;

/// Render task groups as a `## Tasks` section
///
/// A leading `General` group is written without a heading so the parser
/// folds its tasks back into the implicit group.
pub fn render_tasks(groups: &[TaskGroup]) -> String {
    let mut out = String::from("## Tasks\n\n");
    for (index, group) in groups.iter().enumerate() {
        render_group(&mut out, group, 3, !(index == 0 && group.name == DEFAULT_GROUP));
    }
    out
}

/// Append one group, optionally preceded by its heading
///
/// Group and task headings are written at `level`, one deeper than the
/// Tasks heading they belong under.
pub fn render_group(out: &mut String, group: &TaskGroup, level: usize, with_heading: bool) {
    let hashes = "#".repeat(level);
    if with_heading {
        let _ = write!(out, "{} {}\n\n", hashes, group.name);
    }

    for task in &group.tasks {
        let _ = write!(out, "{} Task {}: {}\n\n", hashes, task.number, task.name);
        if !task.context.is_empty() {
            let _ = write!(out, "**Context:** `{}`\n\n", task.context);
        }
        if !task.steps.is_empty() {
            out.push_str("**Steps:**\n\n");
            for (n, step) in task.steps.iter().enumerate() {
                let _ = writeln!(out, "{}. [ ] {}", n + 1, step);
            }
            out.push('\n');
        }
        if task.has_verify() {
            let _ = write!(out, "**Verify:** `{}`\n\n", task.verify);
        }
        out.push_str("---\n\n");
    }
}

/// Render a complete plan document with the given title and creation date
pub fn render_document(doc: &PlanDocument, title: &str, created: Option<&str>) -> String {
    let spec = &doc.specification;
    let mut out = String::new();

    let _ = write!(out, "# {}\n\n", title);
    let _ = writeln!(out, "> **Status:** {}", spec.status);
    let _ = writeln!(out, "> **Type:** {}", spec.plan_type);
    if let Some(created) = created {
        let _ = writeln!(out, "> **Created:** {}", created);
    }
    out.push('\n');

    out.push_str("## Specification\n\n");
    let _ = write!(out, "**Goal:** {}\n\n", spec.goal);
    if !spec.success_criteria.is_empty() {
        out.push_str("**Success Criteria:**\n\n");
        for item in &spec.success_criteria {
            let _ = writeln!(out, "- [ ] {}", item);
        }
        out.push('\n');
    }

    if !doc.context_loading.is_empty() {
        out.push_str("## Context Loading\n\n_Run before starting:_\n\n");
        for command in &doc.context_loading {
            let _ = write!(out, "```bash\n{}\n```\n\n", command);
        }
    }

    out.push_str(&render_tasks(&doc.groups));
    out
}
