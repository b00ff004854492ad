//! Plan parser
//!
//! Converts plan markdown into a [`PlanDocument`]. The document is first
//! outlined into fence-aware lines and headings; each authoritative section
//! (Specification, Context Loading, Tasks) is then read with a line cursor.

mod render;
mod section;

pub use render::{render_document, render_group, render_tasks};
pub use section::{Heading, LineCursor, Outline, Section, SectionEnd, parse_heading};

use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::domain::{PlanDocument, PlanSpecification, Task, TaskGroup};
use crate::error::{ParseError, PlanError};

/// Name of the implicit group holding tasks before the first sub-heading
pub const DEFAULT_GROUP: &str = "General";

static TASK_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Task\s+(\d+):\s*(.+)$").expect("valid task heading regex"));

static STEP_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\d+\.\s*\[\s*[xX ]?\s*\]\s*(.+)$").expect("valid step regex"));

static CHECKLIST_ITEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*[-*]\s*\[\s*[xX ]?\s*\]\s*(.+)$").expect("valid checklist regex"));

static BACKTICK_SPAN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"`([^`]*)`").expect("valid backtick regex"));

const CONTEXT_LABEL: &str = "**Context:**";
const STEPS_LABEL: &str = "**Steps:**";
const VERIFY_LABEL: &str = "**Verify:**";
const CRITERIA_LABEL: &str = "**Success Criteria:**";

/// Fence info strings whose bodies count as context-loading commands
const COMMAND_FENCES: &[&str] = &["", "bash", "sh", "shell"];

/// Read and parse a plan file
pub fn load_plan(path: &Path) -> Result<PlanDocument, PlanError> {
    debug!(?path, "load_plan: called");
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(?path, "load_plan: plan file missing");
            return Err(PlanError::PlanNotFound(path.to_path_buf()));
        }
        Err(e) => return Err(PlanError::Io(e)),
    };

    let mut doc = parse_plan(&text).map_err(|e| PlanError::malformed(path, e))?;
    doc.path = Some(path.to_path_buf());
    Ok(doc)
}

/// Parse plan text into a document
pub fn parse_plan(text: &str) -> Result<PlanDocument, ParseError> {
    debug!(len = text.len(), "parse_plan: called");
    let outline = Outline::new(text);
    if let Some(line) = outline.unclosed_fence() {
        return Err(ParseError::at(line, "unterminated code fence"));
    }

    let tasks = outline
        .section("Tasks", SectionEnd::SameLevel)
        .ok_or(ParseError::MissingTasks)?;

    let (specification, status_line) = parse_specification(&outline);
    let context_loading = match outline.section("Context Loading", SectionEnd::AnyHeading) {
        Some(section) => parse_context_loading(&outline, &section),
        None => Vec::new(),
    };
    let groups = parse_tasks(&outline, &tasks)?;

    debug!(
        groups = groups.len(),
        context_commands = context_loading.len(),
        "parse_plan: parsed"
    );

    Ok(PlanDocument {
        path: None,
        raw: text.to_string(),
        specification,
        context_loading,
        groups,
        status_line,
    })
}

/// Extract header fields, returning the status marker line alongside
fn parse_specification(outline: &Outline<'_>) -> (PlanSpecification, Option<usize>) {
    let mut spec = PlanSpecification::default();
    let everything = 0..outline.len();
    let block = outline
        .section("Specification", SectionEnd::AnyHeading)
        .map(|s| s.body)
        .unwrap_or(0..0);

    if let Some((_, goal)) = find_field(outline, block.clone(), "Goal") {
        spec.goal = goal;
    }

    if let Some((_, plan_type)) =
        find_field(outline, block.clone(), "Type").or_else(|| find_field(outline, everything.clone(), "Type"))
        && !plan_type.is_empty()
    {
        spec.plan_type = plan_type;
    }

    let status = find_field(outline, block.clone(), "Status").or_else(|| find_field(outline, everything, "Status"));
    let status_line = status.as_ref().map(|(line, _)| *line);
    if let Some((_, word)) = status
        && let Ok(parsed) = word.parse()
    {
        spec.status = parsed;
    }

    spec.success_criteria = parse_criteria(outline, block);
    (spec, status_line)
}

/// Find `**<label>:** value` in a range, skipping fenced lines
fn find_field(outline: &Outline<'_>, range: std::ops::Range<usize>, label: &str) -> Option<(usize, String)> {
    let marker = format!("**{}:**", label);
    range.filter(|i| !outline.is_fenced(*i)).find_map(|i| {
        let line = outline.line(i);
        let start = line.find(&marker)? + marker.len();
        let value: String = line[start..].chars().take_while(|c| *c != '*').collect();
        Some((i, value.trim().to_string()))
    })
}

fn parse_criteria(outline: &Outline<'_>, block: std::ops::Range<usize>) -> Vec<String> {
    let mut criteria = Vec::new();
    let Some(label) = block.clone().find(|i| outline.line(*i).contains(CRITERIA_LABEL)) else {
        return criteria;
    };

    for index in label + 1..block.end {
        let line = outline.line(index);
        if line.trim().is_empty() {
            continue;
        }
        match CHECKLIST_ITEM.captures(line) {
            Some(caps) => criteria.push(caps[1].trim().to_string()),
            None => break,
        }
    }
    criteria
}

fn parse_context_loading(outline: &Outline<'_>, section: &Section) -> Vec<String> {
    let mut commands = Vec::new();
    let mut cursor = LineCursor::new(section.body.clone());

    while let Some(index) = cursor.peek() {
        cursor.advance();
        let line = outline.line(index).trim();
        let Some(info) = line.strip_prefix("```") else {
            continue;
        };
        let accepted = COMMAND_FENCES.contains(&info.trim().to_lowercase().as_str());

        // Fences are balanced once the outline is built
        let mut body = Vec::new();
        while let Some(inner) = cursor.peek() {
            cursor.advance();
            let text = outline.line(inner);
            if text.trim_start().starts_with("```") {
                break;
            }
            body.push(text);
        }

        let command = body.join("\n").trim().to_string();
        if accepted && !command.is_empty() {
            commands.push(command);
        }
    }
    commands
}

fn parse_tasks(outline: &Outline<'_>, section: &Section) -> Result<Vec<TaskGroup>, ParseError> {
    let mut groups = vec![TaskGroup::new(DEFAULT_GROUP)];
    let mut names: HashSet<String> = HashSet::from([DEFAULT_GROUP.to_string()]);
    let mut cursor = LineCursor::new(section.body.clone());

    while let Some(index) = cursor.peek() {
        let Some(heading) = outline.heading_at(index) else {
            cursor.advance();
            continue;
        };
        cursor.advance();

        if let Some(caps) = TASK_HEADING.captures(&heading.title) {
            let number: u32 = caps[1]
                .parse()
                .map_err(|_| ParseError::at(index, format!("task number out of range: {}", &caps[1])))?;
            let task = parse_task(outline, &mut cursor, Task::new(number, caps[2].trim()));

            let group = groups
                .last_mut()
                .ok_or_else(|| ParseError::at(index, "no open task group"))?;
            if group.task(&task.id).is_some() {
                return Err(ParseError::at(
                    index,
                    format!("duplicate task id {} in group {}", task.id, group.name),
                ));
            }
            debug!(task = %task.id, group = %group.name, "parse_tasks: task");
            group.add_task(task);
            continue;
        }

        let name = heading.title.clone();
        let implicit_unused = groups.len() == 1 && groups[0].tasks.is_empty();
        if name == DEFAULT_GROUP && implicit_unused {
            continue;
        }
        if !names.insert(name.clone()) {
            return Err(ParseError::at(index, format!("duplicate task group {}", name)));
        }
        debug!(group = %name, "parse_tasks: group");
        groups.push(TaskGroup::new(name));
    }
    Ok(groups)
}

/// Consume labeled task fields until `**Verify:**` or the next heading
fn parse_task(outline: &Outline<'_>, cursor: &mut LineCursor, mut task: Task) -> Task {
    let mut in_steps = false;

    while let Some(index) = cursor.peek() {
        if outline.heading_at(index).is_some() {
            break;
        }
        cursor.advance();
        if outline.is_fenced(index) {
            continue;
        }

        let line = outline.line(index).trim();
        if let Some(rest) = line.strip_prefix(CONTEXT_LABEL) {
            task.context = context_value(rest);
        } else if line.starts_with(STEPS_LABEL) {
            in_steps = true;
        } else if let Some(rest) = line.strip_prefix(VERIFY_LABEL) {
            task.verify = command_value(rest);
            break;
        } else if in_steps && let Some(caps) = STEP_LINE.captures(line) {
            task.steps.push(caps[1].trim().to_string());
            task.step_lines.push(index);
        }
    }
    task
}

/// Backtick spans joined with ", ", or the trimmed text when there are none
fn context_value(rest: &str) -> String {
    let spans: Vec<&str> = BACKTICK_SPAN
        .captures_iter(rest)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().trim())
        .filter(|s| !s.is_empty())
        .collect();
    if spans.is_empty() {
        rest.trim().trim_matches('`').trim().to_string()
    } else {
        spans.join(", ")
    }
}

/// First backtick span, or the trimmed text when there is none
fn command_value(rest: &str) -> String {
    match BACKTICK_SPAN.captures(rest).and_then(|c| c.get(1)) {
        Some(m) => m.as_str().trim().to_string(),
        None => rest.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{PlanStatus, TaskStatus};

    const FEATURE_PLAN: &str = r#"# Login Implementation Plan

> **Status:** DRAFT
> **Type:** Feature
> **Created:** 2025-01-15

## Specification

**Goal:** Add user login

**Success Criteria:**

- [ ] All tests passing
- [x] Docs updated

## Context Loading

_Run before starting:_

```bash
# Read relevant source files
ls src
```

```bash
git status
```

## Tasks

### Task 1: Setup and Foundation

**Context:** `src/`, `tests/`

**Steps:**

1. [ ] Review existing codebase structure
2. [x] git status

**Verify:** `ls -la src/ tests/`

---

### Backend

### Task 2: Core Implementation

**Context:** `src/feature/`

**Steps:**

1. [ ] python3 -m pytest
not a step line
2. [ ] Export and integrate

**Verify:** `npm test`

### Task 3: No verify here

**Steps:**

1. [ ] Update documentation

### Frontend
"#;

    #[test]
    fn test_parse_specification() {
        let doc = parse_plan(FEATURE_PLAN).unwrap();
        let spec = &doc.specification;
        assert_eq!(spec.goal, "Add user login");
        assert_eq!(spec.plan_type, "Feature");
        assert_eq!(spec.status, PlanStatus::Draft);
        assert_eq!(spec.success_criteria, vec!["All tests passing", "Docs updated"]);
        assert_eq!(doc.status_line, Some(2));
    }

    #[test]
    fn test_parse_context_loading() {
        let doc = parse_plan(FEATURE_PLAN).unwrap();
        assert_eq!(
            doc.context_loading,
            vec!["# Read relevant source files\nls src".to_string(), "git status".to_string()]
        );
    }

    #[test]
    fn test_parse_groups_in_order() {
        let doc = parse_plan(FEATURE_PLAN).unwrap();
        assert_eq!(doc.group_names(), vec!["General", "Backend", "Frontend"]);
        assert_eq!(doc.groups[0].tasks.len(), 1);
        assert_eq!(doc.groups[1].tasks.len(), 2);
        assert!(doc.groups[2].tasks.is_empty());
        assert!(doc.groups.iter().all(|g| g.status == TaskStatus::Pending));
    }

    #[test]
    fn test_parse_task_fields() {
        let doc = parse_plan(FEATURE_PLAN).unwrap();
        let task = &doc.groups[0].tasks[0];
        assert_eq!(task.id, "task-1");
        assert_eq!(task.name, "Setup and Foundation");
        assert_eq!(task.context, "src/, tests/");
        assert_eq!(task.steps, vec!["Review existing codebase structure", "git status"]);
        assert_eq!(task.verify, "ls -la src/ tests/");
    }

    #[test]
    fn test_non_matching_step_lines_ignored() {
        let doc = parse_plan(FEATURE_PLAN).unwrap();
        let task = &doc.groups[1].tasks[0];
        assert_eq!(task.steps, vec!["python3 -m pytest", "Export and integrate"]);
        assert_eq!(task.verify, "npm test");
    }

    #[test]
    fn test_task_without_verify_closes_at_heading() {
        let doc = parse_plan(FEATURE_PLAN).unwrap();
        let task = &doc.groups[1].tasks[1];
        assert_eq!(task.id, "task-3");
        assert_eq!(task.steps, vec!["Update documentation"]);
        assert!(task.verify.is_empty());
    }

    #[test]
    fn test_step_lines_recorded() {
        let doc = parse_plan(FEATURE_PLAN).unwrap();
        let outline = Outline::new(FEATURE_PLAN);
        let task = &doc.groups[0].tasks[0];
        assert_eq!(task.step_lines.len(), 2);
        assert!(outline.line(task.step_lines[0]).contains("Review existing"));
    }

    #[test]
    fn test_missing_tasks_section_is_malformed() {
        let result = parse_plan("## Specification\n**Goal:** nothing\n");
        assert_eq!(result.unwrap_err(), ParseError::MissingTasks);
    }

    #[test]
    fn test_minimal_tasks_section() {
        let doc = parse_plan("## Tasks\n").unwrap();
        assert_eq!(doc.group_names(), vec!["General"]);
        assert!(doc.groups[0].tasks.is_empty());
        assert_eq!(doc.specification, PlanSpecification::default());
        assert!(doc.context_loading.is_empty());
        assert!(doc.status_line.is_none());
    }

    #[test]
    fn test_tasks_section_ends_at_same_level_heading() {
        let text = "## Tasks\n### Task 1: a\n**Verify:** `true`\n## Notes\n### Task 2: b\n";
        let doc = parse_plan(text).unwrap();
        assert_eq!(doc.total_tasks(), 1);
    }

    #[test]
    fn test_duplicate_task_id_rejected() {
        let text = "## Tasks\n### Task 1: a\n### Task 1: b\n";
        let err = parse_plan(text).unwrap_err();
        assert!(matches!(err, ParseError::Invalid { line: 3, .. }));
    }

    #[test]
    fn test_same_task_number_in_different_groups() {
        let text = "## Tasks\n### A\n### Task 1: a\n### B\n### Task 1: b\n";
        let doc = parse_plan(text).unwrap();
        assert_eq!(doc.group_names(), vec!["General", "A", "B"]);
        assert_eq!(doc.total_tasks(), 2);
    }

    #[test]
    fn test_duplicate_group_rejected() {
        let text = "## Tasks\n### A\n### Task 1: a\n### A\n";
        let err = parse_plan(text).unwrap_err();
        assert!(err.to_string().contains("duplicate task group A"));
    }

    #[test]
    fn test_explicit_general_heading_reuses_implicit_group() {
        let text = "## Tasks\n### General\n### Task 1: a\n### Other\n";
        let doc = parse_plan(text).unwrap();
        assert_eq!(doc.group_names(), vec!["General", "Other"]);
        assert_eq!(doc.groups[0].tasks.len(), 1);
    }

    #[test]
    fn test_unterminated_fence_rejected() {
        let text = "## Context Loading\n```bash\nls\n## Tasks\n";
        assert_eq!(parse_plan(text).unwrap_err(), ParseError::at(1, "unterminated code fence"));
    }

    #[test]
    fn test_unterminated_fence_inside_tasks_rejected() {
        let text = "## Tasks\n### Task 1: a\n**Steps:**\n1. [ ] echo\n```\n### Task 2: b\n**Verify:** `false`\n";
        let err = parse_plan(text).unwrap_err();
        assert_eq!(
            err,
            ParseError::Invalid {
                line: 5,
                reason: "unterminated code fence".to_string()
            }
        );
    }

    #[test]
    fn test_unterminated_fence_inside_context_section() {
        let text = "## Tasks\n### Task 1: a\n## Context Loading\n```bash\nls\n";
        let err = parse_plan(text).unwrap_err();
        assert!(err.to_string().contains("unterminated code fence"));
    }

    #[test]
    fn test_non_command_fences_ignored() {
        let text = "## Context Loading\n```python\nprint(1)\n```\n```\nmake deps\n```\n## Tasks\n";
        let doc = parse_plan(text).unwrap();
        assert_eq!(doc.context_loading, vec!["make deps"]);
    }

    #[test]
    fn test_status_from_specification_block() {
        let text = "## Specification\n**Goal:** g\n**Type:** Bugfix\n**Status:** IN_PROGRESS\n## Tasks\n";
        let doc = parse_plan(text).unwrap();
        assert_eq!(doc.specification.status, PlanStatus::InProgress);
        assert_eq!(doc.specification.plan_type, "Bugfix");
        assert_eq!(doc.status_line, Some(3));
    }

    #[test]
    fn test_context_without_backticks() {
        assert_eq!(context_value(" src/lib.rs "), "src/lib.rs");
        assert_eq!(context_value(" `a`, `b` "), "a, b");
        assert_eq!(command_value(" `cargo test` and more"), "cargo test");
        assert_eq!(command_value(" make check"), "make check");
    }

    #[test]
    fn test_load_plan_missing_file() {
        let err = load_plan(Path::new("/definitely/not/here.md")).unwrap_err();
        assert!(matches!(err, PlanError::PlanNotFound(_)));
    }

    #[test]
    fn test_load_plan_sets_path() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("plan.md");
        fs::write(&path, FEATURE_PLAN).unwrap();

        let doc = load_plan(&path).unwrap();
        assert_eq!(doc.path.as_deref(), Some(path.as_path()));
        assert_eq!(doc.raw, FEATURE_PLAN);
    }

    #[test]
    fn test_load_plan_malformed() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("plan.md");
        fs::write(&path, "# Nothing here\n").unwrap();

        let err = load_plan(&path).unwrap_err();
        assert!(matches!(err, PlanError::MalformedPlan { .. }));
    }
}
