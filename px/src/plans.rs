//! Plan files on disk
//!
//! Listing the plans directory, generating new plans from the built-in
//! templates, and appending task groups to an existing plan.

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info};

use crate::domain::{PlanDocument, PlanSpecification, PlanStatus, Task, TaskGroup};
use crate::error::{ParseError, PlanError};
use crate::parser::{DEFAULT_GROUP, Outline, SectionEnd, load_plan, parse_plan, render_document, render_group};

static NON_SLUG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w\s-]").expect("valid slug regex"));
static SLUG_SEPARATORS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[-\s]+").expect("valid separator regex"));

/// Built-in plan templates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanTemplate {
    Feature,
    Bugfix,
    Refactor,
}

impl PlanTemplate {
    /// Every template, in display order
    pub const ALL: [PlanTemplate; 3] = [PlanTemplate::Feature, PlanTemplate::Bugfix, PlanTemplate::Refactor];

    /// Value written to the `**Type:**` marker
    pub fn type_label(&self) -> &'static str {
        match self {
            Self::Feature => "Feature",
            Self::Bugfix => "Bugfix",
            Self::Refactor => "Refactor",
        }
    }

    fn title_suffix(&self) -> &'static str {
        match self {
            Self::Feature => "Implementation Plan",
            Self::Bugfix => "Bug Fix Plan",
            Self::Refactor => "Refactoring Plan",
        }
    }

    /// Build the template's document model for `goal`
    pub fn document(&self, goal: &str) -> PlanDocument {
        debug!(template = %self, "PlanTemplate::document: called");
        let (criteria, context, tasks) = match self {
            Self::Feature => (
                vec![
                    "All acceptance criteria met",
                    "All tests passing",
                    "Code reviewed and approved",
                    "Documentation updated",
                ],
                vec!["ls -la src/ tests/", "git status --short"],
                vec![
                    Task::new(1, "Setup and Foundation")
                        .with_context("src/, tests/")
                        .with_step("Review existing codebase structure")
                        .with_step("Set up necessary directories")
                        .with_step("Configure development dependencies")
                        .with_verify("ls -la src/ tests/"),
                    Task::new(2, "Core Implementation")
                        .with_context("src/feature/, tests/feature/")
                        .with_step("Implement core feature logic")
                        .with_step("Add comprehensive tests")
                        .with_step("Export and integrate")
                        .with_verify("make test"),
                    Task::new(3, "Integration and Polish")
                        .with_context("src/, docs/")
                        .with_step("Integrate with existing system")
                        .with_step("Update documentation")
                        .with_step("Run full test suite")
                        .with_verify("make test"),
                ],
            ),
            Self::Bugfix => (
                vec![
                    "Bug reproduces before fix",
                    "Bug no longer reproduces after fix",
                    "Regression tests added",
                    "All existing tests still pass",
                ],
                vec!["git log --oneline -10", "git status --short"],
                vec![
                    Task::new(1, "Reproduce and Investigate")
                        .with_context("src/, tests/, logs/")
                        .with_step("Reproduce the bug reliably")
                        .with_step("Add reproduction test case")
                        .with_step("Investigate root cause"),
                    Task::new(2, "Implement Fix")
                        .with_context("src/, tests/")
                        .with_step("Implement the fix")
                        .with_step("Verify fix resolves issue")
                        .with_step("Add regression tests")
                        .with_verify("make test"),
                    Task::new(3, "Verify and Deploy")
                        .with_context("src/, tests/")
                        .with_step("Run full test suite")
                        .with_step("Check for regressions")
                        .with_step("Document the fix")
                        .with_verify("make test"),
                ],
            ),
            Self::Refactor => (
                vec![
                    "All tests pass before and after refactor",
                    "Code complexity reduced",
                    "Documentation updated",
                    "No regressions introduced",
                ],
                vec!["git status --short", "make test"],
                vec![
                    Task::new(1, "Prepare Baseline")
                        .with_context("src/, tests/")
                        .with_step("Ensure all tests pass")
                        .with_step("Document current behavior")
                        .with_step("Take code coverage snapshot")
                        .with_verify("make test"),
                    Task::new(2, "Apply Refactoring")
                        .with_context("src/module/, tests/module/")
                        .with_step("Apply refactoring changes")
                        .with_step("Verify tests still pass")
                        .with_step("Update type annotations")
                        .with_verify("make test"),
                    Task::new(3, "Cleanup and Verify")
                        .with_context("src/, tests/, docs/")
                        .with_step("Remove deprecated code")
                        .with_step("Update documentation")
                        .with_step("Run full test suite")
                        .with_verify("make test"),
                ],
            ),
        };

        let mut general = TaskGroup::new(DEFAULT_GROUP);
        tasks.into_iter().for_each(|t| general.add_task(t));

        PlanDocument {
            specification: PlanSpecification {
                goal: goal.to_string(),
                success_criteria: criteria.into_iter().map(String::from).collect(),
                plan_type: self.type_label().to_string(),
                status: PlanStatus::Draft,
            },
            context_loading: context.into_iter().map(String::from).collect(),
            groups: vec![general],
            ..Default::default()
        }
    }
}

impl FromStr for PlanTemplate {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        debug!(%s, "PlanTemplate::from_str: called");
        match s.trim().to_lowercase().as_str() {
            "feature" => Ok(Self::Feature),
            "bugfix" => Ok(Self::Bugfix),
            "refactor" => Ok(Self::Refactor),
            _ => Err(format!("Invalid plan type: {}. Use: feature, bugfix, or refactor", s)),
        }
    }
}

impl fmt::Display for PlanTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_label().to_lowercase())
    }
}

/// Lowercase, strip punctuation, and join words with `-`
pub fn slugify(text: &str) -> String {
    let lowered = text.trim().to_lowercase();
    let stripped = NON_SLUG.replace_all(&lowered, "");
    let slug = SLUG_SEPARATORS.replace_all(&stripped, "-");
    slug.trim_matches('-').to_string()
}

/// Title-case a plan name (`user-auth` becomes `User Auth`)
pub fn title_case(name: &str) -> String {
    name.replace(['-', '_'], " ")
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// File name for a new plan: `<date>-<slug>.md`
pub fn plan_filename(date: &str, name: &str) -> String {
    let slug = slugify(name);
    let slug = if slug.is_empty() { "plan".to_string() } else { slug };
    format!("{}-{}.md", date, slug)
}

/// Generate a plan from a template into `dir`, refusing to overwrite
pub fn create_plan(
    dir: &Path,
    template: PlanTemplate,
    name: &str,
    goal: &str,
    date: &str,
) -> Result<PathBuf, PlanError> {
    debug!(?dir, %template, %name, %date, "create_plan: called");
    fs::create_dir_all(dir)?;

    let path = dir.join(plan_filename(date, name));
    let title = format!("{} {}", title_case(name), template.title_suffix());
    let content = render_document(&template.document(goal), &title, Some(date));

    let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => return Err(PlanError::PlanExists(path)),
        Err(e) => return Err(e.into()),
    };
    file.write_all(content.as_bytes())?;

    info!(?path, "create_plan: plan created");
    Ok(path)
}

/// Parse a `name|context|verify|step;step` task description
///
/// The task number is assigned when the group is added to a plan.
pub fn parse_task_spec(spec: &str) -> Result<Task, String> {
    let mut fields = spec.splitn(4, '|').map(str::trim);
    let name = fields.next().unwrap_or_default();
    if name.is_empty() {
        return Err(format!("Task needs a name: '{}'", spec));
    }

    let mut task = Task::new(0, name)
        .with_context(fields.next().unwrap_or_default())
        .with_verify(fields.next().unwrap_or_default());
    task.steps = fields
        .next()
        .unwrap_or_default()
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect();
    Ok(task)
}

/// Append a task group to the end of a plan's Tasks section
///
/// Tasks are renumbered after the plan's highest task number. A missing Tasks
/// section is created at the end of the document. The file is only written
/// when the result parses.
pub fn add_group(path: &Path, name: &str, tasks: Vec<Task>) -> Result<PlanDocument, PlanError> {
    debug!(?path, %name, tasks = tasks.len(), "add_group: called");
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => return Err(PlanError::PlanNotFound(path.to_path_buf())),
        Err(e) => return Err(e.into()),
    };

    let outline = Outline::new(&text);
    let section = outline.section("Tasks", SectionEnd::SameLevel);
    let level = section.as_ref().map_or(3, |s| s.heading.level + 1);
    if let Some(section) = &section
        && level > 6
    {
        let err = ParseError::at(section.heading.line, "Tasks heading too deep to nest task groups");
        return Err(PlanError::malformed(path, err));
    }
    let tasks_end = section.map(|s| s.body.end);
    let first_number = match tasks_end {
        Some(_) => load_plan(path)?.max_task_number() + 1,
        None => 1,
    };

    let mut group = TaskGroup::new(name.trim());
    for (offset, task) in tasks.into_iter().enumerate() {
        let mut renumbered = Task::new(first_number + offset as u32, task.name)
            .with_context(task.context)
            .with_verify(task.verify);
        renumbered.steps = task.steps;
        group.add_task(renumbered);
    }

    let mut block = String::new();
    render_group(&mut block, &group, level, true);

    let lines: Vec<&str> = text.split_inclusive('\n').collect();
    let split = tasks_end.unwrap_or(lines.len()).min(lines.len());
    let mut updated: String = lines[..split].concat();
    if !updated.is_empty() && !updated.ends_with('\n') {
        updated.push('\n');
    }
    if !updated.is_empty() && !updated.ends_with("\n\n") {
        updated.push('\n');
    }
    if tasks_end.is_none() {
        updated.push_str("## Tasks\n\n");
    }
    updated.push_str(&block);
    updated.push_str(&lines[split..].concat());

    let mut doc = parse_plan(&updated).map_err(|e| PlanError::malformed(path, e))?;
    fs::write(path, &updated)?;
    doc.path = Some(path.to_path_buf());

    info!(?path, group = %group.name, "add_group: group added");
    Ok(doc)
}

/// Markdown plan files in `dir`, sorted; None when the directory is missing
pub fn list_plans(dir: &Path) -> Result<Option<Vec<PathBuf>>, PlanError> {
    debug!(?dir, "list_plans: called");
    if !dir.is_dir() {
        return Ok(None);
    }

    let mut plans = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "md") {
            plans.push(path);
        }
    }
    plans.sort();
    Ok(Some(plans))
}
