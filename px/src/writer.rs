//! Status writer
//!
//! Rewrites the `**Status:**` marker and step checkboxes of a plan in place.
//! Only the targeted bytes change; every other byte of the document is kept.

use std::collections::HashSet;
use std::fs;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::domain::{PlanDocument, PlanStatus, TaskStatus};
use crate::error::PlanError;

const STATUS_MARKER: &str = "**Status:**";

static UNCHECKED_STEP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\s*\d+\.\s*)\[\s*\]").expect("valid unchecked step regex"));

/// Replace the value of the status marker on `line` (zero-based)
///
/// Returns the text unchanged when there is no marker line. Writing the
/// value already present is byte-identical.
pub fn rewrite_status(text: &str, line: Option<usize>, status: &PlanStatus) -> String {
    let Some(line) = line else {
        return text.to_string();
    };

    text.split_inclusive('\n')
        .enumerate()
        .map(|(i, chunk)| {
            if i == line {
                replace_marker_value(chunk, status.as_marker())
            } else {
                chunk.to_string()
            }
        })
        .collect()
}

fn replace_marker_value(line: &str, value: &str) -> String {
    let Some(pos) = line.find(STATUS_MARKER) else {
        return line.to_string();
    };
    let (head, rest) = line.split_at(pos + STATUS_MARKER.len());
    let end = rest.find(['*', '\r', '\n']).unwrap_or(rest.len());
    let (region, tail) = rest.split_at(end);

    let trimmed = region.trim();
    if trimmed.is_empty() {
        return format!("{} {}{}", head, value, tail);
    }
    let lead = region.len() - region.trim_start().len();
    let trail = region.len() - region.trim_end().len();
    format!(
        "{}{}{}{}{}",
        head,
        &region[..lead],
        value,
        &region[region.len() - trail..],
        tail
    )
}

/// Tick `[ ]` to `[x]` on the given zero-based step lines
pub fn tick_steps(text: &str, lines: &[usize]) -> String {
    let lines: HashSet<usize> = lines.iter().copied().collect();
    text.split_inclusive('\n')
        .enumerate()
        .map(|(i, chunk)| {
            if lines.contains(&i) {
                UNCHECKED_STEP.replace(chunk, "${1}[x]").into_owned()
            } else {
                chunk.to_string()
            }
        })
        .collect()
}

/// Set the plan status and persist it to the plan file
///
/// Returns true if the document text changed. Without a file path only the
/// in-memory text is updated.
pub fn persist_status(doc: &mut PlanDocument, status: PlanStatus) -> Result<bool, PlanError> {
    debug!(plan = %doc.name(), %status, "persist_status: called");
    if doc.status_line.is_none() {
        warn!(plan = %doc.name(), "persist_status: no Status marker, document left unchanged");
        doc.specification.status = status;
        return Ok(false);
    }

    let updated = rewrite_status(&doc.raw, doc.status_line, &status);
    doc.specification.status = status;
    update_raw(doc, updated)
}

/// Tick the step checklist of every completed task and persist it
pub fn persist_checklist(doc: &mut PlanDocument) -> Result<bool, PlanError> {
    debug!(plan = %doc.name(), "persist_checklist: called");
    let lines: Vec<usize> = doc
        .groups
        .iter()
        .flat_map(|g| g.tasks.iter())
        .filter(|t| t.status == TaskStatus::Completed)
        .flat_map(|t| t.step_lines.iter().copied())
        .collect();
    if lines.is_empty() {
        return Ok(false);
    }

    let updated = tick_steps(&doc.raw, &lines);
    update_raw(doc, updated)
}

fn update_raw(doc: &mut PlanDocument, updated: String) -> Result<bool, PlanError> {
    if updated == doc.raw {
        debug!("update_raw: text unchanged");
        return Ok(false);
    }
    doc.raw = updated;
    if let Some(path) = &doc.path {
        fs::write(path, &doc.raw)?;
        debug!(?path, "update_raw: plan written");
    }
    Ok(true)
}
