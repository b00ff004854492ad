//! Line outline of a markdown plan
//!
//! Splits the document into lines, tracks which lines sit inside fenced
//! blocks, and indexes headings so sections can be sliced by title.

use std::ops::Range;

/// A markdown heading outside any fenced block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heading {
    /// Number of leading `#` characters (1-6)
    pub level: usize,
    /// Trimmed heading text
    pub title: String,
    /// Zero-based line index
    pub line: usize,
}

/// Where a section stops
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionEnd {
    /// At the next heading of any level
    AnyHeading,
    /// At the next heading whose level is at most the section's own
    SameLevel,
}

/// A titled slice of the document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub heading: Heading,
    /// Body line indices (heading line excluded)
    pub body: Range<usize>,
}

/// Line-level view of a document
#[derive(Debug)]
pub struct Outline<'a> {
    lines: Vec<&'a str>,
    fenced: Vec<bool>,
    headings: Vec<Heading>,
    unclosed_fence: Option<usize>,
}

impl<'a> Outline<'a> {
    /// Build the outline of a document
    pub fn new(text: &'a str) -> Self {
        let lines: Vec<&str> = text.lines().collect();
        let mut fenced = Vec::with_capacity(lines.len());
        let mut headings = Vec::new();
        let mut in_fence = false;
        let mut fence_start = 0;

        for (index, line) in lines.iter().enumerate() {
            if is_fence_delimiter(line) {
                in_fence = !in_fence;
                fence_start = index;
                fenced.push(true);
                continue;
            }
            fenced.push(in_fence);
            if !in_fence && let Some((level, title)) = parse_heading(line) {
                headings.push(Heading {
                    level,
                    title,
                    line: index,
                });
            }
        }

        Self {
            lines,
            fenced,
            headings,
            unclosed_fence: in_fence.then_some(fence_start),
        }
    }

    /// Line opening a fence that never closes
    pub fn unclosed_fence(&self) -> Option<usize> {
        self.unclosed_fence
    }

    /// Number of lines
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Check if the document has no lines
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Text of a line (empty when out of range)
    pub fn line(&self, index: usize) -> &'a str {
        self.lines.get(index).copied().unwrap_or("")
    }

    /// Check if a line is a fence delimiter or inside a fenced block
    pub fn is_fenced(&self, index: usize) -> bool {
        self.fenced.get(index).copied().unwrap_or(false)
    }

    /// Heading starting at a line, if any
    pub fn heading_at(&self, index: usize) -> Option<&Heading> {
        self.headings
            .binary_search_by_key(&index, |h| h.line)
            .ok()
            .map(|pos| &self.headings[pos])
    }

    /// First section whose heading title matches (case-insensitive)
    pub fn section(&self, title: &str, end: SectionEnd) -> Option<Section> {
        let position = self
            .headings
            .iter()
            .position(|h| h.title.eq_ignore_ascii_case(title))?;
        let heading = self.headings[position].clone();

        let stop = self.headings[position + 1..]
            .iter()
            .find(|h| match end {
                SectionEnd::AnyHeading => true,
                SectionEnd::SameLevel => h.level <= heading.level,
            })
            .map(|h| h.line)
            .unwrap_or(self.lines.len());

        let body = heading.line + 1..stop;
        Some(Section { heading, body })
    }
}

/// Forward-only cursor over a range of line indices
#[derive(Debug)]
pub struct LineCursor {
    next: usize,
    end: usize,
}

impl LineCursor {
    /// Create a cursor over a range
    pub fn new(range: Range<usize>) -> Self {
        Self {
            next: range.start,
            end: range.end,
        }
    }

    /// Index of the current line without consuming it
    pub fn peek(&self) -> Option<usize> {
        (self.next < self.end).then_some(self.next)
    }

    /// Consume the current line
    pub fn advance(&mut self) {
        if self.next < self.end {
            self.next += 1;
        }
    }
}

fn is_fence_delimiter(line: &str) -> bool {
    line.trim_start().starts_with("```")
}

/// Parse `### Title` into (3, "Title")
pub fn parse_heading(line: &str) -> Option<(usize, String)> {
    let level = line.chars().take_while(|c| *c == '#').count();
    if level == 0 || level > 6 {
        return None;
    }
    let rest = &line[level..];
    if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let title = rest.trim();
    if title.is_empty() {
        return None;
    }
    Some((level, title.to_string()))
}
