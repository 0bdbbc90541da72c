//! CLI output formatting.
//!
//! # Information-First Display
//!
//! Every entity leads with its position and title; filesystem paths follow
//! as indented `Source:` lines, relative to the book root. The output reads
//! as a table of contents while still letting users trace each entry back
//! to a file.
//!
//! # Output Format
//!
//! ## Check
//!
//! ```text
//! 001 Part I: Fundamentals
//!     002 Chapter 1
//!         Source: Part I - Fundamentals/Chapter 1.md
//!     003 Chapter 10
//!         Source: Part I - Fundamentals/Chapter 10.md
//! 004 Appendices
//!     005 AppendixA
//!         Source: Appendices/AppendixA.md
//!
//! 5 entries, 2 groups, 3 chapters
//! ```
//!
//! ## Stage
//!
//! ```text
//! Part I: Fundamentals (2 files)
//!     Source: Part I - Fundamentals/
//! [!] WARNING: could not find folder 'Part IX'. Skipping.
//!     001_Divider.md
//!     002_Chapter 1.md
//!         Source: Part I - Fundamentals/Chapter 1.md
//! ```
//!
//! # Architecture
//!
//! Each `format_*` function returns `Vec<String>` and does no I/O; the
//! `print_*` wrappers write the lines to stdout.

use crate::discover::StageEvent;
use crate::types::{EntrySource, PlanEntry};
use std::path::Path;

/// Zero-padded positional index, `width` digits wide.
fn format_index(pos: usize, width: usize) -> String {
    format!("{pos:0width$}")
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// `path` relative to `root` when it lies inside it, with `/` separators.
fn display_path(path: &Path, root: &Path) -> String {
    let Ok(relative) = path.strip_prefix(root) else {
        return path.display().to_string();
    };
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn warning(message: &str) -> String {
    format!("[!] WARNING: {message}")
}

// ============================================================================
// Staging events
// ============================================================================

/// Lines for one discovery or staging event.
pub fn format_stage_event(event: &StageEvent, root: &Path) -> Vec<String> {
    match event {
        StageEvent::GroupFound {
            title,
            folder,
            file_count,
        } => {
            let noun = if *file_count == 1 { "file" } else { "files" };
            vec![
                format!("{title} ({file_count} {noun})"),
                format!("{}Source: {}/", indent(1), display_path(folder, root)),
            ]
        }
        StageEvent::GroupMissing { folder } => vec![warning(&format!(
            "could not find folder '{}'. Skipping.",
            display_path(folder, root)
        ))],
        StageEvent::FileMissing { path } => vec![warning(&format!(
            "could not find file '{}'. Skipping.",
            display_path(path, root)
        ))],
        StageEvent::Staged {
            filename, source, ..
        } => {
            let mut lines = vec![format!("{}{filename}", indent(1))];
            if let Some(source) = source {
                lines.push(format!("{}Source: {}", indent(2), display_path(source, root)));
            }
            lines
        }
    }
}

pub fn print_stage_event(event: &StageEvent, root: &Path) {
    for line in format_stage_event(event, root) {
        println!("{}", line);
    }
}

// ============================================================================
// Plan
// ============================================================================

/// The document order as a two-level tree: group dividers, then chapters.
///
/// `width` is the index width of the staged filenames, so both agree.
pub fn format_plan(entries: &[PlanEntry], width: usize, root: &Path) -> Vec<String> {
    let mut lines = Vec::new();
    let mut groups = 0;
    let mut chapters = 0;

    for entry in entries {
        match &entry.source {
            EntrySource::Divider { title, .. } => {
                groups += 1;
                lines.push(format!("{} {}", format_index(entry.index, width), title));
            }
            EntrySource::Chapter(unit) => {
                chapters += 1;
                lines.push(format!(
                    "{}{} {}",
                    indent(1),
                    format_index(entry.index, width),
                    unit.stem()
                ));
                lines.push(format!(
                    "{}Source: {}",
                    indent(2),
                    display_path(&unit.path, root)
                ));
            }
        }
    }

    if !lines.is_empty() {
        lines.push(String::new());
    }
    lines.push(format!(
        "{} entries, {} groups, {} chapters",
        entries.len(),
        groups,
        chapters
    ));
    lines
}

pub fn print_plan(entries: &[PlanEntry], width: usize, root: &Path) {
    for line in format_plan(entries, width, root) {
        println!("{}", line);
    }
}
