//! Shared types used across discovery, staging and assembly.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Whether a group holds regular parts or the appendix set.
///
/// Appendix groups are moved after every part group unless the configuration
/// asks for declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupKind {
    #[default]
    Part,
    Appendix,
}

/// A declared section of the book with the files discovered for it.
#[derive(Debug, Clone)]
pub struct Group {
    /// Folder relative to the book root, as declared.
    pub folder: String,
    pub title: String,
    pub subtitle: String,
    pub kind: GroupKind,
    /// Eligible files in reading order.
    pub sources: Vec<SourceUnit>,
}

/// One chapter or appendix file before normalization.
///
/// The text is read later, during staging, so that discovery stays cheap and
/// `folio check` never touches file contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceUnit {
    pub path: PathBuf,
    pub kind: GroupKind,
}

impl SourceUnit {
    /// File stem used in the staged filename.
    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// What a single staged file is made from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntrySource {
    /// Generated title page for a group.
    Divider {
        kind: GroupKind,
        title: String,
        subtitle: String,
    },
    /// A discovered chapter file.
    Chapter(SourceUnit),
}

/// One slot in the final document order, before any text is read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanEntry {
    /// 1-based sequence index, strictly increasing without gaps.
    pub index: usize,
    /// Destination filename in the staging directory.
    pub filename: String,
    pub source: EntrySource,
}

/// A normalized file plus its position in the document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedUnit {
    pub index: usize,
    pub filename: String,
    pub text: String,
}
