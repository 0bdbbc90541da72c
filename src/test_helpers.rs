//! Shared test utilities for the folio test suite.
//!
//! Builds throwaway book trees and configs so that discovery and staging
//! tests read as a list of files plus an assertion.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = TempDir::new().unwrap();
//! write_chapter(tmp.path(), "Part I/Chapter 1.md", "# Chapter 1\n");
//! let config = book_config(&[("Part I", GroupKind::Part)]);
//! stage(tmp.path(), &config, &tmp.path().join("out"), None).unwrap();
//! assert_eq!(staged_listing(&tmp.path().join("out")), vec!["001_Divider.md", "002_Chapter 1.md"]);
//! ```

use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::config::{BookConfig, GroupConfig};
use crate::types::{Group, GroupKind, SourceUnit};

// =========================================================================
// Fixture setup
// =========================================================================

/// Copy `fixtures/book/` to a temp directory and return it.
pub fn setup_fixtures() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let fixtures = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures/book");
    copy_dir_recursive(&fixtures, tmp.path()).unwrap();
    tmp
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> std::io::Result<()> {
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if src_path.is_dir() {
            std::fs::create_dir_all(&dst_path)?;
            copy_dir_recursive(&src_path, &dst_path)?;
        } else {
            std::fs::copy(&src_path, &dst_path)?;
        }
    }
    Ok(())
}

/// Write `content` to `root/rel`, creating parent folders.
pub fn write_chapter(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, content).unwrap();
}

// =========================================================================
// Config and group builders
// =========================================================================

/// Stock config with one group per `(folder, kind)`, titled after the folder.
pub fn book_config(groups: &[(&str, GroupKind)]) -> BookConfig {
    BookConfig {
        groups: groups
            .iter()
            .map(|(folder, kind)| GroupConfig {
                folder: folder.to_string(),
                title: folder.to_string(),
                kind: *kind,
                ..GroupConfig::default()
            })
            .collect(),
        ..BookConfig::default()
    }
}

/// A discovered group whose sources are `{name}/{stem}.md`.
pub fn group(name: &str, kind: GroupKind, stems: &[&str]) -> Group {
    Group {
        folder: name.to_string(),
        title: name.to_string(),
        subtitle: String::new(),
        kind,
        sources: stems
            .iter()
            .map(|stem| SourceUnit {
                path: PathBuf::from(name).join(format!("{stem}.md")),
                kind,
            })
            .collect(),
    }
}

// =========================================================================
// Staging inspection
// =========================================================================

/// Sorted names of the Markdown files in `dir`.
pub fn staged_listing(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.ends_with(".md"))
        .collect();
    names.sort();
    names
}
