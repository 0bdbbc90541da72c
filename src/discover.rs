//! Chapter discovery and staging.
//!
//! Turns the declared groups into an ordered, numbered set of normalized
//! files in a staging directory. Works in four steps, each usable on its own:
//!
//! 1. [`discover`]: walk each group folder (or read its explicit file list)
//!    and order the eligible files.
//! 2. [`plan`]: fix the document order across groups and assign every file,
//!    including the generated group dividers, its sequence index.
//! 3. [`prepare`]: read and normalize every chapter, in parallel.
//! 4. [`write_staged`]: write the prepared files.
//!
//! [`stage`] runs all four. Nothing is written until every chapter has been
//! read and normalized, so a fatal error never leaves a partial staging set.
//!
//! ## Staging Directory
//!
//! ```text
//! staging/
//! ├── 001_Divider.md            # Part I title page
//! ├── 002_Chapter 1.md
//! ├── 003_Chapter 2.md
//! ├── 004_Chapter 10.md
//! ├── 005_Divider.md            # Part II title page
//! ├── 006_Setup.md
//! ├── 007_App_Divider.md        # appendix title page, always after parts
//! └── 008_AppendixA.md
//! ```
//!
//! The index comes from the position in the finished plan, never from the
//! order in which files were read, so parallel normalization cannot change
//! the numbering.
//!
//! ## Failure Handling
//!
//! - A declared folder that does not exist is reported and skipped.
//! - A folder with no eligible files contributes nothing, not even a divider.
//! - A file that cannot be read, or is not UTF-8, stops the run: silently
//!   dropping a chapter from a book is worse than stopping.
//! - A staging directory inside a group folder is refused, since staged
//!   copies would be discovered as chapters on the next run.
//!
//! Re-staging deletes only files named like the current set, with the same
//! index width, so authored files such as `01_Intro.md` are left alone.

use crate::assemble;
use crate::config::{self, AppendixPlacement, BookConfig};
use crate::naming::{self, SortPolicy};
use crate::preprocess::Pipeline;
use crate::types::{EntrySource, Group, GroupKind, PlanEntry, SourceUnit, StagedUnit};
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use thiserror::Error;
use walkdir::{DirEntry, WalkDir};

#[derive(Error, Debug)]
pub enum DiscoverError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("Could not read {path}: {source}")]
    Unreadable {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Not valid UTF-8: {0}")]
    Encoding(PathBuf),
    #[error("No chapter files found in any declared group")]
    NothingToStage,
    #[error("Staging directory {out} is inside group folder {folder}")]
    StagingInsideGroup { out: PathBuf, folder: PathBuf },
}

/// Progress reported while discovering and staging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageEvent {
    /// A group folder was found and scanned.
    GroupFound {
        title: String,
        folder: PathBuf,
        file_count: usize,
    },
    /// A declared group folder does not exist.
    GroupMissing { folder: PathBuf },
    /// A file named in a group's explicit list does not exist.
    FileMissing { path: PathBuf },
    /// A file was written to the staging directory.
    Staged {
        index: usize,
        filename: String,
        /// The chapter it came from; `None` for generated dividers.
        source: Option<PathBuf>,
    },
}

fn emit(events: Option<&Sender<StageEvent>>, event: StageEvent) {
    if let Some(tx) = events {
        // A dropped receiver only means nobody is listening.
        tx.send(event).ok();
    }
}

// =============================================================================
// Discovery
// =============================================================================

/// Enumerate the files of every declared group, in declaration order.
///
/// Missing folders and missing listed files are reported as events and
/// skipped.
pub fn discover(
    root: &Path,
    config: &BookConfig,
    events: Option<&Sender<StageEvent>>,
) -> Result<Vec<Group>, DiscoverError> {
    let extension = &config.discovery.extension;
    let mut groups = Vec::with_capacity(config.groups.len());

    for declared in &config.groups {
        let folder = root.join(&declared.folder);
        if !folder.is_dir() {
            emit(events, StageEvent::GroupMissing { folder });
            continue;
        }

        let paths = if declared.files.is_empty() {
            collect_sources(&folder, extension, config.discovery.sort)?
        } else {
            let mut listed = Vec::with_capacity(declared.files.len());
            for file in &declared.files {
                let path = folder.join(file);
                if path.is_file() {
                    listed.push(path);
                } else {
                    emit(events, StageEvent::FileMissing { path });
                }
            }
            listed
        };

        let title = if declared.title.is_empty() {
            display_name(&folder)
        } else {
            declared.title.clone()
        };
        emit(
            events,
            StageEvent::GroupFound {
                title: title.clone(),
                folder: folder.clone(),
                file_count: paths.len(),
            },
        );

        groups.push(Group {
            folder: declared.folder.clone(),
            title,
            subtitle: declared.subtitle.clone(),
            kind: declared.kind,
            sources: paths
                .into_iter()
                .map(|path| SourceUnit {
                    path,
                    kind: declared.kind,
                })
                .collect(),
        });
    }

    Ok(groups)
}

/// Recursively collect files ending in `.{extension}` under `dir`, ordered
/// by `policy`. Hidden files and folders are skipped. Symlinked files count.
pub fn collect_sources(
    dir: &Path,
    extension: &str,
    policy: SortPolicy,
) -> Result<Vec<PathBuf>, DiscoverError> {
    let mut found: Vec<(Vec<String>, PathBuf)> = Vec::new();

    let walker = WalkDir::new(dir)
        .min_depth(1)
        .into_iter()
        .filter_entry(|e| !is_hidden(e));
    for entry in walker {
        let entry = entry?;
        if !entry.path().is_file() || !has_extension(entry.path(), extension) {
            continue;
        }
        let relative = entry.path().strip_prefix(dir).unwrap_or(entry.path());
        let components = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        found.push((components, entry.into_path()));
    }

    found.sort_by(|(a, _), (b, _)| naming::compare_paths(a, b, policy));
    Ok(found.into_iter().map(|(_, path)| path).collect())
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().to_string_lossy().starts_with('.')
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(extension))
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

// =============================================================================
// Planning
// =============================================================================

/// Lay out the final document order and number every entry.
///
/// Groups keep their declared order, except that appendix groups move after
/// all part groups under [`AppendixPlacement::Last`]. Each non-empty group
/// contributes a divider followed by its files. Indices start at 1 and have
/// no gaps; the prefix is at least `min_width` digits and wide enough for
/// the total.
pub fn plan(groups: &[Group], placement: AppendixPlacement, min_width: usize) -> Vec<PlanEntry> {
    let ordered: Vec<&Group> = match placement {
        AppendixPlacement::Declared => groups.iter().collect(),
        AppendixPlacement::Last => groups
            .iter()
            .filter(|g| g.kind == GroupKind::Part)
            .chain(groups.iter().filter(|g| g.kind == GroupKind::Appendix))
            .collect(),
    };

    let sources: Vec<EntrySource> = ordered
        .into_iter()
        .filter(|g| !g.sources.is_empty())
        .flat_map(|g| {
            let divider = EntrySource::Divider {
                kind: g.kind,
                title: g.title.clone(),
                subtitle: g.subtitle.clone(),
            };
            std::iter::once(divider).chain(g.sources.iter().cloned().map(EntrySource::Chapter))
        })
        .collect();

    let width = naming::index_width(sources.len(), min_width);
    sources
        .into_iter()
        .enumerate()
        .map(|(i, source)| {
            let index = i + 1;
            let stem = match &source {
                EntrySource::Divider {
                    kind: GroupKind::Part,
                    ..
                } => "Divider".to_string(),
                EntrySource::Divider {
                    kind: GroupKind::Appendix,
                    ..
                } => "App_Divider".to_string(),
                EntrySource::Chapter(unit) => unit.stem(),
            };
            PlanEntry {
                index,
                filename: naming::staged_filename(index, width, &stem),
                source,
            }
        })
        .collect()
}

// =============================================================================
// Preparing and writing
// =============================================================================

/// Read and normalize every planned entry.
///
/// Runs in parallel; the result is in plan order. The first unreadable file
/// aborts the whole batch.
pub fn prepare(entries: &[PlanEntry], pipeline: &Pipeline) -> Result<Vec<StagedUnit>, DiscoverError> {
    entries
        .par_iter()
        .map(|entry| -> Result<StagedUnit, DiscoverError> {
            let text = match &entry.source {
                EntrySource::Divider {
                    title, subtitle, ..
                } => assemble::divider_markdown(title, subtitle),
                EntrySource::Chapter(unit) => {
                    let raw = read_source(&unit.path)?;
                    let normalized = pipeline.normalize(&raw);
                    format!("{}\n\n", normalized.trim_end())
                }
            };
            Ok(StagedUnit {
                index: entry.index,
                filename: entry.filename.clone(),
                text,
            })
        })
        .collect()
}

/// Read one chapter as UTF-8, dropping a leading byte-order mark.
pub fn read_source(path: &Path) -> Result<String, DiscoverError> {
    let bytes = fs::read(path).map_err(|source| DiscoverError::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;
    let text = String::from_utf8(bytes).map_err(|_| DiscoverError::Encoding(path.to_path_buf()))?;
    Ok(match text.strip_prefix('\u{FEFF}') {
        Some(rest) => rest.to_string(),
        None => text,
    })
}

/// Write prepared units into `out_dir`, replacing any earlier staged set.
///
/// Returns the written paths in document order.
pub fn write_staged(out_dir: &Path, units: &[StagedUnit]) -> Result<Vec<PathBuf>, DiscoverError> {
    fs::create_dir_all(out_dir)?;
    if let Some(width) = units.first().and_then(|u| prefix_width(&u.filename)) {
        clear_staged(out_dir, width)?;
    }
    let mut written = Vec::with_capacity(units.len());
    for unit in units {
        let path = out_dir.join(&unit.filename);
        fs::write(&path, &unit.text)?;
        written.push(path);
    }
    Ok(written)
}

/// Remove files from an earlier run: `{digits}_{name}.md` with exactly
/// `width` digits.
fn clear_staged(out_dir: &Path, width: usize) -> Result<(), DiscoverError> {
    for entry in fs::read_dir(out_dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file()
            && is_staged_name(&entry.file_name().to_string_lossy(), width)
        {
            fs::remove_file(entry.path())?;
        }
    }
    Ok(())
}

fn prefix_width(filename: &str) -> Option<usize> {
    filename.split_once('_').map(|(prefix, _)| prefix.len())
}

fn is_staged_name(name: &str, width: usize) -> bool {
    let Some((prefix, rest)) = name.split_once('_') else {
        return false;
    };
    prefix.len() == width && prefix.bytes().all(|b| b.is_ascii_digit()) && rest.ends_with(".md")
}

/// Refuse a staging directory at or below any discovered group folder.
fn check_staging_target(root: &Path, groups: &[Group], out_dir: &Path) -> Result<(), DiscoverError> {
    let target = resolve_target(out_dir);
    for group in groups {
        let folder = root.join(&group.folder);
        if let Ok(real) = folder.canonicalize()
            && target.starts_with(&real)
        {
            return Err(DiscoverError::StagingInsideGroup {
                out: out_dir.to_path_buf(),
                folder,
            });
        }
    }
    Ok(())
}

/// Canonical form of a path that may not exist yet: the nearest existing
/// ancestor is canonicalized and the missing tail re-joined.
fn resolve_target(path: &Path) -> PathBuf {
    let mut existing = path;
    let mut tail = Vec::new();
    loop {
        if let Ok(real) = existing.canonicalize() {
            return tail.iter().rev().fold(real, |acc, part| acc.join(part));
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                tail.push(name.to_os_string());
                existing = if parent.as_os_str().is_empty() {
                    Path::new(".")
                } else {
                    parent
                };
            }
            _ => return path.to_path_buf(),
        }
    }
}

/// Discover, plan, normalize and write the whole book into `out_dir`.
///
/// Returns the staged file paths in document order.
pub fn stage(
    root: &Path,
    config: &BookConfig,
    out_dir: &Path,
    events: Option<Sender<StageEvent>>,
) -> Result<Vec<PathBuf>, DiscoverError> {
    let pipeline = Pipeline::from_config(&config.preprocess, &config.discovery.extension)?;
    let groups = discover(root, config, events.as_ref())?;
    check_staging_target(root, &groups, out_dir)?;
    let entries = plan(
        &groups,
        config.discovery.appendix_placement,
        config.discovery.index_width,
    );
    if !entries
        .iter()
        .any(|e| matches!(e.source, EntrySource::Chapter(_)))
    {
        return Err(DiscoverError::NothingToStage);
    }

    let units = prepare(&entries, &pipeline)?;
    let written = write_staged(out_dir, &units)?;

    for entry in &entries {
        let source = match &entry.source {
            EntrySource::Chapter(unit) => Some(unit.path.clone()),
            EntrySource::Divider { .. } => None,
        };
        emit(
            events.as_ref(),
            StageEvent::Staged {
                index: entry.index,
                filename: entry.filename.clone(),
                source,
            },
        );
    }

    Ok(written)
}
