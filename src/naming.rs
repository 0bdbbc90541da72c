//! Ordering and naming of chapter files.
//!
//! ## Natural Order
//!
//! Names are split into alternating text and digit runs. Digit runs compare
//! by numeric value, text runs compare case-insensitively, so the order
//! never depends on how a filesystem happens to fold case:
//!
//! ```text
//! Chapter 1.md
//! Chapter 2.md
//! Chapter 10.md
//! ```
//!
//! Names that are equal under those rules (`a01` and `a1`, `Intro` and
//! `intro`) fall back to a plain byte comparison so the result is total.
//!
//! Within a group folder, files come before subfolders at every level, and
//! each subfolder is read completely before its next sibling.
//!
//! ## Staged Filenames
//!
//! Every staged file is named `{index}_{stem}.md` with a zero-padded index,
//! so a plain directory listing of the staging area is the document order:
//! `001_Divider.md`, `002_Chapter 1.md`, ...

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// How files within a group are ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortPolicy {
    /// Digit runs compare numerically; files before folders at each level.
    #[default]
    Natural,
    /// Byte order of the full `/`-joined relative path.
    Lexicographic,
}

#[derive(Debug, PartialEq, Eq)]
enum Run<'a> {
    Number(&'a str),
    Text(&'a str),
}

fn runs(name: &str) -> Vec<Run<'_>> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut digits: Option<bool> = None;
    for (i, c) in name.char_indices() {
        let is_digit = c.is_ascii_digit();
        match digits {
            Some(d) if d != is_digit => {
                out.push(run(&name[start..i], d));
                start = i;
            }
            _ => {}
        }
        digits = Some(is_digit);
    }
    if let Some(d) = digits {
        out.push(run(&name[start..], d));
    }
    out
}

fn run(text: &str, digits: bool) -> Run<'_> {
    if digits {
        Run::Number(text.trim_start_matches('0'))
    } else {
        Run::Text(text)
    }
}

fn compare_runs(a: &Run<'_>, b: &Run<'_>) -> Ordering {
    match (a, b) {
        // Leading zeros are already gone, so a longer run is a larger number.
        (Run::Number(x), Run::Number(y)) => x.len().cmp(&y.len()).then_with(|| x.cmp(y)),
        (Run::Number(_), Run::Text(_)) => Ordering::Less,
        (Run::Text(_), Run::Number(_)) => Ordering::Greater,
        (Run::Text(x), Run::Text(y)) => x
            .chars()
            .flat_map(char::to_lowercase)
            .cmp(y.chars().flat_map(char::to_lowercase)),
    }
}

/// Compare two names in natural order.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let ra = runs(a);
    let rb = runs(b);
    for (x, y) in ra.iter().zip(rb.iter()) {
        match compare_runs(x, y) {
            Ordering::Equal => {}
            other => return other,
        }
    }
    ra.len().cmp(&rb.len()).then_with(|| a.cmp(b))
}

/// Compare two relative paths, given as their components, under `policy`.
///
/// With [`SortPolicy::Natural`] a path that ends at the current level (a
/// file) sorts before one that continues into a subfolder.
pub fn compare_paths<S: AsRef<str>>(a: &[S], b: &[S], policy: SortPolicy) -> Ordering {
    match policy {
        SortPolicy::Lexicographic => {
            let joined = |p: &[S]| p.iter().map(AsRef::as_ref).collect::<Vec<_>>().join("/");
            joined(a).as_bytes().cmp(joined(b).as_bytes())
        }
        SortPolicy::Natural => compare_natural_paths(a, b),
    }
}

fn compare_natural_paths<S: AsRef<str>>(a: &[S], b: &[S]) -> Ordering {
    match (a.split_first(), b.split_first()) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some((ha, ta)), Some((hb, tb))) => {
            match (ta.is_empty(), tb.is_empty()) {
                (true, false) => return Ordering::Less,
                (false, true) => return Ordering::Greater,
                _ => {}
            }
            natural_cmp(ha.as_ref(), hb.as_ref()).then_with(|| compare_natural_paths(ta, tb))
        }
    }
}

/// Digits needed for the index prefix of `count` staged files.
///
/// Never narrower than `minimum`, never too narrow for `count`.
pub fn index_width(count: usize, minimum: usize) -> usize {
    let needed = count.max(1).to_string().len();
    needed.max(minimum)
}

/// Staged filename: zero-padded index, underscore, stem, `.md`.
pub fn staged_filename(index: usize, width: usize, stem: &str) -> String {
    format!("{index:0width$}_{stem}.md")
}
