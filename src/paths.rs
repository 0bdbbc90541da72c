//! Image reference resolution.
//!
//! Chapters live at different depths of the book tree and authors write image
//! references relative to wherever their editor happened to be:
//! `../../images/My%20Image.png`, `/images/foo.png`, `./img/a.png`. The
//! renderer, however, resolves every image against one fixed resource root
//! (the book root by default). This module turns any such reference into a
//! root-relative path.
//!
//! ## Steps
//!
//! 1. Percent-decode escape sequences (`%20` → space) so the literal
//!    filesystem name is recovered. Invalid UTF-8 after decoding leaves the
//!    raw text in place.
//! 2. Collapse `.` and `..` segments lexically. A `..` that would climb above
//!    the root is dropped, which strips any number of leading traversals.
//! 3. Drop leading separators so an absolute-looking reference becomes
//!    root-relative.
//!
//! The result never starts with `../` or `/`. Whether the file exists is not
//! checked here; a missing image is the renderer's problem.
//!
//! ```text
//! ../../images/My%20Image.png  →  images/My Image.png
//! /images/foo.png              →  images/foo.png
//! images/a/../b.png            →  images/b.png
//! images/foo.png               →  images/foo.png
//! ```

use percent_encoding::percent_decode_str;
use std::borrow::Cow;

/// One image reference as it moves through normalization.
///
/// Exists only for the duration of a single rewrite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    /// Path text exactly as written in the chapter.
    pub raw: String,
    /// After percent-decoding.
    pub decoded: String,
    /// Root-relative path handed to the renderer.
    pub resolved: String,
}

impl ImageReference {
    /// Resolve a reference written in URL form (percent-escapes are decoded).
    pub fn new(raw: &str) -> Self {
        let decoded = percent_decode(raw).into_owned();
        let resolved = collapse(&decoded);
        Self {
            raw: raw.to_string(),
            decoded,
            resolved,
        }
    }

    /// Resolve a reference whose text is already a literal filesystem path.
    ///
    /// Used for `<...>` destinations, which is also the form written back for
    /// paths containing spaces or `%`, so a second pass never decodes twice.
    pub fn literal(raw: &str) -> Self {
        Self {
            raw: raw.to_string(),
            decoded: raw.to_string(),
            resolved: collapse(raw),
        }
    }
}

/// Resolve an image reference to a root-relative path.
pub fn resolve(raw_path: &str) -> String {
    ImageReference::new(raw_path).resolved
}

/// True for references carrying a URL scheme (`https:`, `data:`, ...).
///
/// These point outside the book tree and are never rewritten.
pub fn has_scheme(path: &str) -> bool {
    let mut chars = path.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    for c in chars {
        match c {
            ':' => return true,
            c if c.is_ascii_alphanumeric() || matches!(c, '+' | '.' | '-') => {}
            _ => return false,
        }
    }
    false
}

fn percent_decode(raw: &str) -> Cow<'_, str> {
    match percent_decode_str(raw).decode_utf8() {
        Ok(decoded) => decoded,
        Err(_) => Cow::Borrowed(raw),
    }
}

/// Lexically collapse `.`/`..` segments and drop leading separators.
fn collapse(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "." => {}
            ".." => {
                segments.pop();
            }
            "" if segments.is_empty() => {}
            other => segments.push(other),
        }
    }
    segments.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_traversal_and_decodes() {
        assert_eq!(resolve("../../images/My%20Image.png"), "images/My Image.png");
    }

    #[test]
    fn absolute_reference_becomes_root_relative() {
        assert_eq!(resolve("/images/foo.png"), "images/foo.png");
    }

    #[test]
    fn plain_path_unchanged() {
        assert_eq!(resolve("images/foo.png"), "images/foo.png");
        assert_eq!(resolve("a/b/c-d_e.f.png"), "a/b/c-d_e.f.png");
    }

    #[test]
    fn separator_after_traversal_is_stripped() {
        assert_eq!(resolve("/../images/x.png"), "images/x.png");
        assert_eq!(resolve("..//images/x.png"), "images/x.png");
        assert_eq!(resolve("//images/x.png"), "images/x.png");
    }

    #[test]
    fn current_dir_segments_dropped() {
        assert_eq!(resolve("./img/a.png"), "img/a.png");
        assert_eq!(resolve("img/./a.png"), "img/a.png");
    }

    #[test]
    fn interior_traversal_collapsed_without_escaping_root() {
        assert_eq!(resolve("images/a/../b.png"), "images/b.png");
        assert_eq!(resolve("a/../../b.png"), "b.png");
    }

    #[test]
    fn never_starts_with_traversal_or_separator() {
        for raw in [
            "../x",
            "../../../x",
            "/x",
            "/../x",
            "./../x",
            "%2E%2E/x",
            "%2Fx",
            "a/../../../x",
        ] {
            let out = resolve(raw);
            assert!(!out.starts_with("../"), "{raw} -> {out}");
            assert!(!out.starts_with('/'), "{raw} -> {out}");
            assert_eq!(out, "x", "{raw}");
        }
    }

    #[test]
    fn invalid_utf8_escape_keeps_raw_text() {
        let reference = ImageReference::new("images/%FF.png");
        assert_eq!(reference.decoded, "images/%FF.png");
        assert_eq!(reference.resolved, "images/%FF.png");
    }

    #[test]
    fn literal_reference_is_not_decoded() {
        let reference = ImageReference::literal("../images/100%20.png");
        assert_eq!(reference.decoded, "../images/100%20.png");
        assert_eq!(reference.resolved, "images/100%20.png");
    }

    #[test]
    fn reference_keeps_every_stage() {
        let reference = ImageReference::new("../a%20b.png");
        assert_eq!(reference.raw, "../a%20b.png");
        assert_eq!(reference.decoded, "../a b.png");
        assert_eq!(reference.resolved, "a b.png");
    }

    #[test]
    fn scheme_detection() {
        assert!(has_scheme("https://example.com/a.png"));
        assert!(has_scheme("data:image/png;base64,AAAA"));
        assert!(!has_scheme("images/a.png"));
        assert!(!has_scheme("../a:b.png"));
        assert!(!has_scheme("1http://x"));
    }
}
