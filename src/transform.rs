//! Individual text rules applied by the preprocessing pipeline.
//!
//! Every rule is a plain function over raw text or single lines. No rule
//! parses Markdown into a tree; each one matches the narrow syntax it cares
//! about and leaves everything else byte-for-byte intact. Malformed input
//! (an `<img>` without `src`, an unclosed frontmatter block, a link with an
//! empty target) simply fails to match.
//!
//! Rules that look at prose are only ever handed prose regions (see
//! [`crate::fence`]); code wrapping is only ever handed code lines.
//!
//! All rules are idempotent on their own output.

use crate::paths::{self, ImageReference};
use regex::{Captures, Regex};
use std::borrow::Cow;
use std::sync::LazyLock;

/// Invisible codepoint flagged as non-printable by print distributors.
pub const ZERO_WIDTH_SPACE: char = '\u{200B}';

/// Thematic break that cannot be mistaken for a table separator.
pub const DEFAULT_DIVIDER: &str = "* * *";

static IMG_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<img\b([^>]*)>").expect("static regex"));

static IMG_SRC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(?:^|\s)src\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))"#)
        .expect("static regex")
});

static IMG_ALT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(?:^|\s)alt\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))"#)
        .expect("static regex")
});

static MD_IMAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"!\[([^\]\n]*)\]\((?:<([^<>\n]*)>([^()\n]*)|([^()\n]+))\)").expect("static regex")
});

static MD_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(!?)\[([^\[\]\n]+)\]\(([^()\n]*)\)").expect("static regex"));

static HEADING_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(#{1,6})([A-Za-z0-9])").expect("static regex"));

static ATX_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(#{1,6})[ \t]+(.*)$").expect("static regex"));

static FRONTMATTER_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s:#][^:]*:(\s|$)").expect("static regex"));

/// Default pattern for the label title rule: `Chapter 3`, `Appendix B`.
///
/// Only the label word ignores case. Letters and roman numerals must be
/// upper case, so `Appendix Civic duties` is not a title.
pub const DEFAULT_TITLE_PATTERN: &str =
    r"(?i)^(chapter|appendix)\s+(?-i:[0-9]+|[A-Z]|[IVXLC]+)\b";

// =============================================================================
// Character cleanup
// =============================================================================

/// Strip a leading BOM and every zero-width space, and normalise line
/// endings to `\n`.
pub fn clean_characters(text: &str) -> Cow<'_, str> {
    let text = text.strip_prefix('\u{FEFF}').unwrap_or(text);
    if !text.contains([ZERO_WIDTH_SPACE, '\r']) {
        return Cow::Borrowed(text);
    }
    let cleaned = text
        .replace("\r\n", "\n")
        .replace('\r', "\n")
        .replace(ZERO_WIDTH_SPACE, "");
    Cow::Owned(cleaned)
}

// =============================================================================
// Frontmatter and decorative dividers
// =============================================================================

/// True for a bare dash line (`---`, `-----`), the marker shared by
/// frontmatter blocks and decorative dividers.
pub fn is_dash_line(line: &str) -> bool {
    let rest = line.trim_start_matches(' ');
    let body = rest.trim_end();
    line.len() - rest.len() <= 3 && body.len() >= 3 && body.bytes().all(|b| b == b'-')
}

/// Remove every leading frontmatter block.
///
/// A block is a dash line, one or more `key: value` lines (blank lines,
/// `#` comments, indented continuations and `- item` list entries are
/// allowed once a key has been seen), and a closing dash line. Blank lines
/// before and after a removed block go with it. Text that does not open with
/// such a block is returned untouched.
pub fn strip_frontmatter(text: &str) -> &str {
    let mut rest = text;
    while let Some(end) = frontmatter_end(rest) {
        rest = rest[end..].trim_start_matches(['\n', ' ', '\t']);
    }
    rest
}

/// Byte offset just past the closing marker of a leading frontmatter block.
fn frontmatter_end(text: &str) -> Option<usize> {
    let mut offset = 0;
    let mut lines = text.split_inclusive('\n');

    // Opening marker, after any blank lines.
    loop {
        let line = lines.next()?;
        offset += line.len();
        let content = line.trim_end_matches('\n');
        if content.trim().is_empty() {
            continue;
        }
        if !is_dash_line(content) {
            return None;
        }
        break;
    }

    let mut seen_key = false;
    for line in lines {
        offset += line.len();
        let content = line.trim_end_matches('\n');
        let trimmed = content.trim();
        if is_dash_line(content) {
            return seen_key.then_some(offset);
        }
        if FRONTMATTER_KEY.is_match(content) {
            seen_key = true;
            continue;
        }
        let continuation = seen_key
            && (content.starts_with([' ', '\t']) || trimmed.starts_with("- ") || trimmed == "-");
        if trimmed.is_empty() || trimmed.starts_with('#') || continuation {
            continue;
        }
        return None;
    }
    None
}

/// Replace bare dash lines with `token`, or drop them when `token` is empty.
///
/// Applied to prose after frontmatter removal, so every remaining dash line
/// is decorative. Left alone, pandoc reads a dash line next to other dashed
/// lines as a table rule and squeezes the page into a narrow column.
pub fn replace_dividers<'a>(prose: &'a str, token: &'a str) -> Cow<'a, str> {
    if !prose.split('\n').any(is_dash_line) {
        return Cow::Borrowed(prose);
    }
    let mut out: Vec<&str> = Vec::new();
    for line in prose.split('\n') {
        if !is_dash_line(line) {
            out.push(line);
        } else if !token.is_empty() {
            out.push(token);
        }
    }
    Cow::Owned(out.join("\n"))
}

// =============================================================================
// Images
// =============================================================================

/// Rewrite `<img src="...">` elements as Markdown images.
///
/// The `alt` attribute is carried over when present. Tags without a `src`
/// are left as they are.
pub fn convert_image_tags(prose: &str) -> Cow<'_, str> {
    IMG_TAG.replace_all(prose, |caps: &Captures| {
        let attrs = &caps[1];
        let Some(src) = attribute(&IMG_SRC, attrs) else {
            return caps[0].to_string();
        };
        let alt = attribute(&IMG_ALT, attrs)
            .map(|a| a.replace(['[', ']'], "").replace('\n', " "))
            .unwrap_or_default();
        if src.contains(['(', ')', '\n']) {
            format!("![{alt}](<{}>)", src.replace(['<', '>', '\n'], ""))
        } else {
            format!("![{alt}]({src})")
        }
    })
}

fn attribute<'a>(pattern: &Regex, attrs: &'a str) -> Option<&'a str> {
    let caps = pattern.captures(attrs)?;
    caps.get(1)
        .or_else(|| caps.get(2))
        .or_else(|| caps.get(3))
        .map(|m| m.as_str())
}

/// Resolve every Markdown image target to a root-relative path.
///
/// Bare targets are percent-decoded; `<...>` targets are taken literally.
/// Targets with a URL scheme are left alone. An optional title
/// (`"..."` or `'...'`) is preserved.
pub fn normalize_image_paths(prose: &str) -> Cow<'_, str> {
    MD_IMAGE.replace_all(prose, |caps: &Captures| {
        let alt = &caps[1];
        let (reference, title) = match (caps.get(2), caps.get(4)) {
            (Some(angle), _) => {
                let title = caps.get(3).map(|m| m.as_str().trim()).unwrap_or_default();
                (ImageReference::literal(angle.as_str()), title)
            }
            (None, Some(bare)) => {
                let (path, title) = split_title(bare.as_str());
                if paths::has_scheme(path) {
                    return caps[0].to_string();
                }
                (ImageReference::new(path), title)
            }
            (None, None) => return caps[0].to_string(),
        };
        if paths::has_scheme(&reference.raw) {
            return caps[0].to_string();
        }
        let target = markdown_destination(&reference.resolved);
        if title.is_empty() {
            format!("![{alt}]({target})")
        } else {
            format!("![{alt}]({target} {title})")
        }
    })
}

/// Split a bare link destination into path and optional quoted title.
///
/// Surrounding whitespace is trimmed and a path wrapped entirely in quotes
/// is unwrapped.
fn split_title(target: &str) -> (&str, &str) {
    let target = target.trim();
    let (path, title) = match trailing_title(target) {
        Some(at) => (target[..at].trim_end(), &target[at..]),
        None => (target, ""),
    };
    (unquote(path).trim(), title)
}

fn trailing_title(target: &str) -> Option<usize> {
    for quote in ['"', '\''] {
        let Some(inner) = target.strip_suffix(quote) else {
            continue;
        };
        let open = inner.rfind(quote)?;
        let before = &inner[..open];
        if before.ends_with(char::is_whitespace) && !before.trim().is_empty() {
            return Some(open);
        }
    }
    None
}

fn unquote(path: &str) -> &str {
    for quote in ['"', '\''] {
        if path.len() >= 2
            && let Some(inner) = path.strip_prefix(quote).and_then(|p| p.strip_suffix(quote))
        {
            return inner;
        }
    }
    path
}

/// Render a resolved path as a Markdown destination.
///
/// Paths that a bare destination would not carry through unchanged are
/// written in `<...>` form, which is read back literally.
fn markdown_destination(path: &str) -> String {
    let needs_angle = path.contains(|c: char| {
        c.is_whitespace() || matches!(c, '%' | '(' | ')' | '<' | '>')
    }) || path.starts_with(['"', '\''])
        || path.ends_with(['"', '\'']);
    if !needs_angle {
        return path.to_string();
    }
    let escaped = path
        .replace('<', "%3C")
        .replace('>', "%3E")
        .replace('\n', "%0A");
    format!("<{escaped}>")
}

// =============================================================================
// Cross-links
// =============================================================================

/// Turn links to other chapters into bold labels.
///
/// A link whose target path (ignoring any `#fragment` or `?query`) ends in
/// `.{extension}` has no meaning in print. Images and links with a URL scheme
/// are left alone. Runs to a fixpoint so labels uncovered by an inner rewrite
/// are handled in the same pass.
pub fn rewrite_cross_links<'a>(prose: &'a str, extension: &str) -> Cow<'a, str> {
    let mut current = Cow::Borrowed(prose);
    loop {
        let mut rewrote = false;
        let next = MD_LINK
            .replace_all(&current, |caps: &Captures| {
                if !caps[1].is_empty() || !is_chapter_target(&caps[3], extension) {
                    return caps[0].to_string();
                }
                rewrote = true;
                let label = caps[2].trim();
                if label.len() > 4 && label.starts_with("**") && label.ends_with("**") {
                    label.to_string()
                } else {
                    format!("**{label}**")
                }
            })
            .into_owned();
        if !rewrote {
            return current;
        }
        current = Cow::Owned(next);
    }
}

fn is_chapter_target(target: &str, extension: &str) -> bool {
    let target = target.trim();
    let target = target
        .strip_prefix('<')
        .and_then(|t| t.split_once('>'))
        .map(|(inside, _)| inside)
        .unwrap_or_else(|| split_title(target).0);
    if target.is_empty() || paths::has_scheme(target) {
        return false;
    }
    let path = target.split(['#', '?']).next().unwrap_or(target);
    let Some((_, ext)) = path.rsplit_once('.') else {
        return false;
    };
    !path.ends_with('/') && ext.eq_ignore_ascii_case(extension)
}

// =============================================================================
// Headings
// =============================================================================

/// An ATX heading as seen by a [`TitleRule`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Heading<'a> {
    /// Number of `#` characters (1-6).
    pub level: usize,
    /// Heading text after the marker, trimmed.
    pub text: &'a str,
    /// Zero-based position among the file's headings outside code.
    pub ordinal: usize,
}

/// Decides whether a heading is the chapter/appendix title.
///
/// Matching headings below the top level are promoted to `#`, so the table of
/// contents is fed one consistent level. A file where nothing matches is
/// passed through unchanged.
pub trait TitleRule: Send + Sync {
    fn is_title(&self, heading: &Heading<'_>) -> bool;
}

/// Headings whose text matches a label pattern such as `Chapter 3`.
#[derive(Debug, Clone)]
pub struct LabelPattern {
    pattern: Regex,
}

impl LabelPattern {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
        })
    }
}

impl Default for LabelPattern {
    fn default() -> Self {
        Self {
            pattern: Regex::new(DEFAULT_TITLE_PATTERN).expect("static regex"),
        }
    }
}

impl TitleRule for LabelPattern {
    fn is_title(&self, heading: &Heading<'_>) -> bool {
        self.pattern.is_match(heading.text)
    }
}

/// The first heading of every file.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstHeading;

impl TitleRule for FirstHeading {
    fn is_title(&self, heading: &Heading<'_>) -> bool {
        heading.ordinal == 0
    }
}

/// Never promotes anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTitles;

impl TitleRule for NoTitles {
    fn is_title(&self, _heading: &Heading<'_>) -> bool {
        false
    }
}

/// Counts headings across the prose regions of one file.
#[derive(Debug, Default)]
pub struct HeadingCursor {
    seen: usize,
}

/// Repair `#Heading` markers and promote title headings to the top level.
pub fn normalize_headings<'a>(
    prose: &'a str,
    rule: &dyn TitleRule,
    cursor: &mut HeadingCursor,
) -> Cow<'a, str> {
    if !prose.split('\n').any(|l| l.starts_with('#')) {
        return Cow::Borrowed(prose);
    }
    let lines: Vec<String> = prose
        .split('\n')
        .map(|line| normalize_heading_line(line, rule, cursor))
        .collect();
    Cow::Owned(lines.join("\n"))
}

fn normalize_heading_line(line: &str, rule: &dyn TitleRule, cursor: &mut HeadingCursor) -> String {
    let line = HEADING_MARKER.replace(line, "$1 $2");
    let Some(caps) = ATX_HEADING.captures(&line) else {
        return line.into_owned();
    };
    let heading = Heading {
        level: caps[1].len(),
        text: caps[2].trim(),
        ordinal: cursor.seen,
    };
    cursor.seen += 1;
    if heading.level > 1 && rule.is_title(&heading) {
        format!("# {}", &caps[2])
    } else {
        line.into_owned()
    }
}

// =============================================================================
// Code wrapping
// =============================================================================

/// Extra indent given to continuation lines of a wrapped code line.
pub const CONTINUATION_INDENT: &str = "    ";

/// Narrowest chunk a wrapped line may be cut into.
const MIN_CHUNK: usize = 10;

/// Preferred break characters, tried in this order.
const BREAK_CHARS: [char; 10] = [' ', ',', '|', '/', '.', '-', '\\', ':', ';', '='];

/// Hard-wrap one code line so no piece exceeds `width` characters.
///
/// Breaks after the last preferred break character that fits, or mid-token
/// when there is none. Continuation lines repeat the original indent plus
/// [`CONTINUATION_INDENT`]. This changes the visual structure of the sample:
/// whitespace at break points is dropped. When the indent leaves fewer than
/// [`MIN_CHUNK`] columns, pieces are cut to `MIN_CHUNK` characters after the
/// indent and may run past `width`.
pub fn wrap_code_line(line: &str, width: usize) -> Vec<String> {
    if line.chars().count() <= width {
        return vec![line.to_string()];
    }
    let stripped = line.trim_start();
    let indent = &line[..line.len() - stripped.len()];
    let continuation = format!("{indent}{CONTINUATION_INDENT}");
    let first_room = width
        .saturating_sub(indent.chars().count())
        .max(MIN_CHUNK);
    let rest_room = width
        .saturating_sub(continuation.chars().count())
        .max(MIN_CHUNK);

    let mut chunks = Vec::new();
    let mut remaining = stripped;
    let mut first = true;
    while !remaining.is_empty() {
        let (prefix, room) = if first {
            (indent, first_room)
        } else {
            (continuation.as_str(), rest_room)
        };
        if remaining.chars().count() <= room {
            chunks.push(format!("{prefix}{remaining}"));
            break;
        }
        let at = keep_tail_off_fence(remaining, break_point(remaining, room));
        chunks.push(format!("{prefix}{}", remaining[..at].trim_end()));
        remaining = remaining[at..].trim_start();
        first = false;
    }
    if chunks.is_empty() {
        chunks.push(String::new());
    }
    chunks
}

/// Byte offset to cut `text` at, keeping the head within `room` characters.
fn break_point(text: &str, room: usize) -> usize {
    let window_end = text
        .char_indices()
        .nth(room)
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    let window = &text[..window_end];
    for ch in BREAK_CHARS {
        if let Some(pos) = window.rfind(ch)
            && pos > 0
        {
            return pos + ch.len_utf8();
        }
    }
    window_end
}

/// Move a cut so the continuation never opens with a fence marker.
///
/// Backs up to just before the last ordinary character ahead of the backtick
/// run. When there is none, cuts after the run instead.
fn keep_tail_off_fence(text: &str, at: usize) -> usize {
    if !text[at..].trim_start().starts_with("```") {
        return at;
    }
    let head = text[..at].trim_end_matches(|c: char| c == '`' || c.is_whitespace());
    if let Some((i, _)) = head.char_indices().last()
        && i > 0
    {
        return i;
    }
    let mut at = at;
    loop {
        let tail = text[at..].trim_start();
        if !tail.starts_with("```") {
            return at;
        }
        at = text.len() - tail.trim_start_matches('`').len();
    }
}
