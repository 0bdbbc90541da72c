//! The preprocessing pipeline: one chapter's raw text in, print-safe text out.
//!
//! [`Pipeline::normalize`] is a pure function of its input and the fixed
//! pipeline settings. Running it on its own output changes nothing, so a
//! build can be re-run over already staged copies.
//!
//! ## Rule Order
//!
//! ```text
//! 1. character cleanup     BOM, CRLF, zero-width spaces      whole text
//! 2. frontmatter           leading key/value blocks removed   whole text
//!    ── split into prose / code regions ──
//! 3. dividers              bare dash lines → divider token    prose
//! 4. <img> tags            → ![alt](src)                      prose
//! 5. image paths           → root-relative                    prose
//! 6. cross-links           [label](x.md) → **label**          prose
//! 7. image paths again     images whose alt held a link       prose
//! 8. headings              marker repair, title promotion     prose
//! 9. code wrapping         hard-wrap at the column limit      code
//! ```
//!
//! Zero-width spaces go first so no later rule ever matches around one. Tag
//! conversion precedes path resolution because only Markdown image syntax is
//! resolved. An image whose alt text holds a chapter link only becomes a
//! plain image once the link is rewritten, hence the second path pass.

use crate::config::{ConfigError, PreprocessConfig, TitleRuleKind};
use crate::fence::{self, RegionKind};
use crate::transform::{self, FirstHeading, HeadingCursor, LabelPattern, NoTitles, TitleRule};

/// Preprocessing settings that do not depend on the text.
pub struct Pipeline {
    /// Column limit for lines inside fenced code.
    pub wrap_width: usize,
    /// Replacement for decorative dash lines; empty drops them.
    pub divider: String,
    /// Extension (without the dot) that marks a link as a cross-link.
    pub extension: String,
    title_rule: Box<dyn TitleRule>,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self {
            wrap_width: 75,
            divider: transform::DEFAULT_DIVIDER.to_string(),
            extension: "md".to_string(),
            title_rule: Box::new(LabelPattern::default()),
        }
    }
}

impl Pipeline {
    /// Build a pipeline from the `[preprocess]` section.
    pub fn from_config(config: &PreprocessConfig, extension: &str) -> Result<Self, ConfigError> {
        let title_rule: Box<dyn TitleRule> = match config.title_rule {
            TitleRuleKind::Label => Box::new(
                LabelPattern::new(&config.title_pattern)
                    .map_err(|e| ConfigError::Validation(format!("preprocess.title_pattern: {e}")))?,
            ),
            TitleRuleKind::FirstHeading => Box::new(FirstHeading),
            TitleRuleKind::None => Box::new(NoTitles),
        };
        Ok(Self {
            wrap_width: config.code_wrap_width,
            divider: config.divider.clone(),
            extension: extension.to_string(),
            title_rule,
        })
    }

    /// Swap the heading title rule.
    pub fn with_title_rule(mut self, rule: impl TitleRule + 'static) -> Self {
        self.title_rule = Box::new(rule);
        self
    }

    /// Normalize one file's full text.
    pub fn normalize(&self, raw: &str) -> String {
        let cleaned = transform::clean_characters(raw);
        let body = transform::strip_frontmatter(&cleaned);

        let mut headings = HeadingCursor::default();
        fence::regions(body)
            .iter()
            .map(|region| match region.kind {
                RegionKind::Prose => self.normalize_prose(&region.lines.join("\n"), &mut headings),
                RegionKind::Code => self.wrap_code(&region.lines),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn normalize_prose(&self, prose: &str, headings: &mut HeadingCursor) -> String {
        let text = transform::replace_dividers(prose, &self.divider);
        let text = transform::convert_image_tags(&text);
        let text = transform::normalize_image_paths(&text);
        let text = transform::rewrite_cross_links(&text, &self.extension);
        let text = transform::normalize_image_paths(&text);
        transform::normalize_headings(&text, self.title_rule.as_ref(), headings).into_owned()
    }

    /// Wrap the body of one code region; marker lines pass through untouched.
    fn wrap_code(&self, lines: &[&str]) -> String {
        let mut out: Vec<String> = Vec::with_capacity(lines.len());
        for line in lines {
            if fence::is_fence_marker(line) {
                out.push(line.to_string());
            } else {
                out.extend(transform::wrap_code_line(line, self.wrap_width));
            }
        }
        out.join("\n")
    }
}
