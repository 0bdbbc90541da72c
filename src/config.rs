//! Book configuration module.
//!
//! Handles loading, validating, and merging `book.toml`. The file lives in the
//! book root and is layered over the stock defaults: a user file only needs
//! the keys it wants to change.
//!
//! ## Book Layout
//!
//! ```text
//! my-book/
//! ├── book.toml
//! ├── images/
//! ├── Part I - Fundamentals/
//! │   ├── Chapter 1.md
//! │   ├── Chapter 2.md
//! │   └── Chapter 10.md
//! ├── Part II - Practice/
//! │   └── ...
//! └── Appendices/
//!     └── AppendixA.md
//! ```
//!
//! ## Configuration Options
//!
//! ```toml
//! [book]
//! title = "The Handbook"
//! author = "A. Writer"
//!
//! [[groups]]
//! folder = "Part I - Fundamentals"
//! title = "Part I: Fundamentals"
//! subtitle = "The essential building blocks."
//!
//! [[groups]]
//! folder = "Appendices"
//! title = "Appendices"
//! kind = "appendix"
//! files = ["AppendixA.md"]      # explicit order; omit to walk the folder
//!
//! [discovery]
//! sort = "natural"              # or "lexicographic"
//! appendix_placement = "last"   # or "declared"
//!
//! [preprocess]
//! code_wrap_width = 75
//!
//! [render]
//! output = "build/book.pdf"
//! ```
//!
//! Groups are declared, never discovered: their order in the file is the
//! order of the book. Unknown keys are rejected to catch typos early.

use crate::naming::SortPolicy;
use crate::types::GroupKind;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Component, Path};
use thiserror::Error;

/// Narrowest code column the wrapper accepts.
pub const MIN_CODE_WRAP_WIDTH: usize = 20;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Book configuration loaded from `book.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BookConfig {
    /// Title page and document metadata.
    pub book: BookMeta,
    /// Ordered sections of the book.
    pub groups: Vec<GroupConfig>,
    pub discovery: DiscoveryConfig,
    pub preprocess: PreprocessConfig,
    pub render: RenderConfig,
    pub processing: ProcessingConfig,
}

impl BookConfig {
    /// Validate config values before any file is touched.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.groups.is_empty() {
            return Err(ConfigError::Validation(
                "no [[groups]] declared; run `folio gen-config` for an example".into(),
            ));
        }
        for (i, group) in self.groups.iter().enumerate() {
            check_relative(&format!("groups[{i}].folder"), &group.folder)?;
            for file in &group.files {
                check_relative(&format!("groups[{i}].files"), file)?;
            }
        }

        let ext = &self.discovery.extension;
        if ext.is_empty() || ext.contains(['.', '/', '\\']) {
            return Err(ConfigError::Validation(
                "discovery.extension must be a bare extension such as \"md\"".into(),
            ));
        }
        if self.discovery.index_width == 0 {
            return Err(ConfigError::Validation(
                "discovery.index_width must be at least 1".into(),
            ));
        }

        if self.preprocess.code_wrap_width < MIN_CODE_WRAP_WIDTH {
            return Err(ConfigError::Validation(format!(
                "preprocess.code_wrap_width must be at least {MIN_CODE_WRAP_WIDTH}"
            )));
        }
        let divider = &self.preprocess.divider;
        if divider.contains('\n')
            || crate::transform::is_dash_line(divider)
            || crate::fence::is_fence_marker(divider)
        {
            return Err(ConfigError::Validation(
                "preprocess.divider must be a single line that is neither a dash line nor a code fence"
                    .into(),
            ));
        }
        if let Err(e) = regex::Regex::new(&self.preprocess.title_pattern) {
            return Err(ConfigError::Validation(format!(
                "preprocess.title_pattern: {e}"
            )));
        }

        if self.render.dpi == 0 {
            return Err(ConfigError::Validation("render.dpi must be non-zero".into()));
        }
        let style = &self.render.style;
        for (name, value) in [
            ("image_max_width", style.image_max_width),
            ("image_max_height", style.image_max_height),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(ConfigError::Validation(format!(
                    "render.style.{name} must be in (0, 1]"
                )));
            }
        }
        Ok(())
    }
}

/// Reject paths that would leave the book root.
fn check_relative(label: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Validation(format!("{label} must not be empty")));
    }
    if value.contains('\0') {
        return Err(ConfigError::Validation(format!(
            "{label} contains a NUL byte: {value:?}"
        )));
    }
    let path = Path::new(value);
    if path.is_absolute() || value.starts_with(['/', '\\']) {
        return Err(ConfigError::Validation(format!(
            "{label} must be relative to the book root: {value:?}"
        )));
    }
    if path
        .components()
        .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)))
    {
        return Err(ConfigError::Validation(format!(
            "{label} must not contain '..': {value:?}"
        )));
    }
    Ok(())
}

/// Metadata handed to the renderer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BookMeta {
    pub title: String,
    pub subtitle: String,
    pub author: String,
    pub date: String,
    /// Copyright line. Built from date and author when empty.
    pub rights: String,
}

impl Default for BookMeta {
    fn default() -> Self {
        Self {
            title: "Untitled".to_string(),
            subtitle: String::new(),
            author: String::new(),
            date: String::new(),
            rights: String::new(),
        }
    }
}

impl BookMeta {
    /// The rights line, falling back to `Copyright (c) {date} {author}.`
    pub fn effective_rights(&self) -> Option<String> {
        if !self.rights.is_empty() {
            return Some(self.rights.clone());
        }
        if self.author.is_empty() {
            return None;
        }
        let year = if self.date.is_empty() {
            String::new()
        } else {
            format!("{} ", self.date)
        };
        Some(format!(
            "Copyright (c) {year}{}. All rights reserved.",
            self.author
        ))
    }
}

/// One declared group of chapters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GroupConfig {
    /// Source folder relative to the book root.
    pub folder: String,
    /// Divider page heading.
    pub title: String,
    /// Divider page tagline; omitted when empty.
    pub subtitle: String,
    pub kind: GroupKind,
    /// Explicit reading order, relative to `folder`. Empty walks the folder.
    pub files: Vec<String>,
}

/// Where appendix groups go relative to part groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppendixPlacement {
    /// After every part group.
    #[default]
    Last,
    /// Wherever they are declared.
    Declared,
}

/// File enumeration and ordering.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DiscoveryConfig {
    pub sort: SortPolicy,
    pub appendix_placement: AppendixPlacement,
    /// Chapter file extension without the dot, matched case-insensitively.
    pub extension: String,
    /// Minimum digits in the staged index prefix.
    pub index_width: usize,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            sort: SortPolicy::Natural,
            appendix_placement: AppendixPlacement::Last,
            extension: "md".to_string(),
            index_width: 3,
        }
    }
}

/// Which headings count as chapter titles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TitleRuleKind {
    /// Headings whose text matches `title_pattern`.
    #[default]
    Label,
    /// The first heading of each file.
    FirstHeading,
    /// Never promote.
    None,
}

/// Text normalization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PreprocessConfig {
    /// Column limit for lines inside fenced code.
    pub code_wrap_width: usize,
    /// Replacement for decorative `---` lines. Empty removes them.
    pub divider: String,
    pub title_rule: TitleRuleKind,
    /// Regex matched against heading text by the `label` rule.
    pub title_pattern: String,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            code_wrap_width: 75,
            divider: crate::transform::DEFAULT_DIVIDER.to_string(),
            title_rule: TitleRuleKind::Label,
            title_pattern: crate::transform::DEFAULT_TITLE_PATTERN.to_string(),
        }
    }
}

/// External renderer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenderConfig {
    /// Pandoc executable: a path, or a name looked up on `PATH`.
    pub pandoc: String,
    /// PDF engine executable, resolved the same way.
    pub pdf_engine: String,
    /// Output document, relative to the book root.
    pub output: String,
    /// Directory images are resolved against, relative to the book root.
    pub resource_root: String,
    pub toc: bool,
    pub document_class: String,
    pub class_options: Vec<String>,
    pub dpi: u32,
    pub geometry: GeometryConfig,
    pub fonts: FontsConfig,
    pub style: StyleConfig,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            pandoc: "pandoc".to_string(),
            pdf_engine: "xelatex".to_string(),
            output: "build/book.pdf".to_string(),
            resource_root: ".".to_string(),
            toc: true,
            document_class: "book".to_string(),
            class_options: vec!["openany".to_string()],
            dpi: 300,
            geometry: GeometryConfig::default(),
            fonts: FontsConfig::default(),
            style: StyleConfig::default(),
        }
    }
}

/// Page geometry, passed to the renderer as `geometry:` variables.
///
/// Set only here, never in the style header, so the page size is defined
/// exactly once.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeometryConfig {
    pub paper_width: String,
    pub paper_height: String,
    pub inner: String,
    pub outer: String,
    pub top: String,
    pub bottom: String,
    pub footskip: String,
    pub headsep: String,
    pub headheight: String,
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            paper_width: "210mm".to_string(),
            paper_height: "297mm".to_string(),
            inner: "25mm".to_string(),
            outer: "20mm".to_string(),
            top: "20mm".to_string(),
            bottom: "20mm".to_string(),
            footskip: "12mm".to_string(),
            headsep: "10mm".to_string(),
            headheight: "15pt".to_string(),
        }
    }
}

impl GeometryConfig {
    /// `(key, value)` pairs for every non-empty setting.
    pub fn pairs(&self) -> Vec<(&'static str, &str)> {
        [
            ("paperwidth", &self.paper_width),
            ("paperheight", &self.paper_height),
            ("inner", &self.inner),
            ("outer", &self.outer),
            ("top", &self.top),
            ("bottom", &self.bottom),
            ("footskip", &self.footskip),
            ("headsep", &self.headsep),
            ("headheight", &self.headheight),
        ]
        .into_iter()
        .filter(|(_, v)| !v.is_empty())
        .map(|(k, v)| (k, v.as_str()))
        .collect()
    }
}

/// Font families. Empty leaves the engine default.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FontsConfig {
    pub main: String,
    pub sans: String,
    pub mono: String,
}

impl Default for FontsConfig {
    fn default() -> Self {
        Self {
            main: "Cambria".to_string(),
            sans: "Calibri".to_string(),
            mono: "Consolas".to_string(),
        }
    }
}

/// Knobs for the generated LaTeX style header.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StyleConfig {
    /// Image width cap as a fraction of the line width.
    pub image_max_width: f64,
    /// Image height cap as a fraction of the text height.
    pub image_max_height: f64,
    /// LaTeX size command for code blocks, without the backslash.
    pub code_font_size: String,
    /// Page numbers, book title and chapter title in the page head.
    pub running_header: bool,
    /// Pin figures where they appear instead of letting them float.
    pub lock_figures: bool,
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            image_max_width: 1.0,
            image_max_height: 0.35,
            code_font_size: "footnotesize".to_string(),
            running_header: true,
            lock_figures: true,
        }
    }
}

/// Parallel normalization settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum normalization workers. Absent means one per CPU core.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

// =============================================================================
// Loading and merging
// =============================================================================

/// The stock defaults as a TOML table, the base every user file merges onto.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(BookConfig::default()).expect("default config must serialize")
}

/// Deep-merge `overlay` onto `base`. Tables merge key by key; anything else
/// (including arrays such as `groups`) is replaced wholesale.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Read a config file as raw TOML. A missing file is `Ok(None)`.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional user table onto `base`, deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<BookConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: BookConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load `book.toml` (or whatever `path` names) over the stock defaults.
pub fn load_config(path: &Path) -> Result<BookConfig, ConfigError> {
    resolve_config(stock_defaults_value(), load_raw_config(path)?)
}

/// A fully documented `book.toml` with every default spelled out.
pub fn stock_config_toml() -> &'static str {
    r##"# Folio Book Configuration
# ========================
# Place this file in the book root as book.toml.
# Everything except [[groups]] is optional; values shown are the defaults.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Document metadata
# ---------------------------------------------------------------------------
[book]
title = "Untitled"
subtitle = ""
author = ""
date = ""
# Left empty, a copyright line is built from date and author.
rights = ""

# ---------------------------------------------------------------------------
# Groups, in reading order
# ---------------------------------------------------------------------------
# Each group gets a divider page before its first chapter. Folders are walked
# recursively for chapter files unless `files` lists them explicitly.
#
# [[groups]]
# folder = "Part I - Fundamentals"
# title = "Part I: Fundamentals"
# subtitle = "The essential building blocks."
#
# [[groups]]
# folder = "Appendices"
# title = "Appendices"
# kind = "appendix"
# files = ["AppendixA.md", "AppendixB.md"]

# ---------------------------------------------------------------------------
# Discovery
# ---------------------------------------------------------------------------
[discovery]
# "natural": Chapter 2 before Chapter 10, files before subfolders.
# "lexicographic": plain byte order of the relative path.
sort = "natural"

# "last": appendix groups after every part. "declared": keep file order.
appendix_placement = "last"

# Chapter file extension, matched case-insensitively.
extension = "md"

# Minimum digits in the staged filename prefix (001_...).
index_width = 3

# ---------------------------------------------------------------------------
# Preprocessing
# ---------------------------------------------------------------------------
[preprocess]
# Lines inside ``` fences longer than this are hard-wrapped.
code_wrap_width = 75

# Decorative --- lines become this token. Empty removes them.
divider = "* * *"

# Which headings are promoted to chapter level:
# "label" (matching title_pattern), "first-heading", or "none".
title_rule = "label"
title_pattern = '(?i)^(chapter|appendix)\s+(?-i:[0-9]+|[A-Z]|[IVXLC]+)\b'

# ---------------------------------------------------------------------------
# Rendering
# ---------------------------------------------------------------------------
[render]
# Executables: a path, or a name found on PATH.
pandoc = "pandoc"
pdf_engine = "xelatex"

# Output document, relative to the book root.
output = "build/book.pdf"

# Images are resolved against this directory.
resource_root = "."

toc = true
document_class = "book"
class_options = ["openany"]
dpi = 300

[render.geometry]
paper_width = "210mm"
paper_height = "297mm"
inner = "25mm"
outer = "20mm"
top = "20mm"
bottom = "20mm"
footskip = "12mm"
headsep = "10mm"
headheight = "15pt"

# Empty leaves the engine default.
[render.fonts]
main = "Cambria"
sans = "Calibri"
mono = "Consolas"

[render.style]
# Fraction of the line width / text height an image may take.
image_max_width = 1.0
image_max_height = 0.35
code_font_size = "footnotesize"
running_header = true
lock_figures = true

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel normalization workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn with_group() -> BookConfig {
        BookConfig {
            groups: vec![GroupConfig {
                folder: "Part I".to_string(),
                title: "Part I".to_string(),
                ..GroupConfig::default()
            }],
            ..BookConfig::default()
        }
    }

    fn validation_message(config: &BookConfig) -> String {
        match config.validate() {
            Err(ConfigError::Validation(msg)) => msg,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn default_config_values() {
        let config = BookConfig::default();
        assert_eq!(config.discovery.sort, SortPolicy::Natural);
        assert_eq!(config.discovery.appendix_placement, AppendixPlacement::Last);
        assert_eq!(config.discovery.extension, "md");
        assert_eq!(config.preprocess.code_wrap_width, 75);
        assert_eq!(config.preprocess.divider, "* * *");
        assert_eq!(config.render.resource_root, ".");
        assert_eq!(config.render.geometry.paper_width, "210mm");
    }

    #[test]
    fn parse_groups_in_declared_order() {
        let toml = r#"
[[groups]]
folder = "Appendices"
title = "Appendices"
kind = "appendix"
files = ["B.md", "A.md"]

[[groups]]
folder = "Part I"
title = "Part I: Basics"
subtitle = "Start here."
"#;
        let config: BookConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.groups.len(), 2);
        assert_eq!(config.groups[0].kind, GroupKind::Appendix);
        assert_eq!(config.groups[0].files, vec!["B.md", "A.md"]);
        assert_eq!(config.groups[1].kind, GroupKind::Part);
        assert_eq!(config.groups[1].subtitle, "Start here.");
        config.validate().unwrap();
    }

    #[test]
    fn parse_enum_spellings() {
        let toml = r#"
[discovery]
sort = "lexicographic"
appendix_placement = "declared"

[preprocess]
title_rule = "first-heading"
"#;
        let config: BookConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.discovery.sort, SortPolicy::Lexicographic);
        assert_eq!(config.discovery.appendix_placement, AppendixPlacement::Declared);
        assert_eq!(config.preprocess.title_rule, TitleRuleKind::FirstHeading);
    }

    #[test]
    fn unknown_keys_rejected() {
        let result: Result<BookConfig, _> = toml::from_str("[discovery]\nsrot = \"natural\"\n");
        assert!(result.is_err());
        let result: Result<BookConfig, _> =
            toml::from_str("[[groups]]\nfolder = \"a\"\ntitel = \"x\"\n");
        assert!(result.is_err());
    }

    // =========================================================================
    // Validation
    // =========================================================================

    #[test]
    fn empty_group_list_rejected() {
        assert!(validation_message(&BookConfig::default()).contains("groups"));
    }

    #[test]
    fn group_folder_must_stay_inside_root() {
        for folder in ["", "  ", "/abs/path", "../outside", "a/../../b", "nul\0byte"] {
            let mut config = with_group();
            config.groups[0].folder = folder.to_string();
            validation_message(&config);
        }
        let mut config = with_group();
        config.groups[0].folder = "Part I/Sub section".to_string();
        config.validate().unwrap();
    }

    #[test]
    fn group_files_must_stay_inside_folder() {
        let mut config = with_group();
        config.groups[0].files = vec!["ok.md".into(), "../escape.md".into()];
        assert!(validation_message(&config).contains("groups[0].files"));
    }

    #[test]
    fn extension_must_be_bare() {
        for ext in ["", ".md", "a/b"] {
            let mut config = with_group();
            config.discovery.extension = ext.to_string();
            validation_message(&config);
        }
    }

    #[test]
    fn wrap_width_minimum() {
        let mut config = with_group();
        config.preprocess.code_wrap_width = MIN_CODE_WRAP_WIDTH - 1;
        assert!(validation_message(&config).contains("code_wrap_width"));
        config.preprocess.code_wrap_width = MIN_CODE_WRAP_WIDTH;
        config.validate().unwrap();
    }

    #[test]
    fn zero_index_width_rejected() {
        let mut config = with_group();
        config.discovery.index_width = 0;
        validation_message(&config);
    }

    #[test]
    fn divider_token_must_not_be_ambiguous() {
        for token in ["---", "-----", "```", "a\nb"] {
            let mut config = with_group();
            config.preprocess.divider = token.to_string();
            assert!(validation_message(&config).contains("divider"), "{token:?}");
        }
        let mut config = with_group();
        config.preprocess.divider = String::new();
        config.validate().unwrap();
    }

    #[test]
    fn invalid_title_pattern_rejected() {
        let mut config = with_group();
        config.preprocess.title_pattern = "([unclosed".to_string();
        assert!(validation_message(&config).contains("title_pattern"));
    }

    #[test]
    fn image_caps_must_be_fractions() {
        let mut config = with_group();
        config.render.style.image_max_height = 0.0;
        validation_message(&config);
        config.render.style.image_max_height = 1.5;
        validation_message(&config);
    }

    // =========================================================================
    // Metadata
    // =========================================================================

    #[test]
    fn rights_built_from_date_and_author() {
        let meta = BookMeta {
            author: "A. Writer".to_string(),
            date: "2025".to_string(),
            ..BookMeta::default()
        };
        assert_eq!(
            meta.effective_rights().unwrap(),
            "Copyright (c) 2025 A. Writer. All rights reserved."
        );
    }

    #[test]
    fn explicit_rights_win() {
        let meta = BookMeta {
            author: "A".to_string(),
            rights: "CC BY 4.0".to_string(),
            ..BookMeta::default()
        };
        assert_eq!(meta.effective_rights().unwrap(), "CC BY 4.0");
        assert_eq!(BookMeta::default().effective_rights(), None);
    }

    #[test]
    fn geometry_pairs_skip_empty() {
        let geometry = GeometryConfig {
            footskip: String::new(),
            ..GeometryConfig::default()
        };
        let pairs = geometry.pairs();
        assert_eq!(pairs[0], ("paperwidth", "210mm"));
        assert!(!pairs.iter().any(|(k, _)| *k == "footskip"));
    }

    #[test]
    fn effective_threads_user_constrains_down() {
        let config = ProcessingConfig {
            max_processes: Some(1),
        };
        assert_eq!(effective_threads(&config), 1);
        let auto = effective_threads(&ProcessingConfig::default());
        assert!(auto >= 1);
    }

    // =========================================================================
    // Loading and merging
    // =========================================================================

    #[test]
    fn merge_replaces_arrays_and_merges_tables() {
        let base: toml::Value = toml::from_str(
            "groups = [{ folder = \"a\" }]\n[render]\npandoc = \"pandoc\"\ntoc = true\n",
        )
        .unwrap();
        let overlay: toml::Value =
            toml::from_str("groups = [{ folder = \"b\" }]\n[render]\ntoc = false\n").unwrap();
        let merged = merge_toml(base, overlay);
        let groups = merged["groups"].as_array().unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0]["folder"].as_str(), Some("b"));
        assert_eq!(merged["render"]["pandoc"].as_str(), Some("pandoc"));
        assert_eq!(merged["render"]["toc"].as_bool(), Some(false));
    }

    #[test]
    fn load_config_missing_file_needs_groups() {
        let tmp = TempDir::new().unwrap();
        let result = load_config(&tmp.path().join("book.toml"));
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn load_config_reads_sparse_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("book.toml");
        fs::write(
            &path,
            r#"
[book]
title = "Handbook"

[[groups]]
folder = "Part I"
title = "Part I"

[render.geometry]
inner = "30mm"
"#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.book.title, "Handbook");
        assert_eq!(config.groups.len(), 1);
        assert_eq!(config.render.geometry.inner, "30mm");
        // Untouched defaults survive the merge
        assert_eq!(config.render.geometry.outer, "20mm");
        assert_eq!(config.preprocess.code_wrap_width, 75);
    }

    #[test]
    fn load_config_surfaces_parse_errors() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("book.toml");
        fs::write(&path, "[book\ntitle = 1").unwrap();
        assert!(matches!(load_config(&path), Err(ConfigError::Toml(_))));
    }

    #[test]
    fn stock_defaults_value_has_all_sections() {
        let val = stock_defaults_value();
        assert!(val.is_table());
        for key in ["book", "groups", "discovery", "preprocess", "render", "processing"] {
            assert!(val.get(key).is_some(), "missing {key}");
        }
    }

    #[test]
    fn stock_config_toml_roundtrips_to_defaults() {
        let config: BookConfig = toml::from_str(stock_config_toml()).unwrap();
        let defaults = BookConfig::default();
        assert!(config.groups.is_empty());
        assert_eq!(config.book.title, defaults.book.title);
        assert_eq!(config.discovery.index_width, defaults.discovery.index_width);
        assert_eq!(config.preprocess.title_pattern, defaults.preprocess.title_pattern);
        assert_eq!(config.preprocess.divider, defaults.preprocess.divider);
        assert_eq!(config.render.class_options, defaults.render.class_options);
        assert_eq!(config.render.geometry.headheight, defaults.render.geometry.headheight);
        assert_eq!(config.render.fonts.mono, defaults.render.fonts.mono);
        assert_eq!(config.render.style.image_max_height, defaults.render.style.image_max_height);
        assert_eq!(config.processing.max_processes, None);
    }
}
