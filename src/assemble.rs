//! Hand-off to the external renderer.
//!
//! The staged files are already in document order; this module adds what
//! the renderer needs alongside them and runs it:
//!
//! - group divider pages ([`divider_markdown`]), staged with the chapters
//! - a LaTeX style header ([`style_header`]) written as `header.tex`
//! - document metadata ([`metadata_yaml`]) written as `meta.yaml`
//!
//! [`assemble`] writes the two side files and returns a [`RenderJob`]; a
//! [`Renderer`] turns the job into a document. [`PandocRenderer`] is the
//! production renderer. It builds an explicit argument vector
//! ([`PandocRenderer::arguments`]) so the invocation can be inspected
//! without running pandoc.
//!
//! Page geometry is passed only as `-V geometry:` variables and never loaded
//! in the header, so the page size is defined exactly once. Two definitions
//! make some pages use the wrong text width.

use crate::config::{BookConfig, BookMeta, RenderConfig, StyleConfig};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Required tool not found: {0} (set its path in [render] or install it on PATH)")]
    ToolNotFound(String),
    #[error("Renderer failed ({status}):\n{stderr}")]
    Failed { status: ExitStatus, stderr: String },
}

/// Markdown for a group's title page.
///
/// The subtitle line is left out when empty.
pub fn divider_markdown(title: &str, subtitle: &str) -> String {
    let mut page = format!("\n\\newpage\n\n# {title}\n\n");
    if !subtitle.is_empty() {
        page.push_str(&format!("*{subtitle}*\n\n"));
    }
    page.push_str("\\newpage\n\n");
    page
}

/// LaTeX preamble additions: image caps, figure locking, code wrapping and
/// running headers.
pub fn style_header(book: &BookMeta, style: &StyleConfig) -> String {
    let mut tex = String::from(
        "\\usepackage{graphicx}\n\
         \\usepackage{float}\n\
         \\usepackage{fvextra}\n\
         \\usepackage{booktabs}\n\
         \\usepackage{longtable}\n\
         \\usepackage{fancyhdr}\n\
         \\usepackage{xurl}\n\
         \\usepackage{placeins}\n",
    );

    tex.push_str("\n% Image size caps\n\\makeatletter\n");
    tex.push_str(&format!(
        "\\def\\maxwidth{{\\ifdim\\Gin@nat@width>{w}\\linewidth {w}\\linewidth\\else\\Gin@nat@width\\fi}}\n",
        w = latex_fraction(style.image_max_width)
    ));
    tex.push_str(&format!(
        "\\def\\maxheight{{\\ifdim\\Gin@nat@height>{h}\\textheight {h}\\textheight\\else\\Gin@nat@height\\fi}}\n",
        h = latex_fraction(style.image_max_height)
    ));
    tex.push_str("\\makeatother\n\\setkeys{Gin}{width=\\maxwidth,height=\\maxheight,keepaspectratio}\n");

    if style.lock_figures {
        tex.push_str(
            "\n% Figures stay where they appear\n\
             \\let\\origfigure\\figure\n\
             \\let\\origendfigure\\endfigure\n\
             \\renewenvironment{figure}[1][H]{\\origfigure[H]}{\\origendfigure}\n\
             \\let\\Oldsubsection\\subsection\n\
             \\renewcommand{\\subsection}{\\FloatBarrier\\Oldsubsection}\n",
        );
    }

    tex.push_str(&format!(
        "\n% Text and code wrapping\n\
         \\fvset{{breaklines=true,breakanywhere=true,fontsize=\\{size}}}\n\
         \\sloppy\n\
         \\setlength{{\\emergencystretch}}{{3em}}\n\
         \\tolerance=2000\n\
         \\hyphenpenalty=100\n",
        size = style.code_font_size
    ));

    if style.running_header {
        tex.push_str(&format!(
            "\n% Running headers\n\
             \\pagestyle{{fancy}}\n\
             \\fancyhf{{}}\n\
             \\fancyhead[LE,RO]{{\\thepage}}\n\
             \\fancyhead[RE]{{\\textit{{{title}}}}}\n\
             \\fancyhead[LO]{{\\textit{{\\leftmark}}}}\n\
             \\renewcommand{{\\headrulewidth}}{{0.4pt}}\n",
            title = latex_escape(&book.title)
        ));
    }

    tex.push_str("\\providecommand{\\tightlist}{%\n  \\setlength{\\itemsep}{0pt}\\setlength{\\parskip}{0pt}}\n");
    tex
}

/// `1` for a full width, otherwise the fraction as written (`0.35`).
fn latex_fraction(value: f64) -> String {
    if value >= 1.0 {
        String::new()
    } else {
        format!("{value}")
    }
}

/// Escape characters that are special in LaTeX text.
pub fn latex_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\textbackslash{}"),
            '{' | '}' | '$' | '&' | '#' | '%' | '_' => {
                out.push('\\');
                out.push(c);
            }
            '~' => out.push_str("\\textasciitilde{}"),
            '^' => out.push_str("\\textasciicircum{}"),
            _ => out.push(c),
        }
    }
    out
}

/// Document metadata as YAML. Empty fields are left out.
pub fn metadata_yaml(book: &BookMeta) -> String {
    let rights = book.effective_rights().unwrap_or_default();
    [
        ("title", book.title.as_str()),
        ("subtitle", book.subtitle.as_str()),
        ("author", book.author.as_str()),
        ("date", book.date.as_str()),
        ("rights", rights.as_str()),
    ]
    .into_iter()
    .filter(|(_, value)| !value.is_empty())
    .map(|(key, value)| format!("{key}: {}\n", yaml_string(value)))
    .collect()
}

/// A JSON string literal is a valid YAML double-quoted scalar.
fn yaml_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| format!("\"{value}\""))
}

/// Everything the renderer is handed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderJob {
    /// Staged files, in document order.
    pub inputs: Vec<PathBuf>,
    pub header: PathBuf,
    pub metadata: PathBuf,
    /// Directory images are resolved against.
    pub resource_root: PathBuf,
    pub output: PathBuf,
}

/// Write `header.tex` and `meta.yaml` next to the staged files and describe
/// the render.
pub fn assemble(
    root: &Path,
    staging_dir: &Path,
    staged: &[PathBuf],
    config: &BookConfig,
) -> Result<RenderJob, RenderError> {
    let header = staging_dir.join("header.tex");
    fs::write(&header, style_header(&config.book, &config.render.style))?;
    let metadata = staging_dir.join("meta.yaml");
    fs::write(&metadata, metadata_yaml(&config.book))?;

    Ok(RenderJob {
        inputs: staged.to_vec(),
        header,
        metadata,
        resource_root: root.join(&config.render.resource_root),
        output: root.join(&config.render.output),
    })
}

/// Turns a staged book into a document.
pub trait Renderer {
    fn render(&self, job: &RenderJob) -> Result<(), RenderError>;
}

/// Renders through pandoc and a LaTeX engine.
#[derive(Debug, Clone)]
pub struct PandocRenderer {
    pub pandoc: PathBuf,
    pub pdf_engine: PathBuf,
    pub settings: RenderConfig,
}

impl PandocRenderer {
    /// Resolve both executables; either missing is an error.
    pub fn from_config(settings: &RenderConfig) -> Result<Self, RenderError> {
        let pandoc = find_executable(&settings.pandoc)
            .ok_or_else(|| RenderError::ToolNotFound(settings.pandoc.clone()))?;
        let pdf_engine = find_executable(&settings.pdf_engine)
            .ok_or_else(|| RenderError::ToolNotFound(settings.pdf_engine.clone()))?;
        Ok(Self {
            pandoc,
            pdf_engine,
            settings: settings.clone(),
        })
    }

    /// The full pandoc argument vector for `job`, program name excluded.
    pub fn arguments(&self, job: &RenderJob) -> Vec<OsString> {
        let s = &self.settings;
        let mut args: Vec<OsString> = job.inputs.iter().map(|p| p.clone().into_os_string()).collect();

        // Staged files carry no YAML blocks; a stray `---` pair must stay text.
        args.push("-f".into());
        args.push("markdown-yaml_metadata_block".into());
        args.push("--metadata-file".into());
        args.push(job.metadata.clone().into_os_string());
        args.push(prefixed("--pdf-engine=", &self.pdf_engine));
        args.push(prefixed("--resource-path=", &job.resource_root));
        args.push("-H".into());
        args.push(job.header.clone().into_os_string());
        if s.toc {
            args.push("--toc".into());
        }
        args.push("--top-level-division=chapter".into());

        let mut variables: Vec<String> = Vec::new();
        if !s.document_class.is_empty() {
            variables.push(format!("documentclass={}", s.document_class));
        }
        for option in &s.class_options {
            variables.push(format!("classoption={option}"));
        }
        for (key, value) in s.geometry.pairs() {
            variables.push(format!("geometry:{key}={value}"));
        }
        for (key, value) in [
            ("mainfont", &s.fonts.main),
            ("sansfont", &s.fonts.sans),
            ("monofont", &s.fonts.mono),
        ] {
            if !value.is_empty() {
                variables.push(format!("{key}={value}"));
            }
        }
        for variable in variables {
            args.push("-V".into());
            args.push(variable.into());
        }

        args.push(format!("--dpi={}", s.dpi).into());
        args.push("-o".into());
        args.push(job.output.clone().into_os_string());
        args
    }
}

fn prefixed(flag: &str, path: &Path) -> OsString {
    let mut arg = OsString::from(flag);
    arg.push(path.as_os_str());
    arg
}

impl Renderer for PandocRenderer {
    fn render(&self, job: &RenderJob) -> Result<(), RenderError> {
        if let Some(parent) = job.output.parent() {
            fs::create_dir_all(parent)?;
        }
        let output = Command::new(&self.pandoc)
            .args(self.arguments(job))
            .output()?;
        if !output.status.success() {
            return Err(RenderError::Failed {
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        Ok(())
    }
}

/// Locate an executable: `configured` itself if it names an existing file,
/// otherwise its file name looked up on `PATH`.
pub fn find_executable(configured: &str) -> Option<PathBuf> {
    let direct = Path::new(configured);
    if !configured.is_empty() && direct.is_file() {
        return Some(direct.to_path_buf());
    }
    let name = direct.file_name()?;
    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var).find_map(|dir| {
        let candidate = dir.join(name);
        if candidate.is_file() {
            return Some(candidate);
        }
        if cfg!(windows) {
            let exe = candidate.with_extension("exe");
            if exe.is_file() {
                return Some(exe);
            }
        }
        None
    })
}
