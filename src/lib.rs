//! # Folio
//!
//! Turns a tree of Markdown chapters into one print-ready book. Groups of
//! chapters are declared in `book.toml` in reading order; everything else
//! (which files exist, in what order they appear) comes from the filesystem.
//!
//! # Architecture: Stage, Then Render
//!
//! ```text
//! 1. Discover  book.toml + folders  →  groups           (no file contents read)
//! 2. Plan      groups               →  numbered entries (document order)
//! 3. Stage     entries              →  staging/NNN_*.md (normalized copies)
//! 4. Render    staging/             →  book.pdf         (pandoc + LaTeX)
//! ```
//!
//! Stages 1 and 2 are pure enough to back `folio check`, which prints the
//! document order without writing anything. Stage 3 reads every chapter in
//! parallel and only writes once all of them have normalized cleanly, so a
//! bad file never leaves a half-written staging directory behind. Stage 4 is
//! behind the [`assemble::Renderer`] trait; the default implementation
//! drives pandoc.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`discover`] | Walks group folders, plans the document order, writes staged files |
//! | [`preprocess`] | The per-chapter normalization pipeline |
//! | [`transform`] | Individual text rewrites: frontmatter, dividers, images, links, headings, code wrapping |
//! | [`fence`] | Splits text into prose and fenced-code regions |
//! | [`paths`] | Root-relative path normalization for image references |
//! | [`naming`] | Natural ordering and `NNN_stem.md` staged filenames |
//! | [`assemble`] | LaTeX header, metadata file, and the pandoc renderer |
//! | [`config`] | `book.toml` loading, merging with stock defaults, and validation |
//! | [`types`] | Shared types passed between discovery, staging and assembly |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Rewrites Never Touch Code
//!
//! Every prose rule (dividers, `<img>` tags, image paths, cross-links,
//! headings) runs only on the prose regions found by [`fence::regions`].
//! Fenced code is copied verbatim except for hard-wrapping long lines, which
//! would otherwise run off the printed page.
//!
//! ## Normalization Is Idempotent
//!
//! Running the pipeline over its own output changes nothing. Staging the same
//! tree twice yields byte-identical files, and already-clean chapters pass
//! through untouched.
//!
//! ## Geometry Lives In One Place
//!
//! Page size and margins are passed to pandoc as `-V geometry:` variables.
//! The generated LaTeX header never loads the geometry package itself, so
//! there is exactly one source of truth for the page layout.

pub mod assemble;
pub mod config;
pub mod discover;
pub mod fence;
pub mod naming;
pub mod output;
pub mod paths;
pub mod preprocess;
pub mod transform;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
