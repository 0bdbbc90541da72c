//! Fenced code tracking.
//!
//! A two-state automaton (outside / inside a fence) driven line by line by
//! triple-backtick marker lines. A marker is a line whose first non-space
//! character is the start of `` ``` `` and that is indented by at most three
//! spaces; any marker toggles the state. An unterminated fence runs to the
//! end of the text.
//!
//! [`regions`] splits a text into alternating prose and code regions so that
//! prose rules never touch code and code rules never touch prose. Marker lines
//! belong to their code region and are never modified.

/// Which side of a fence the scanner is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FenceState {
    #[default]
    Outside,
    Inside,
}

/// What a single line turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineRole {
    Prose,
    Marker,
    Code,
}

impl FenceState {
    /// Advance the automaton by one line.
    pub fn step(self, line: &str) -> (FenceState, LineRole) {
        match (self, is_fence_marker(line)) {
            (FenceState::Outside, true) => (FenceState::Inside, LineRole::Marker),
            (FenceState::Inside, true) => (FenceState::Outside, LineRole::Marker),
            (FenceState::Outside, false) => (FenceState::Outside, LineRole::Prose),
            (FenceState::Inside, false) => (FenceState::Inside, LineRole::Code),
        }
    }
}

/// True if the line opens or closes a fence.
///
/// Any indentation counts, so fences nested in list items are code too.
pub fn is_fence_marker(line: &str) -> bool {
    line.trim_start().starts_with("```")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionKind {
    Prose,
    Code,
}

/// A run of consecutive lines of one kind.
///
/// Code regions include their opening and (if present) closing marker lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region<'a> {
    pub kind: RegionKind,
    pub lines: Vec<&'a str>,
}

/// Split `text` on `\n` into prose and code regions.
///
/// Joining every region's lines with `\n`, and the regions themselves with
/// `\n`, reproduces `text` exactly.
pub fn regions(text: &str) -> Vec<Region<'_>> {
    let mut out: Vec<Region<'_>> = Vec::new();
    let mut state = FenceState::Outside;

    for line in text.split('\n') {
        let (next, role) = state.step(line);
        let kind = match role {
            LineRole::Prose => RegionKind::Prose,
            LineRole::Marker | LineRole::Code => RegionKind::Code,
        };
        // An opening marker always starts a fresh code region, even when it
        // directly follows a closing one.
        let opens = role == LineRole::Marker && state == FenceState::Outside;
        match out.last_mut() {
            Some(region) if region.kind == kind && !opens => region.lines.push(line),
            _ => out.push(Region {
                kind,
                lines: vec![line],
            }),
        }
        state = next;
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(text: &str) -> Vec<(RegionKind, usize)> {
        regions(text)
            .iter()
            .map(|r| (r.kind, r.lines.len()))
            .collect()
    }

    #[test]
    fn marker_detection() {
        assert!(is_fence_marker("```"));
        assert!(is_fence_marker("```rust"));
        assert!(is_fence_marker("   ```"));
        assert!(is_fence_marker("    ```bash"));
        assert!(is_fence_marker("\t```"));
        assert!(!is_fence_marker("``"));
        assert!(!is_fence_marker("text ```"));
    }

    #[test]
    fn automaton_toggles_on_markers() {
        let (state, role) = FenceState::Outside.step("```sh");
        assert_eq!((state, role), (FenceState::Inside, LineRole::Marker));
        let (state, role) = state.step("ls -la");
        assert_eq!((state, role), (FenceState::Inside, LineRole::Code));
        let (state, role) = state.step("```");
        assert_eq!((state, role), (FenceState::Outside, LineRole::Marker));
        let (state, role) = state.step("prose");
        assert_eq!((state, role), (FenceState::Outside, LineRole::Prose));
    }

    #[test]
    fn splits_prose_and_code() {
        let text = "intro\nmore\n```\ncode\n```\nafter";
        assert_eq!(
            kinds(text),
            vec![
                (RegionKind::Prose, 2),
                (RegionKind::Code, 3),
                (RegionKind::Prose, 1)
            ]
        );
    }

    #[test]
    fn unterminated_fence_runs_to_end() {
        let text = "intro\n```\ncode\nstill code";
        assert_eq!(
            kinds(text),
            vec![(RegionKind::Prose, 1), (RegionKind::Code, 3)]
        );
    }

    #[test]
    fn adjacent_fences_are_separate_regions() {
        let text = "```\na\n```\n```\nb\n```";
        assert_eq!(
            kinds(text),
            vec![(RegionKind::Code, 3), (RegionKind::Code, 3)]
        );
    }

    #[test]
    fn regions_reassemble_to_input() {
        let text = "a\n\n```py\nx = 1\n```\n\nb\n";
        let rebuilt = regions(text)
            .iter()
            .map(|r| r.lines.join("\n"))
            .collect::<Vec<_>>()
            .join("\n");
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn fence_inside_list_item_is_code() {
        let text = "1. Step one\n\n    ```bash\n    make install\n    ```\n2. Step two";
        assert_eq!(
            kinds(text),
            vec![
                (RegionKind::Prose, 2),
                (RegionKind::Code, 3),
                (RegionKind::Prose, 1)
            ]
        );
    }

    #[test]
    fn empty_text_is_one_prose_region() {
        assert_eq!(kinds(""), vec![(RegionKind::Prose, 1)]);
    }
}
