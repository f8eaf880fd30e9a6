//! Command-scoped views of the transcript.
//!
//! A section is the output of one echoed command: every non-blank line after
//! the first line equal to the marker, up to the next prompt line.

use serde::Deserialize;

/// Structural rule evaluated against one section.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SectionRule {
    /// Echoed command line that opens the section (e.g. `# ls /dev`).
    pub marker: String,
    /// Each entry must appear as a whole (trimmed) line of the section.
    #[serde(default)]
    pub contains_line: Vec<String>,
    /// Each entry must occur somewhere in the section text.
    #[serde(default)]
    pub contains: Vec<String>,
    /// None of these may occur in the section text (error prefixes, sentinel codes).
    #[serde(default)]
    pub not_contains: Vec<String>,
    /// The section must have at least one line.
    #[serde(default)]
    pub non_empty: bool,
}

impl SectionRule {
    pub fn new(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
            ..Self::default()
        }
    }
}

/// Lines of the section opened by `marker`, trimmed, blank lines dropped.
///
/// Returns `None` when no line equals the marker. Only the first occurrence
/// of the marker is used.
pub fn extract_section<'a>(text: &'a str, marker: &str, prompt: &str) -> Option<Vec<&'a str>> {
    let marker = marker.trim();
    let mut lines = text.lines();
    lines.by_ref().find(|line| line.trim() == marker)?;

    let mut section = Vec::new();
    for line in lines {
        if !prompt.is_empty() && line.starts_with(prompt) {
            break;
        }
        let trimmed = line.trim();
        if !trimmed.is_empty() {
            section.push(trimmed);
        }
    }
    Some(section)
}
