//! Selection of transcript lines worth showing after a passing run.

use serde::Deserialize;

/// Predicates for "interesting" lines, matched against the trimmed line.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ExcerptFilter {
    /// Keep lines starting with any of these (echoed commands, result prefixes).
    #[serde(default)]
    pub prefixes: Vec<String>,
    /// Keep lines equal to any of these (expected directory entries).
    #[serde(default)]
    pub lines: Vec<String>,
}

impl ExcerptFilter {
    pub fn keeps(&self, line: &str) -> bool {
        let trimmed = line.trim();
        self.prefixes
            .iter()
            .any(|prefix| trimmed.starts_with(prefix.as_str()))
            || self.lines.iter().any(|exact| trimmed == exact)
    }

    /// Matching lines of `text`, untrimmed, limited to the last `limit`.
    pub fn excerpt<'a>(&self, text: &'a str, limit: usize) -> Vec<&'a str> {
        let kept: Vec<&str> = text.lines().filter(|line| self.keeps(line)).collect();
        let start = kept.len().saturating_sub(limit);
        kept[start..].to_vec()
    }
}
