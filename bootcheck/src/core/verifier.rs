//! Transcript verification against configured expectations.

use std::fmt;

use crate::core::section::{SectionRule, extract_section};

/// One configured check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expectation {
    /// Must occur somewhere in the transcript.
    Required(String),
    /// Must not occur anywhere in the transcript.
    Forbidden(String),
    /// Structural rule over the output of one echoed command.
    Section(SectionRule),
}

/// Outcome of verifying one transcript.
///
/// Both lists keep configuration order; nothing is short-circuited.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerificationResult {
    pub missing: Vec<String>,
    pub violated: Vec<String>,
}

impl VerificationResult {
    pub fn passed(&self) -> bool {
        self.missing.is_empty() && self.violated.is_empty()
    }
}

impl fmt::Display for VerificationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.passed() {
            return write!(f, "passed");
        }
        let mut parts = Vec::new();
        if !self.missing.is_empty() {
            parts.push(format!("missing: {}", self.missing.join(", ")));
        }
        if !self.violated.is_empty() {
            parts.push(format!("violated: {}", self.violated.join(", ")));
        }
        write!(f, "{}", parts.join("; "))
    }
}

/// Verify `text` against `expectations`.
///
/// Required substrings are checked first, then forbidden substrings, then
/// section rules. `prompt` bounds sections.
pub fn verify(text: &str, expectations: &[Expectation], prompt: &str) -> VerificationResult {
    let mut result = VerificationResult::default();

    for expectation in expectations {
        if let Expectation::Required(needle) = expectation
            && !text.contains(needle.as_str())
        {
            result.missing.push(quote(needle));
        }
    }

    for expectation in expectations {
        if let Expectation::Forbidden(needle) = expectation
            && text.contains(needle.as_str())
        {
            result.violated.push(quote(needle));
        }
    }

    for expectation in expectations {
        if let Expectation::Section(rule) = expectation {
            check_section(text, rule, prompt, &mut result);
        }
    }

    result
}

fn check_section(text: &str, rule: &SectionRule, prompt: &str, result: &mut VerificationResult) {
    let scope = quote(&rule.marker);
    let Some(lines) = extract_section(text, &rule.marker, prompt) else {
        result.missing.push(format!("section {scope}"));
        return;
    };

    if rule.non_empty && lines.is_empty() {
        result.missing.push(format!("output in section {scope}"));
    }
    for wanted in &rule.contains_line {
        if !lines.iter().any(|line| *line == wanted.trim()) {
            result
                .missing
                .push(format!("line {} in section {scope}", quote(wanted)));
        }
    }

    let blob = lines.join("\n");
    for wanted in &rule.contains {
        if !blob.contains(wanted.as_str()) {
            result
                .missing
                .push(format!("{} in section {scope}", quote(wanted)));
        }
    }
    for banned in &rule.not_contains {
        if blob.contains(banned.as_str()) {
            result
                .violated
                .push(format!("{} in section {scope}", quote(banned)));
        }
    }
}

/// Render a pattern for diagnostics, making embedded newlines visible.
fn quote(pattern: &str) -> String {
    format!("{:?}", pattern)
}
