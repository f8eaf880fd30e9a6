//! Human-readable results of a console session.
//!
//! Failures go to stderr: the verification summary, the artifacts and
//! command line needed to reproduce the run, then the transcript tail.
//! Successes print a filtered excerpt to stdout.

use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;

use crate::core::excerpt::ExcerptFilter;
use crate::core::transcript::tail_lines;
use crate::core::verifier::VerificationResult;

/// What was launched, for reproduction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchSummary {
    /// Labeled artifact paths in print order (`kernel`, `initrd`, ...).
    pub artifacts: Vec<(String, PathBuf)>,
    pub command_line: String,
}

impl LaunchSummary {
    pub fn new(command_line: impl Into<String>) -> Self {
        Self {
            artifacts: Vec::new(),
            command_line: command_line.into(),
        }
    }

    pub fn with_artifact(mut self, label: &str, path: impl Into<PathBuf>) -> Self {
        self.artifacts.push((label.to_string(), path.into()));
        self
    }
}

/// The parts of a finished session a failure report needs.
#[derive(Debug, Clone, Copy)]
pub struct FailureContext<'a> {
    pub label: &'a str,
    pub text: &'a str,
    pub tail_lines: usize,
    /// Set when the session hit its deadline.
    pub timed_out_after: Option<Duration>,
    pub prompt_seen: bool,
    pub script_sent: bool,
}

pub fn write_failure<W: Write>(
    out: &mut W,
    ctx: &FailureContext<'_>,
    result: &VerificationResult,
    launch: &LaunchSummary,
) -> io::Result<()> {
    if !result.missing.is_empty() {
        writeln!(
            out,
            "error: {} failed; missing: {}",
            ctx.label,
            result.missing.join(", ")
        )?;
    }
    if !result.violated.is_empty() {
        writeln!(
            out,
            "error: {} failed; violated: {}",
            ctx.label,
            result.violated.join(", ")
        )?;
    }
    for (label, path) in &launch.artifacts {
        writeln!(out, "{label}: {}", path.display())?;
    }
    writeln!(out, "cmd: {}", launch.command_line)?;
    if let Some(timeout) = ctx.timed_out_after {
        write_timeout_note(out, timeout)?;
    }
    if !ctx.prompt_seen {
        writeln!(out, "note: console prompt never appeared; script not sent")?;
    } else if !ctx.script_sent {
        writeln!(out, "note: script was not fully written to the console")?;
    }
    writeln!(out)?;
    for line in tail_lines(ctx.text, ctx.tail_lines) {
        writeln!(out, "{line}")?;
    }
    Ok(())
}

/// Print the filtered excerpt of a passing transcript.
pub fn write_success<W: Write>(
    out: &mut W,
    filter: &ExcerptFilter,
    text: &str,
    limit: usize,
) -> io::Result<()> {
    for line in filter.excerpt(text, limit) {
        writeln!(out, "{line}")?;
    }
    Ok(())
}

pub fn write_timeout_note<W: Write>(out: &mut W, timeout: Duration) -> io::Result<()> {
    writeln!(
        out,
        "note: emulator did not exit; killed after TIMEOUT={}s",
        timeout.as_secs()
    )
}
