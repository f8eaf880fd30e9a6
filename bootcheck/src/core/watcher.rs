//! Readiness detection over the transcript's trailing window.

use crate::core::transcript::Transcript;

/// Number of most recent chunks scanned on each arrival.
pub const DEFAULT_WINDOW_CHUNKS: usize = 8;

/// Shell prompt that signals the console accepts input.
///
/// The prompt counts when it starts a line somewhere in the window, or when
/// the output currently ends with it (the prompt is the very first output, or
/// the console is sitting at the prompt waiting for a line).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadinessMarker {
    prompt: String,
}

impl ReadinessMarker {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
        }
    }

    pub fn matches(&self, window: &[u8]) -> bool {
        let prompt = self.prompt.as_bytes();
        if prompt.is_empty() {
            return false;
        }
        let mut at_line_start = Vec::with_capacity(prompt.len() + 1);
        at_line_start.push(b'\n');
        at_line_start.extend_from_slice(prompt);
        contains(window, &at_line_start) || window.ends_with(prompt)
    }
}

/// Fires once, on the first arrival whose window shows the readiness marker.
#[derive(Debug, Clone)]
pub struct PromptWatcher {
    marker: ReadinessMarker,
    window_chunks: usize,
    fired: bool,
}

impl PromptWatcher {
    pub fn new(marker: ReadinessMarker, window_chunks: usize) -> Self {
        Self {
            marker,
            window_chunks: window_chunks.max(1),
            fired: false,
        }
    }

    /// Inspect the transcript after a chunk arrival.
    ///
    /// Returns `true` exactly once per watcher; every later call is a no-op
    /// returning `false`, even when the marker shows up again.
    pub fn observe(&mut self, transcript: &Transcript) -> bool {
        if self.fired {
            return false;
        }
        if self.marker.matches(&transcript.window(self.window_chunks)) {
            self.fired = true;
            return true;
        }
        false
    }

    pub fn has_fired(&self) -> bool {
        self.fired
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    if needle.len() > haystack.len() {
        return false;
    }
    haystack
        .windows(needle.len())
        .any(|window| window == needle)
}
