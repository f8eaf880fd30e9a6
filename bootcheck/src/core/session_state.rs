//! Session lifecycle state machine.
//!
//! Phases only move forward:
//!
//! ```text
//! Launching -> AwaitingPrompt -> Running -> Draining -> Finalized
//!                    \_____________________/
//!                   (exit/deadline before prompt)
//! ```
//!
//! Script injection is the `AwaitingPrompt -> Running` edge, so it can happen
//! at most once per session. Observation flags (`timed_out`,
//! `process_exited`) are latched and never reset.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    Launching,
    AwaitingPrompt,
    Running,
    Draining,
    Finalized,
}

/// How the scripted input was delivered, recorded once the write ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Injection {
    /// Every byte reached the child's stdin.
    Sent { after_chunk: usize },
    /// The prompt was seen but the write did not complete: the child closed
    /// its stdin, or the deadline passed with bytes still queued.
    Failed { after_chunk: usize, reason: String },
}

#[derive(Debug, Clone)]
pub struct SessionState {
    phase: Phase,
    started_at: Instant,
    deadline: Instant,
    prompt_seen: bool,
    injection: Option<Injection>,
    timed_out: bool,
    process_exited: bool,
}

impl SessionState {
    /// Start a session clock; the deadline is fixed here and never moves.
    pub fn start(now: Instant, timeout: Duration) -> Self {
        Self {
            phase: Phase::Launching,
            started_at: now,
            deadline: now + timeout,
            prompt_seen: false,
            injection: None,
            timed_out: false,
            process_exited: false,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Time left before the deadline, zero once it has passed.
    pub fn remaining(&self, now: Instant) -> Duration {
        self.deadline.saturating_duration_since(now)
    }

    pub fn deadline_passed(&self, now: Instant) -> bool {
        now >= self.deadline
    }

    /// The child is running with its pipes attached.
    pub fn launched(&mut self) {
        self.advance(Phase::AwaitingPrompt);
    }

    /// Take the injection edge. Returns `false` when the session is not
    /// awaiting the prompt, in which case nothing may be written.
    pub fn begin_injection(&mut self) -> bool {
        if self.phase != Phase::AwaitingPrompt {
            return false;
        }
        self.phase = Phase::Running;
        self.prompt_seen = true;
        true
    }

    /// Record how the injection that was begun ended: every byte written,
    /// or a write error / deadline cut it short.
    pub fn record_injection(&mut self, injection: Injection) {
        if self.prompt_seen && self.injection.is_none() {
            self.injection = Some(injection);
        }
    }

    pub fn mark_timed_out(&mut self) {
        self.timed_out = true;
    }

    pub fn mark_process_exited(&mut self) {
        self.process_exited = true;
    }

    /// The read loop is done; only the final drain remains.
    pub fn begin_drain(&mut self) {
        self.advance(Phase::Draining);
    }

    pub fn finalize(&mut self) {
        self.advance(Phase::Finalized);
    }

    pub fn prompt_seen(&self) -> bool {
        self.prompt_seen
    }

    pub fn script_sent(&self) -> bool {
        matches!(self.injection, Some(Injection::Sent { .. }))
    }

    pub fn injection(&self) -> Option<&Injection> {
        self.injection.as_ref()
    }

    pub fn timed_out(&self) -> bool {
        self.timed_out
    }

    pub fn process_exited(&self) -> bool {
        self.process_exited
    }

    fn advance(&mut self, to: Phase) {
        if to > self.phase {
            self.phase = to;
        }
    }
}
