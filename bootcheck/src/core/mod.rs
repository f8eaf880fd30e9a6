//! Deterministic, pure logic for console sessions.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! transcripts and configuration and return deterministic outputs suitable
//! for tests.

pub mod excerpt;
pub mod section;
pub mod session_state;
pub mod transcript;
pub mod verifier;
pub mod watcher;
