//! Scripted, deadline-bounded boot console checks.
//!
//! A scenario names a command script and the expectations its transcript must
//! meet. The harness boots the emulator, waits for the console prompt, types
//! the script once, collects everything the console prints until it exits or
//! the deadline passes, then verifies and reports.
//!
//! - **[`core`]**: Pure, deterministic logic (transcript, prompt watcher,
//!   session state machine, section extraction, verification). No I/O.
//! - **[`io`]**: Side-effecting operations (configuration from the
//!   environment, process launch, the I/O pump, build step, disk images).
//!
//! [`run`] ties them together for one scenario; [`report`] and [`outcome`]
//! turn a verified transcript into output and an exit status.

pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod outcome;
pub mod report;
pub mod run;
pub mod scenario;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
