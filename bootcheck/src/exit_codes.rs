//! Stable exit codes for the console check binaries.

use crate::io::build::BuildFailure;

/// Verification passed (a timeout note alone does not change this).
pub const OK: i32 = 0;
/// Configuration, scenario file, or launch error.
pub const INVALID: i32 = 1;
/// The transcript did not meet the scenario's expectations.
pub const VERIFY_FAILED: i32 = 2;

/// Exit code for an error that aborted a run.
///
/// Build failures propagate the build's own status; everything else is
/// [`INVALID`].
pub fn for_error(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<BuildFailure>()
        .map_or(INVALID, BuildFailure::exit_code)
}
