use crate::core::verifier::VerificationResult;
use crate::exit_codes;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Pass,
    Fail,
}

/// Outcome of a finished session.
///
/// Decided by verification alone: the child's exit status and whether the
/// deadline was hit do not enter into it.
pub fn classify_outcome(result: &VerificationResult) -> Outcome {
    if result.passed() {
        Outcome::Pass
    } else {
        Outcome::Fail
    }
}

impl Outcome {
    pub fn exit_code(self) -> i32 {
        match self {
            Outcome::Pass => exit_codes::OK,
            Outcome::Fail => exit_codes::VERIFY_FAILED,
        }
    }
}
