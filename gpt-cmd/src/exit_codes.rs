//! Stable exit codes for the `gpt_cmd` binary.

use crate::core::types::Outcome;

/// Goal achieved, help printed, or convos directory printed.
pub const OK: i32 = 0;
/// Goal failed, command declined, protocol violation, or usage/config error.
pub const FAILURE: i32 = 1;

/// Map how a run ended to the process exit code.
pub fn for_outcome(outcome: Outcome) -> i32 {
    match outcome {
        Outcome::Success => OK,
        Outcome::Failure | Outcome::ProtocolError | Outcome::UserDeclined => FAILURE,
    }
}
