//! Command-line agent loop driven by a language model.
//!
//! The model receives a goal, replies with shell commands as JSON, the commands
//! run after confirmation, and their results go back to the model until it
//! reports success or failure. The crate keeps a strict separation:
//!
//! - **[`core`]**: Pure logic (reply parsing, batch policy, transcript).
//!   No I/O, fully testable in isolation.
//! - **[`io`]**: Side effects (HTTP, subprocesses, stdin, files, terminal).
//!   Each collaborator sits behind a trait so tests can script it.
//!
//! [`agent`] wires the two together into the turn loop.

pub mod agent;
pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
