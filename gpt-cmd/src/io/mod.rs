//! I/O helpers for the agent loop.

pub mod completion;
pub mod config;
pub mod confirm;
pub mod console;
pub mod process;
pub mod prompt;
pub mod transcript;
