//! Shared types for the agent loop.
//!
//! These types define the contracts between the loop, the completion client and
//! the transcript file. They carry no I/O and serialize to the wire/disk shape
//! directly.

use serde::{Deserialize, Serialize};

/// Author of a transcript message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One role-tagged entry in the transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Result of running a single command, reported back to the model.
///
/// Field order is part of the wire format: `command`, `stdout`, `exit_code`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    pub command: String,
    /// Combined stdout/stderr, trimmed.
    pub stdout: String,
    pub exit_code: i32,
}

impl CommandResult {
    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
    }
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// The model reported `status: "success"`.
    Success,
    /// The model reported any other non-empty status.
    Failure,
    /// The reply had neither a status nor commands, or could not be parsed.
    ProtocolError,
    /// The user refused to run a command.
    UserDeclined,
}

impl Outcome {
    pub fn is_success(self) -> bool {
        self == Outcome::Success
    }
}
