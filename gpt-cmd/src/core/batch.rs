//! Early-stop policy for a batch of commands.
//!
//! Commands in a batch run in order; the first non-zero exit code ends the
//! batch. Results collected up to and including the failing one are still
//! reported to the model.

use crate::core::types::{CommandResult, Message};

/// Whether the batch may go on after recording a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchProgress {
    Continue,
    Stop,
}

/// Results recorded for one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchResults {
    results: Vec<CommandResult>,
}

impl BatchResults {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a result and report whether later commands may run.
    pub fn record(&mut self, result: CommandResult) -> BatchProgress {
        let progress = if result.succeeded() {
            BatchProgress::Continue
        } else {
            BatchProgress::Stop
        };
        self.results.push(result);
        progress
    }

    pub fn results(&self) -> &[CommandResult] {
        &self.results
    }

    /// Compact JSON array of results, sent back as the next user message.
    pub fn to_message(&self) -> Result<Message, serde_json::Error> {
        Ok(Message::user(serde_json::to_string(&self.results)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Role;

    fn result(command: &str, exit_code: i32) -> CommandResult {
        CommandResult {
            command: command.to_string(),
            stdout: String::new(),
            exit_code,
        }
    }

    #[test]
    fn success_continues_failure_stops() {
        let mut batch = BatchResults::new();
        assert_eq!(batch.record(result("true", 0)), BatchProgress::Continue);
        assert_eq!(batch.record(result("false", 1)), BatchProgress::Stop);
        assert_eq!(batch.results().len(), 2);
    }

    #[test]
    fn message_is_compact_user_json() {
        let mut batch = BatchResults::new();
        batch.record(CommandResult {
            command: "echo hi".to_string(),
            stdout: "hi".to_string(),
            exit_code: 0,
        });
        let message = batch.to_message().expect("serialize");
        assert_eq!(message.role, Role::User);
        assert_eq!(
            message.content,
            r#"[{"command":"echo hi","stdout":"hi","exit_code":0}]"#
        );
    }

    #[test]
    fn empty_batch_serializes_to_empty_array() {
        let message = BatchResults::new().to_message().expect("serialize");
        assert_eq!(message.content, "[]");
    }
}
