//! In-memory conversation transcript.

use crate::core::types::Message;

/// Append-only sequence of messages sent to the model on every turn.
///
/// There is no truncation: each turn adds one assistant message and, when
/// commands ran, one user message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    /// Open a transcript with the system prompt and the user's goal message.
    pub fn start(system_prompt: impl Into<String>, goal_message: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::system(system_prompt), Message::user(goal_message)],
        }
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }
}
