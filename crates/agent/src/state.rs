//! Per-conversation engine state.

use ferrocode_core::{Message, Role};

/// Everything that survives between `run()` calls of one conversation.
/// One state belongs to one conversation; the engine itself holds none.
#[derive(Debug, Clone)]
pub struct EngineState {
    /// `messages[0]` is always the system message.
    pub messages: Vec<Message>,
    /// Tool rounds since the last checkpoint.
    pub iteration: u32,
    /// Set when the last turn ended on the cancellation token.
    pub cancelled: bool,
    pub total_tokens: u64,
}

impl EngineState {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::system(system_prompt)],
            iteration: 0,
            cancelled: false,
            total_tokens: 0,
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn system(&self) -> Option<&Message> {
        self.messages.first().filter(|m| m.role == Role::System)
    }

    /// Text of the most recent assistant message, if it has any.
    pub fn last_assistant_text(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant)
            .map(|m| m.content.as_str())
            .filter(|c| !c.is_empty())
    }

    /// Drop the conversation, keeping the system message.
    pub fn reset(&mut self) {
        self.messages.truncate(1);
        self.iteration = 0;
        self.cancelled = false;
    }
}
