//! Per-turn conversation state threaded through the orchestrator.

use procure_ai::{Message, Role, Usage};
use serde::{Deserialize, Serialize};

/// Operating behaviour for one turn
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Chat,
    Investigate,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Chat => "chat",
            Mode::Investigate => "investigate",
        }
    }
}

/// State of a single orchestrator invocation.
///
/// Owned by exactly one invocation. `messages` only ever grows.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationState {
    /// Conversation history, oldest first
    pub messages: Vec<Message>,
    /// Set once by the router
    pub mode: Option<Mode>,
    /// Company under investigation, if any
    pub company: Option<String>,
    /// Rendered investigation plan
    pub plan_markdown: Option<String>,
    /// Final investigation report
    pub report_markdown: Option<String>,
    /// Text of the most recent assistant output
    pub last_response_text: Option<String>,
    /// Tokens spent across all calls of this turn
    #[serde(default)]
    pub usage: Usage,
}

impl ConversationState {
    /// Start a turn from an existing history
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            ..Default::default()
        }
    }

    /// Effective mode (chat until the router says otherwise)
    pub fn mode(&self) -> Mode {
        self.mode.unwrap_or_default()
    }

    /// Append a message to the history
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Latest user-authored message, if any
    pub fn latest_user_message(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.role() == Role::User)
    }

    /// Text of the latest user-authored message, if any
    pub fn latest_user_text(&self) -> Option<String> {
        self.latest_user_message().map(|m| m.text())
    }

    /// Record an assistant reply as the turn's visible output
    pub fn record_reply(&mut self, message: Message) {
        let text = message.text();
        if let Message::Assistant { ref metadata, .. } = message {
            self.usage.accumulate(&metadata.usage);
        }
        self.messages.push(message);
        self.last_response_text = Some(text);
    }
}
