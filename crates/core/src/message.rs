//! Message and Transcript domain types.
//!
//! A [`Transcript`] is the append-only record of a troubleshooting session:
//! user turns, agent replies, and in-band system notices (turn failures,
//! degraded retrieval). It also renders the conditioning text that is fed
//! back into every model call.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The role of a message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user
    User,
    /// The support agent (model output)
    Assistant,
    /// Instructions to the model, or in-band notices in a transcript
    System,
}

impl Role {
    /// Speaker label used when rendering conditioning text.
    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Assistant => "Agent",
            Role::System => "System",
        }
    }
}

/// A single message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    pub id: String,

    /// Who sent this message
    pub role: Role,

    /// The text content
    pub content: String,

    /// Timestamp
    pub timestamp: DateTime<Utc>,
}

impl Message {
    fn with_role(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(Role::User, content)
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(Role::Assistant, content)
    }

    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(Role::System, content)
    }
}

/// Append-only, ordered sequence of (speaker, text) entries.
///
/// There is deliberately no way to remove or edit an entry once pushed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message.
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Append a user/agent exchange in order.
    pub fn push_exchange(&mut self, user_text: impl Into<String>, agent_text: impl Into<String>) {
        self.push(Message::user(user_text));
        self.push(Message::assistant(agent_text));
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

    /// Texts of every entry spoken by `role`, oldest first.
    pub fn texts_by(&self, role: Role) -> impl Iterator<Item = &str> {
        self.messages
            .iter()
            .filter(move |m| m.role == role)
            .map(|m| m.content.as_str())
    }

    /// The most recent entry spoken by `role`.
    pub fn last_by(&self, role: Role) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.role == role)
    }

    /// Render the whole dialogue as conditioning text.
    ///
    /// System notices are excluded: they describe the session, not the
    /// conversation with the user.
    pub fn render(&self) -> String {
        render_lines(self.messages.iter())
    }

    /// Render only the last `max_messages` dialogue entries.
    pub fn render_recent(&self, max_messages: usize) -> String {
        let dialogue: Vec<&Message> = self
            .messages
            .iter()
            .filter(|m| m.role != Role::System)
            .collect();
        let start = dialogue.len().saturating_sub(max_messages);
        render_lines(dialogue[start..].iter().copied())
    }

    /// Get the total token count estimate (rough: 4 chars ≈ 1 token).
    pub fn estimated_tokens(&self) -> usize {
        self.messages.iter().map(|m| m.content.len() / 4).sum()
    }
}

fn render_lines<'a>(messages: impl Iterator<Item = &'a Message>) -> String {
    messages
        .filter(|m| m.role != Role::System)
        .map(|m| format!("{}: {}", m.role.label(), m.content))
        .collect::<Vec<_>>()
        .join("\n")
}
