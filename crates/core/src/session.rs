//! Conversation session and stage types.
//!
//! A session is the explicit per-user state of one troubleshooting
//! conversation. It is addressed by [`SessionId`] and mutated only by the
//! stage orchestrator, one turn at a time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::message::{Message, Role, Transcript};

/// Unique identifier for a troubleshooting session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The phase a session is in. Ordering follows the lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Waiting for the first message; device not yet identified
    Initial,
    /// Device confirmed; gathering symptoms
    DeviceConfirmed,
    /// Symptoms gathered; proposing remediation steps
    SymptomsGathered,
    /// Issue resolved (terminal)
    Complete,
}

impl Stage {
    /// Whether a session may move from `self` to `next`.
    ///
    /// Only single forward steps are legal; `Complete` is terminal.
    pub fn can_advance_to(self, next: Stage) -> bool {
        matches!(
            (self, next),
            (Stage::Initial, Stage::DeviceConfirmed)
                | (Stage::DeviceConfirmed, Stage::SymptomsGathered)
                | (Stage::SymptomsGathered, Stage::Complete)
        )
    }

    pub fn is_terminal(self) -> bool {
        self == Stage::Complete
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stage::Initial => "initial",
            Stage::DeviceConfirmed => "device_confirmed",
            Stage::SymptomsGathered => "symptoms_gathered",
            Stage::Complete => "complete",
        };
        f.write_str(s)
    }
}

/// Per-session troubleshooting state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSession {
    pub session_id: SessionId,

    stage: Stage,

    /// Confirmed device: a catalog model id, or the agent's confirmation text
    pub device_confirmed: Option<String>,

    /// Rendered dialogue at the moment symptom gathering completed
    pub symptom_summary: Option<String>,

    /// Remediation-phase exchanges (user feedback + proposed steps)
    pub troubleshooting_history: Transcript,

    /// Every utterance of the session, including in-band notices
    pub transcript: Transcript,

    /// Symptom-phase turns completed so far
    pub symptom_turns: u32,

    /// Remediation steps proposed so far
    pub step_counter: u32,

    /// True right after a step is proposed, until the user reports back
    pub awaiting_confirmation: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ConversationSession {
    pub fn new(session_id: SessionId) -> Self {
        let now = Utc::now();
        Self {
            session_id,
            stage: Stage::Initial,
            device_confirmed: None,
            symptom_summary: None,
            troubleshooting_history: Transcript::new(),
            transcript: Transcript::new(),
            symptom_turns: 0,
            step_counter: 0,
            awaiting_confirmation: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Move to `next` if the transition is legal. Returns whether it moved.
    pub fn advance_to(&mut self, next: Stage) -> bool {
        if !self.stage.can_advance_to(next) {
            tracing::warn!(
                session_id = %self.session_id,
                from = %self.stage,
                to = %next,
                "Rejected illegal stage transition"
            );
            return false;
        }
        self.stage = next;
        self.touch();
        true
    }

    /// Steps proposed so far, oldest first.
    pub fn proposed_steps(&self) -> Vec<&str> {
        self.troubleshooting_history.texts_by(Role::Assistant).collect()
    }

    /// Append an in-band notice (turn failure, degraded retrieval).
    pub fn push_notice(&mut self, text: impl Into<String>) {
        self.transcript.push(Message::system(text));
        self.touch();
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// What a single turn returns to the presentation layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnResult {
    /// Stage after the turn
    pub stage: Stage,

    /// The text to show the user
    pub agent_text: String,

    /// Whether the UI should ask "did this work?"
    pub awaiting_confirmation: bool,

    /// True when the turn failed and the session was left unchanged
    #[serde(default)]
    pub is_error: bool,

    /// Remediation steps proposed so far
    #[serde(default)]
    pub step_counter: u32,

    /// Reduced-functionality warnings (e.g. knowledge base unavailable)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notices: Vec<String>,
}

impl TurnResult {
    /// A successful turn reflecting the session's current state.
    pub fn from_session(session: &ConversationSession, agent_text: impl Into<String>) -> Self {
        Self {
            stage: session.stage(),
            agent_text: agent_text.into(),
            awaiting_confirmation: session.awaiting_confirmation,
            is_error: false,
            step_counter: session.step_counter,
            notices: Vec::new(),
        }
    }

    /// An error-flagged turn; state is reported as-is.
    pub fn error(session: &ConversationSession, agent_text: impl Into<String>) -> Self {
        Self {
            is_error: true,
            ..Self::from_session(session, agent_text)
        }
    }

    pub fn with_notices(mut self, notices: Vec<String>) -> Self {
        self.notices = notices;
        self
    }
}
