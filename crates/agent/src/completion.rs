//! Completion heuristic for the symptom-gathering phase.
//!
//! The phase ends when the backend says so (structured flag), when the
//! agent's reply contains a completion phrase, or when the turn cap is
//! reached. The cap always applies.

use fixdesk_config::DialogueConfig;
use serde::Deserialize;

/// Which signal ended the symptom phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionSignal {
    /// The backend set `symptoms_complete: true`
    StructuredFlag,
    /// The reply contained this completion phrase
    Phrase(String),
    /// The symptom-turn counter reached the cap
    TurnCap,
}

impl std::fmt::Display for CompletionSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompletionSignal::StructuredFlag => f.write_str("structured_flag"),
            CompletionSignal::Phrase(p) => write!(f, "phrase({p})"),
            CompletionSignal::TurnCap => f.write_str("turn_cap"),
        }
    }
}

/// A symptom-phase reply, with the completion flag when the backend sent one.
#[derive(Debug, Clone, PartialEq)]
pub struct SymptomReply {
    pub reply: String,
    pub symptoms_complete: Option<bool>,
}

#[derive(Deserialize)]
struct StructuredReply {
    reply: String,
    #[serde(default)]
    symptoms_complete: Option<bool>,
}

impl SymptomReply {
    /// Parse `{"reply": .., "symptoms_complete": ..}`, tolerating a Markdown
    /// code fence. Anything else is taken as plain reply text.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        let body = trimmed
            .strip_prefix("```json")
            .or_else(|| trimmed.strip_prefix("```"))
            .and_then(|rest| rest.strip_suffix("```"))
            .map(str::trim)
            .unwrap_or(trimmed);

        match serde_json::from_str::<StructuredReply>(body) {
            Ok(parsed) if !parsed.reply.trim().is_empty() => Self {
                reply: parsed.reply.trim().to_string(),
                symptoms_complete: parsed.symptoms_complete,
            },
            _ => Self {
                reply: trimmed.to_string(),
                symptoms_complete: None,
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompletionHeuristic {
    turn_cap: u32,
    phrases: Vec<String>,
    phrase_matching: bool,
    structured: bool,
}

impl CompletionHeuristic {
    pub fn new(turn_cap: u32, phrases: Vec<String>) -> Self {
        Self {
            turn_cap,
            phrases: phrases.into_iter().map(|p| p.to_lowercase()).collect(),
            phrase_matching: true,
            structured: true,
        }
    }

    pub fn from_config(config: &DialogueConfig) -> Self {
        Self::new(config.symptom_turn_cap, config.completion_phrases.clone())
            .with_phrase_matching(config.phrase_matching)
            .with_structured(config.structured_completion)
    }

    pub fn with_phrase_matching(mut self, enabled: bool) -> Self {
        self.phrase_matching = enabled;
        self
    }

    pub fn with_structured(mut self, enabled: bool) -> Self {
        self.structured = enabled;
        self
    }

    /// Whether symptom exchanges should request JSON output.
    pub fn structured(&self) -> bool {
        self.structured
    }

    pub fn turn_cap(&self) -> u32 {
        self.turn_cap
    }

    /// Evaluate after a symptom turn. `turns` includes the turn just taken.
    pub fn evaluate(&self, turns: u32, reply: &SymptomReply) -> Option<CompletionSignal> {
        if self.structured && reply.symptoms_complete == Some(true) {
            return Some(CompletionSignal::StructuredFlag);
        }

        if self.phrase_matching {
            let lower = reply.reply.to_lowercase();
            if let Some(phrase) = self.phrases.iter().find(|p| lower.contains(p.as_str())) {
                return Some(CompletionSignal::Phrase(phrase.clone()));
            }
        }

        (turns >= self.turn_cap).then_some(CompletionSignal::TurnCap)
    }
}

impl Default for CompletionHeuristic {
    fn default() -> Self {
        Self::from_config(&DialogueConfig::default())
    }
}
