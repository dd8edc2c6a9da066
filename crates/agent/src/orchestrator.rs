//! The stage orchestrator: one user turn through the session lifecycle.
//!
//! Each turn runs exactly one phase against the session's current stage:
//!
//! 1. **Initial**: identify the device, record it, advance
//! 2. **DeviceConfirmed**: ask the next symptom question; advance once the
//!    completion heuristic fires
//! 3. **SymptomsGathered**: propose one remediation step and wait for the
//!    user's report; "it worked" completes the session
//!
//! Phase handlers only read the session. Their outcome is committed after
//! every external call has succeeded, so a failed turn leaves the session
//! where it was (apart from the in-band error notice).

use std::sync::Arc;

use fixdesk_config::DeviceModel;
use fixdesk_core::error::TurnError;
use fixdesk_core::knowledge::RetrievalResult;
use fixdesk_core::message::Message;
use fixdesk_core::session::{ConversationSession, Stage, TurnResult};
use fixdesk_knowledge::KnowledgeStore;
use tracing::{debug, info, warn};

use crate::completion::{CompletionHeuristic, CompletionSignal, SymptomReply};
use crate::context::{
    device_inputs, device_label, find_device, problem_description, symptom_inputs,
};
use crate::feedback::{Feedback, classify};
use crate::invoker::PhaseInvoker;
use crate::profile::{Phase, device_agent, device_task, symptom_agent, symptom_task};
use crate::remediation::RemediationPolicy;

pub const RESOLVED_MESSAGE: &str = "Excellent! Your issue is resolved.\n\n\
    Thank you for using FixDesk. We're glad we could help get your device back to working order. \
    If you run into another problem, please start a new session.";

pub const NOT_RESOLVED_MESSAGE: &str =
    "I understand that didn't fix it. What happened when you tried it?";

pub const UNCLEAR_FEEDBACK_MESSAGE: &str =
    "Did that step fix the problem? Please answer yes or no.";

pub const SESSION_COMPLETE_MESSAGE: &str =
    "This issue has been resolved. Please start a new session for a new problem.";

pub const EMPTY_INPUT_MESSAGE: &str = "Please type a message.";

const DEFAULT_TOP_K: usize = 3;

/// What a successful phase produced, before it is applied to the session.
enum Outcome {
    Device { reply: String, device: String },
    Symptom { reply: String, signal: Option<CompletionSignal> },
    Step { step: String },
}

/// Drives a [`ConversationSession`] through its stages.
///
/// The orchestrator holds no per-session state; callers own the session and
/// must not run two turns on the same session at once.
pub struct StageOrchestrator {
    /// Completion backend for all three phases
    invoker: PhaseInvoker,

    /// Supported device catalog
    devices: Vec<DeviceModel>,

    /// Symptom-phase completion rules
    heuristic: CompletionHeuristic,

    /// Single-step remediation rules
    policy: RemediationPolicy,

    /// Knowledge store for grounding remediation steps
    knowledge: Option<Arc<KnowledgeStore>>,

    /// Why there is no knowledge store, reported on remediation turns
    knowledge_unavailable: Option<String>,

    /// Solutions retrieved per remediation turn
    top_k: usize,
}

impl StageOrchestrator {
    pub fn new(invoker: PhaseInvoker, devices: Vec<DeviceModel>) -> Self {
        Self {
            invoker,
            devices,
            heuristic: CompletionHeuristic::default(),
            policy: RemediationPolicy::default(),
            knowledge: None,
            knowledge_unavailable: None,
            top_k: DEFAULT_TOP_K,
        }
    }

    pub fn with_heuristic(mut self, heuristic: CompletionHeuristic) -> Self {
        self.heuristic = heuristic;
        self
    }

    pub fn with_policy(mut self, policy: RemediationPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Ground remediation steps in this knowledge store.
    pub fn with_knowledge(mut self, store: Arc<KnowledgeStore>) -> Self {
        self.knowledge = Some(store);
        self.knowledge_unavailable = None;
        self
    }

    /// Run without a knowledge store, telling the user why on each step.
    pub fn with_knowledge_unavailable(mut self, reason: impl Into<String>) -> Self {
        self.knowledge = None;
        self.knowledge_unavailable = Some(reason.into());
        self
    }

    pub fn with_top_k(mut self, k: usize) -> Self {
        self.top_k = k;
        self
    }

    pub fn devices(&self) -> &[DeviceModel] {
        &self.devices
    }

    /// Run one user turn.
    ///
    /// Never fails: backend errors come back as an error-flagged
    /// [`TurnResult`] and a notice in the transcript, with the stage unchanged.
    pub async fn process_turn(&self, session: &mut ConversationSession, user_text: &str) -> TurnResult {
        let text = user_text.trim();
        if text.is_empty() {
            return TurnResult::error(session, EMPTY_INPUT_MESSAGE);
        }

        let mut notices = Vec::new();
        let (phase, outcome) = match session.stage() {
            Stage::Complete => return TurnResult::from_session(session, SESSION_COMPLETE_MESSAGE),
            Stage::SymptomsGathered if session.awaiting_confirmation => {
                return self.apply_feedback(session, text, classify(text));
            }
            Stage::Initial => (
                Phase::DeviceIdentification,
                self.identify_device(text).await,
            ),
            Stage::DeviceConfirmed => (
                Phase::SymptomGathering,
                self.gather_symptoms(session, text).await,
            ),
            Stage::SymptomsGathered => (
                Phase::ProblemSolving,
                self.next_step(session, text, &mut notices).await,
            ),
        };

        for notice in &notices {
            session.push_notice(notice.clone());
        }

        match outcome {
            Ok(outcome) => self.commit(session, text, outcome).with_notices(notices),
            Err(e) => {
                warn!(
                    session_id = %session.session_id,
                    stage = %session.stage(),
                    phase = %phase,
                    error = %e,
                    "Turn failed"
                );
                let message = format!("Error in {phase}: {e}");
                session.push_notice(message.clone());
                TurnResult::error(session, message).with_notices(notices)
            }
        }
    }

    /// Explicit answer to "did this step work?".
    pub fn confirm_outcome(&self, session: &mut ConversationSession, resolved: bool) -> TurnResult {
        if session.stage() != Stage::SymptomsGathered || !session.awaiting_confirmation {
            return TurnResult::error(session, "There is no troubleshooting step awaiting confirmation.");
        }
        let (text, feedback) = if resolved {
            ("Yes, the issue is fixed.", Feedback::Resolved)
        } else {
            ("No, that did not fix it.", Feedback::NotResolved)
        };
        self.apply_feedback(session, text, feedback)
    }

    fn apply_feedback(&self, session: &mut ConversationSession, text: &str, feedback: Feedback) -> TurnResult {
        debug!(session_id = %session.session_id, feedback = ?feedback, "Step feedback");
        match feedback {
            Feedback::Resolved => {
                session.transcript.push_exchange(text, RESOLVED_MESSAGE);
                session.awaiting_confirmation = false;
                session.advance_to(Stage::Complete);
                info!(
                    session_id = %session.session_id,
                    steps = session.step_counter,
                    "Issue resolved"
                );
                TurnResult::from_session(session, RESOLVED_MESSAGE)
            }
            Feedback::NotResolved => {
                session.transcript.push_exchange(text, NOT_RESOLVED_MESSAGE);
                session.troubleshooting_history.push(Message::user(text));
                session.awaiting_confirmation = false;
                session.touch();
                TurnResult::from_session(session, NOT_RESOLVED_MESSAGE)
            }
            Feedback::Unclear => TurnResult::from_session(session, UNCLEAR_FEEDBACK_MESSAGE),
        }
    }

    async fn identify_device(&self, text: &str) -> Result<Outcome, TurnError> {
        let reply = self
            .invoker
            .invoke(
                &device_agent(&self.devices),
                &device_task(&self.devices),
                &device_inputs(text),
                false,
            )
            .await?;

        let device = find_device(&self.devices, text)
            .or_else(|| find_device(&self.devices, &reply))
            .map(|d| d.model.clone())
            .unwrap_or_else(|| reply.clone());

        Ok(Outcome::Device { reply, device })
    }

    async fn gather_symptoms(&self, session: &ConversationSession, text: &str) -> Result<Outcome, TurnError> {
        let raw = self
            .invoker
            .invoke(
                &symptom_agent(),
                &symptom_task(self.heuristic.structured()),
                &symptom_inputs(session, &self.devices, text),
                self.heuristic.structured(),
            )
            .await?;

        let reply = SymptomReply::parse(&raw);
        let signal = self.heuristic.evaluate(session.symptom_turns + 1, &reply);
        Ok(Outcome::Symptom {
            reply: reply.reply,
            signal,
        })
    }

    async fn next_step(
        &self,
        session: &ConversationSession,
        text: &str,
        notices: &mut Vec<String>,
    ) -> Result<Outcome, TurnError> {
        let grounding = self.grounding(session, text, notices).await;
        let step = self
            .policy
            .propose(&self.invoker, session, &self.devices, text, &grounding)
            .await?;
        Ok(Outcome::Step { step })
    }

    /// Retrieve solutions for the session's problem. Failures become notices.
    async fn grounding(
        &self,
        session: &ConversationSession,
        text: &str,
        notices: &mut Vec<String>,
    ) -> Vec<RetrievalResult> {
        let Some(store) = &self.knowledge else {
            if let Some(reason) = &self.knowledge_unavailable {
                notices.push(format!("Knowledge base unavailable: {reason}"));
            }
            return Vec::new();
        };

        let device = device_label(session, &self.devices);
        match store
            .search(&device, &problem_description(session, text), self.top_k)
            .await
        {
            Ok(results) => {
                debug!(session_id = %session.session_id, %device, hits = results.len(), "Grounding retrieved");
                results
            }
            Err(e) => {
                warn!(session_id = %session.session_id, error = %e, "Knowledge search failed; continuing ungrounded");
                notices.push(format!("Knowledge base unavailable: {e}"));
                Vec::new()
            }
        }
    }

    fn commit(&self, session: &mut ConversationSession, text: &str, outcome: Outcome) -> TurnResult {
        match outcome {
            Outcome::Device { reply, device } => {
                session.transcript.push_exchange(text, reply.as_str());
                info!(session_id = %session.session_id, %device, "Device confirmed");
                session.device_confirmed = Some(device);
                session.advance_to(Stage::DeviceConfirmed);
                TurnResult::from_session(session, reply)
            }
            Outcome::Symptom { reply, signal } => {
                session.transcript.push_exchange(text, reply.as_str());
                session.symptom_turns += 1;
                session.touch();
                if let Some(signal) = signal {
                    info!(
                        session_id = %session.session_id,
                        turns = session.symptom_turns,
                        signal = %signal,
                        "Symptom gathering complete"
                    );
                    session.symptom_summary = Some(session.transcript.render());
                    session.advance_to(Stage::SymptomsGathered);
                }
                TurnResult::from_session(session, reply)
            }
            Outcome::Step { step } => {
                session.troubleshooting_history.push_exchange(text, step.as_str());
                session.transcript.push_exchange(text, step.as_str());
                session.step_counter += 1;
                session.awaiting_confirmation = true;
                session.touch();
                info!(session_id = %session.session_id, step = session.step_counter, "Proposed step");
                TurnResult::from_session(session, step)
            }
        }
    }
}
