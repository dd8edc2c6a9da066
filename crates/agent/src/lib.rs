//! The troubleshooting dialogue for FixDesk.
//!
//! A session moves through three phases, one user turn at a time:
//!
//! 1. **Identify** the device against the supported catalog
//! 2. **Gather symptoms** until the completion heuristic fires
//! 3. **Remediate** with exactly one step per turn, until the user reports
//!    the issue fixed
//!
//! Every phase is a single stateless call to the completion backend; all
//! conditioning comes from the session's accumulated context.

pub mod completion;
pub mod context;
pub mod feedback;
pub mod invoker;
pub mod orchestrator;
pub mod profile;
pub mod registry;
pub mod remediation;
pub mod service;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use completion::{CompletionHeuristic, CompletionSignal, SymptomReply};
pub use feedback::{Feedback, classify};
pub use invoker::PhaseInvoker;
pub use orchestrator::StageOrchestrator;
pub use profile::{AgentProfile, Phase, TaskBrief};
pub use registry::SessionRegistry;
pub use remediation::{RemediationPolicy, StepCheck, validate_step};
pub use service::{KnowledgeAvailability, SupportService};
