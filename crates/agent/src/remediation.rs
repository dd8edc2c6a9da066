//! Remediation policy: one actionable step per turn.
//!
//! The model is asked for a single step, and the answer is then checked.
//! List-shaped output and repeats of earlier steps are rejected and retried
//! with a corrective instruction. A list that survives the retries is
//! collapsed to its first item; a repeat that survives is a turn error.

use fixdesk_core::error::TurnError;
use fixdesk_core::knowledge::RetrievalResult;
use fixdesk_core::session::ConversationSession;
use fixdesk_config::DeviceModel;
use tracing::{debug, warn};

use crate::context::solver_inputs;
use crate::invoker::PhaseInvoker;
use crate::profile::{solver_agent, solver_task};

/// Appended when a step does not ask the user to report back.
pub const REPORT_BACK: &str = "Please try this and let me know whether it worked.";

const REPORT_BACK_MARKERS: &[&str] = &[
    "let me know",
    "report back",
    "tell me",
    "did it work",
    "did that work",
    "does it work",
    "come back",
    "how it goes",
    "what happens",
];

const LIST_CORRECTION: &str = "Your previous answer contained several steps or options. \
                               Reply with exactly ONE step, without numbering or alternatives.";

/// Outcome of validating a candidate step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepCheck {
    Valid,
    /// Two or more enumerated items, or option/step markers
    ListStructure,
    /// Same action as this earlier step
    Repeated(String),
}

/// Check a candidate step against the single-step contract.
pub fn validate_step(text: &str, prior_steps: &[&str]) -> StepCheck {
    if has_list_structure(text) {
        return StepCheck::ListStructure;
    }
    match prior_steps.iter().find(|prior| same_action(text, prior)) {
        Some(prior) => StepCheck::Repeated((*prior).to_string()),
        None => StepCheck::Valid,
    }
}

/// Strip an enumeration or bullet marker from the start of `line`.
fn strip_item_marker(line: &str) -> Option<&str> {
    let trimmed = line.trim_start();

    for bullet in ["- ", "* ", "• "] {
        if let Some(rest) = trimmed.strip_prefix(bullet) {
            return Some(rest.trim());
        }
    }

    let digits = trimmed.chars().take_while(char::is_ascii_digit).count();
    if digits > 0 && digits <= 2 {
        let rest = &trimmed[digits..];
        if let Some(rest) = rest.strip_prefix(". ").or_else(|| rest.strip_prefix(") ")) {
            return Some(rest.trim());
        }
    }
    None
}

/// An inline enumeration marker: "2.", "2)", "(2)", "Option 2:" or "Step 2:".
#[derive(Debug, Clone, Copy)]
struct Marker {
    start: usize,
    /// First byte after the marker
    end: usize,
    number: u32,
    /// "option N" / "step N" rather than a bare number
    labelled: bool,
}

/// Inline markers in `text`, ordered by position.
fn inline_markers(text: &str) -> Vec<Marker> {
    // ASCII lowercasing keeps byte offsets valid for `text`.
    let lower = text.to_ascii_lowercase();
    let bytes = lower.as_bytes();
    let word_start = |i: usize| i == 0 || !bytes[i - 1].is_ascii_alphanumeric();
    let digits_at = |i: usize| {
        let len = bytes[i..].iter().take_while(|b| b.is_ascii_digit()).count();
        (len > 0 && len <= 2)
            .then(|| lower[i..i + len].parse::<u32>().ok().map(|n| (n, i + len)))
            .flatten()
    };

    let mut markers = Vec::new();
    for keyword in ["option ", "step "] {
        for (idx, _) in lower.match_indices(keyword) {
            if !word_start(idx) {
                continue;
            }
            if let Some((number, mut end)) = digits_at(idx + keyword.len()) {
                if matches!(bytes.get(end), Some(b':' | b'.' | b')' | b'-')) {
                    end += 1;
                }
                markers.push(Marker { start: idx, end, number, labelled: true });
            }
        }
    }

    for i in 0..bytes.len() {
        let after_space = i == 0 || bytes[i - 1].is_ascii_whitespace();
        let after_paren = i > 0 && bytes[i - 1] == b'(';
        if !bytes[i].is_ascii_digit() || !(after_space || after_paren) {
            continue;
        }
        if markers.iter().any(|m| m.labelled && (m.start..m.end).contains(&i)) {
            continue;
        }
        let Some((number, end)) = digits_at(i) else {
            continue;
        };
        let closes = if after_paren {
            bytes.get(end) == Some(&b')')
        } else {
            matches!(bytes.get(end), Some(b'.' | b')'))
        };
        let spaced = bytes.get(end + 1).is_some_and(|b| b.is_ascii_whitespace());
        if closes && spaced {
            let start = if after_paren { i - 1 } else { i };
            markers.push(Marker { start, end: end + 1, number, labelled: false });
        }
    }

    markers.sort_by_key(|m| m.start);
    markers
}

pub fn has_list_structure(text: &str) -> bool {
    let items = text.lines().filter(|l| strip_item_marker(l).is_some()).count();
    if items >= 2 {
        return true;
    }
    let markers = inline_markers(text);
    markers.iter().filter(|m| !m.labelled).count() >= 2
        || markers.iter().any(|m| m.labelled && m.number >= 2)
}

/// Drop trailing separators such as ", or" left after cutting a list.
fn trim_connectors(text: &str) -> &str {
    let mut rest = text.trim();
    loop {
        let before = rest;
        rest = rest.trim_end_matches([',', ';']).trim_end();
        for word in [" or", " and", " then"] {
            if rest.to_ascii_lowercase().ends_with(word) {
                rest = rest[..rest.len() - word.len()].trim_end();
            }
        }
        if rest == before {
            return rest;
        }
    }
}

/// Reduce list-shaped output to its first item.
pub fn collapse_to_first_item(text: &str) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let item_lines: Vec<usize> = lines
        .iter()
        .enumerate()
        .filter(|(_, l)| strip_item_marker(l).is_some())
        .map(|(i, _)| i)
        .collect();

    if item_lines.len() >= 2 {
        let first = item_lines[0];
        let mut block = vec![strip_item_marker(lines[first]).unwrap_or_default().to_string()];
        // Continuation lines up to the next item
        block.extend(
            lines[first + 1..item_lines[1]]
                .iter()
                .map(|l| l.trim())
                .filter(|l| !l.is_empty())
                .map(String::from),
        );
        return block.join(" ");
    }

    let markers = inline_markers(text);
    let Some(first) = markers.first() else {
        return text.trim().to_string();
    };
    let lead = text[..first.start].trim();
    // "Unplug it. Step 2: wait." The unmarked lead-in is the first step.
    if first.number >= 2 && !lead.is_empty() {
        return trim_connectors(lead).to_string();
    }

    let end = markers.get(1).map_or(text.len(), |m| m.start);
    let body = trim_connectors(&text[first.end..end]);
    if lead.is_empty() || lead.ends_with(':') {
        body.to_string()
    } else {
        format!("{lead} {body}")
    }
}

/// Lowercase alphanumeric words, without the report-back sentence.
fn normalize(text: &str) -> String {
    let without_tail = text.replace(REPORT_BACK, "");
    without_tail
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn first_sentence(text: &str) -> String {
    let end = text
        .find(['.', '!', '?', '\n'])
        .unwrap_or(text.len());
    normalize(&text[..end])
}

/// Two steps describe the same action when their normalized text, or their
/// normalized first sentence, is identical.
fn same_action(candidate: &str, prior: &str) -> bool {
    let (a, b) = (normalize(candidate), normalize(prior));
    if !a.is_empty() && a == b {
        return true;
    }
    let (a, b) = (first_sentence(candidate), first_sentence(prior));
    a.split_whitespace().count() >= 3 && a == b
}

pub fn ensure_report_back(step: &str) -> String {
    let lower = step.to_lowercase();
    if REPORT_BACK_MARKERS.iter().any(|m| lower.contains(m)) {
        step.to_string()
    } else {
        format!("{}\n\n{REPORT_BACK}", step.trim_end())
    }
}

pub struct RemediationPolicy {
    max_attempts: u32,
}

impl RemediationPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    /// Produce the next step for `session`, or fail the turn.
    pub async fn propose(
        &self,
        invoker: &PhaseInvoker,
        session: &ConversationSession,
        devices: &[DeviceModel],
        user_text: &str,
        grounding: &[RetrievalResult],
    ) -> Result<String, TurnError> {
        let prior = session.proposed_steps();
        let inputs = solver_inputs(session, devices, user_text, grounding);
        let profile = solver_agent();

        let mut correction: Option<String> = None;
        let mut attempt = 1;

        loop {
            let task = solver_task(correction.as_deref());
            let candidate = invoker.invoke(&profile, &task, &inputs, false).await?;

            let check = validate_step(&candidate, &prior);
            if check == StepCheck::Valid {
                return Ok(ensure_report_back(&candidate));
            }
            if attempt >= self.max_attempts {
                return settle(session, &prior, candidate, check);
            }

            debug!(session_id = %session.session_id, attempt, check = ?check, "Step rejected, retrying");
            correction = Some(match &check {
                StepCheck::Repeated(prior_step) => format!(
                    "Your previous answer repeated a step the user already tried: \"{}\". \
                     Suggest a different action.",
                    first_line(prior_step)
                ),
                _ => LIST_CORRECTION.to_string(),
            });
            attempt += 1;
        }
    }
}

/// Final decision once retries are exhausted.
fn settle(
    session: &ConversationSession,
    prior: &[&str],
    candidate: String,
    check: StepCheck,
) -> Result<String, TurnError> {
    match check {
        StepCheck::Valid => Ok(ensure_report_back(&candidate)),
        StepCheck::Repeated(prior_step) => {
            Err(TurnError::RepeatedStep(first_line(&prior_step).to_string()))
        }
        StepCheck::ListStructure => {
            let collapsed = collapse_to_first_item(&candidate);
            warn!(session_id = %session.session_id, "Collapsed list-shaped step to its first item");
            match prior.iter().find(|p| same_action(&collapsed, p)) {
                Some(prior_step) => Err(TurnError::RepeatedStep(first_line(prior_step).to_string())),
                None => Ok(ensure_report_back(&collapsed)),
            }
        }
    }
}

impl Default for RemediationPolicy {
    fn default() -> Self {
        Self::new(2)
    }
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::ScriptedProvider;
    use fixdesk_core::session::SessionId;
    use std::sync::Arc;

    #[test]
    fn numbered_list_is_rejected() {
        let text = "Try these:\n1. Unplug the machine.\n2. Clean the filter.";
        assert_eq!(validate_step(text, &[]), StepCheck::ListStructure);
    }

    #[test]
    fn bulleted_list_is_rejected() {
        let text = "- Check the outlet\n- Reset the board";
        assert!(has_list_structure(text));
    }

    #[test]
    fn option_markers_are_rejected() {
        assert!(has_list_structure("Option 1: reset it. Option 2: descale it."));
        assert!(has_list_structure("First unplug it. Step 2: wait a minute."));
    }

    #[test]
    fn inline_enumerations_are_rejected() {
        for text in [
            "1. Unplug the machine for 30 seconds. 2. Clean the condenser filter.",
            "Try (1) unplugging it, or (2) descaling the evaporator.",
            "Do this: 1) reset the board 2) run a cleaning cycle",
        ] {
            assert_eq!(validate_step(text, &[]), StepCheck::ListStructure, "{text}");
        }
    }

    #[test]
    fn lone_option_label_is_a_single_step() {
        let text = "Option 1: reset the board.";
        assert_eq!(validate_step(text, &[]), StepCheck::Valid);
        assert_eq!(collapse_to_first_item(text), "reset the board.");
    }

    #[test]
    fn numbers_inside_a_sentence_are_not_markers() {
        let text = "Set the dial to 3. Then hold power for 1.5 seconds and wait 10 minutes.";
        assert!(!has_list_structure(text));
    }

    #[test]
    fn single_step_passes() {
        let text = "Unplug the machine for 30 seconds, then plug it back in and press power.";
        assert_eq!(validate_step(text, &[]), StepCheck::Valid);
        // "Step 1" alone is not a list
        assert!(!has_list_structure("Step 1: hold the power button for 30 seconds."));
        // A single numbered line is not a list either
        assert!(!has_list_structure("1. Hold the power button for 30 seconds."));
    }

    #[test]
    fn repeat_detected_despite_formatting() {
        let prior = format!("Unplug the machine for 30 seconds.\n\n{REPORT_BACK}");
        let check = validate_step("unplug the machine for 30 seconds", &[prior.as_str()]);
        assert!(matches!(check, StepCheck::Repeated(_)));
    }

    #[test]
    fn repeat_detected_by_first_sentence() {
        let prior = "Check the water reservoir level. It should be above MIN.";
        let check = validate_step("Check the water reservoir level. Let me know what you see.", &[prior]);
        assert!(matches!(check, StepCheck::Repeated(_)));
    }

    #[test]
    fn different_step_is_not_a_repeat() {
        let prior = "Unplug the machine for 30 seconds.";
        let check = validate_step("Run the cleaning cycle with descaler.", &[prior]);
        assert_eq!(check, StepCheck::Valid);
    }

    #[test]
    fn collapse_numbered_list() {
        let text = "Here is what to do:\n1. Unplug the machine\n   for 30 seconds.\n2. Clean the filter.\n3. Call support.";
        assert_eq!(collapse_to_first_item(text), "Unplug the machine for 30 seconds.");
    }

    #[test]
    fn collapse_inline_options() {
        let text = "Option 1: Reset the control board; Option 2: Descale the evaporator.";
        assert_eq!(collapse_to_first_item(text), "Reset the control board");
    }

    #[test]
    fn collapse_inline_numbers() {
        let text = "1. Unplug the machine for 30 seconds. 2. Clean the condenser filter.";
        assert_eq!(collapse_to_first_item(text), "Unplug the machine for 30 seconds.");

        let text = "Try (1) unplugging it, or (2) descaling the evaporator.";
        let collapsed = collapse_to_first_item(text);
        assert_eq!(collapsed, "Try unplugging it");
        assert!(!has_list_structure(&collapsed));
    }

    #[test]
    fn collapse_keeps_unmarked_lead_in() {
        let collapsed = collapse_to_first_item("First unplug it. Step 2: wait a minute.");
        assert_eq!(collapsed, "First unplug it.");
        assert!(!has_list_structure(&collapsed));
    }

    #[test]
    fn report_back_appended_when_missing() {
        let step = ensure_report_back("Hold the power button for 30 seconds.");
        assert!(step.ends_with(REPORT_BACK));
        let kept = ensure_report_back("Hold it for 30 seconds and let me know if it starts.");
        assert!(!kept.contains(REPORT_BACK));
    }

    fn session_with_step(step: &str) -> ConversationSession {
        let mut session = ConversationSession::new(SessionId::new());
        session.device_confirmed = Some("EH222".into());
        session.symptom_summary = Some("User: no power".into());
        session.troubleshooting_history.push_exchange("start", step);
        session.step_counter = 1;
        session
    }

    #[tokio::test]
    async fn list_output_retried_then_accepted() {
        let provider = Arc::new(ScriptedProvider::texts(&[
            "1. Check the outlet.\n2. Reset the board.",
            "Check that the outlet works by plugging in a lamp.",
        ]));
        let invoker = PhaseInvoker::new(provider.clone(), "gpt-4", 0.3);
        let session = session_with_step("Make sure the power cord is seated.");

        let step = RemediationPolicy::default()
            .propose(&invoker, &session, &[], "no change", &[])
            .await
            .unwrap();

        assert!(step.starts_with("Check that the outlet works"));
        assert!(step.ends_with(REPORT_BACK));
        assert_eq!(provider.call_count(), 2);
        let retry = provider.requests()[1].messages[1].content.clone();
        assert!(retry.contains("exactly ONE step"));
    }

    #[tokio::test]
    async fn persistent_list_collapsed() {
        let provider = Arc::new(ScriptedProvider::texts(&[
            "1. Check the outlet.\n2. Reset the board.",
            "- Reset the control board.\n- Descale.",
        ]));
        let invoker = PhaseInvoker::new(provider, "gpt-4", 0.3);
        let session = session_with_step("Make sure the power cord is seated.");

        let step = RemediationPolicy::default()
            .propose(&invoker, &session, &[], "no change", &[])
            .await
            .unwrap();
        assert!(step.starts_with("Reset the control board."));
        assert!(!has_list_structure(&step));
    }

    #[tokio::test]
    async fn persistent_inline_list_collapsed() {
        let provider = Arc::new(ScriptedProvider::texts(&[
            "1. Check the outlet. 2. Reset the board.",
            "Try (1) descaling the evaporator, or (2) replacing the pump.",
        ]));
        let invoker = PhaseInvoker::new(provider, "gpt-4", 0.3);
        let session = session_with_step("Make sure the power cord is seated.");

        let step = RemediationPolicy::default()
            .propose(&invoker, &session, &[], "no change", &[])
            .await
            .unwrap();
        assert!(step.starts_with("Try descaling the evaporator\n"));
        assert!(step.ends_with(REPORT_BACK));
        assert!(!has_list_structure(&step));
    }

    #[tokio::test]
    async fn persistent_repeat_is_turn_error() {
        let provider = Arc::new(ScriptedProvider::texts(&[
            "Make sure the power cord is seated.",
            "Make sure the power cord is seated!",
        ]));
        let invoker = PhaseInvoker::new(provider, "gpt-4", 0.3);
        let session = session_with_step("Make sure the power cord is seated.");

        let err = RemediationPolicy::default()
            .propose(&invoker, &session, &[], "no change", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, TurnError::RepeatedStep(_)));
    }
}
