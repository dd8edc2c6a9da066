//! Conditioning inputs rendered from session state for each phase.

use fixdesk_config::DeviceModel;
use fixdesk_core::knowledge::RetrievalResult;
use fixdesk_core::session::ConversationSession;

/// Find the first catalog model mentioned in `text` (case-insensitive).
pub fn find_device<'a>(devices: &'a [DeviceModel], text: &str) -> Option<&'a DeviceModel> {
    let upper = text.to_uppercase();
    devices
        .iter()
        .find(|d| contains_word(&upper, &d.model.to_uppercase()))
}

/// `needle` occurs in `haystack` not glued to other alphanumerics, so
/// "EH222" does not match inside "EH2220".
fn contains_word(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    haystack.match_indices(needle).any(|(start, _)| {
        let before = haystack[..start].chars().next_back();
        let after = haystack[start + needle.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

/// Device label for prompts and knowledge queries: the catalog model when
/// one is recognisable, otherwise the recorded confirmation text.
pub fn device_label(session: &ConversationSession, devices: &[DeviceModel]) -> String {
    let confirmed = session.device_confirmed.as_deref().unwrap_or_default();
    find_device(devices, confirmed)
        .map(|d| d.model.clone())
        .unwrap_or_else(|| confirmed.to_string())
}

pub fn device_inputs(user_text: &str) -> Vec<(&'static str, String)> {
    vec![("User message", user_text.to_string())]
}

pub fn symptom_inputs(
    session: &ConversationSession,
    devices: &[DeviceModel],
    user_text: &str,
) -> Vec<(&'static str, String)> {
    let history = session.transcript.render();
    vec![
        ("Device", device_info(session, devices)),
        (
            "Previous conversation",
            if history.is_empty() { "(none)".into() } else { history },
        ),
        ("Symptom questions asked so far", session.symptom_turns.to_string()),
        ("User response", user_text.to_string()),
    ]
}

pub fn solver_inputs(
    session: &ConversationSession,
    devices: &[DeviceModel],
    user_text: &str,
    grounding: &[RetrievalResult],
) -> Vec<(&'static str, String)> {
    let history = session.troubleshooting_history.render();
    let mut inputs = vec![
        ("Device information", device_info(session, devices)),
        (
            "Symptoms gathered",
            session.symptom_summary.clone().unwrap_or_default(),
        ),
        (
            "Previous troubleshooting steps",
            if history.is_empty() { "(none yet)".into() } else { history },
        ),
        ("Current step number", (session.step_counter + 1).to_string()),
        ("User response", user_text.to_string()),
    ];
    if !grounding.is_empty() {
        inputs.push(("Relevant solutions from the knowledge base", grounding_block(grounding)));
    }
    inputs
}

/// Text used to query the knowledge base during remediation.
pub fn problem_description(session: &ConversationSession, user_text: &str) -> String {
    match &session.symptom_summary {
        Some(summary) => format!("{summary}\n{user_text}"),
        None => user_text.to_string(),
    }
}

fn device_info(session: &ConversationSession, devices: &[DeviceModel]) -> String {
    let confirmed = session.device_confirmed.as_deref().unwrap_or("unknown");
    match find_device(devices, confirmed) {
        Some(device) => device.display_name(),
        None => confirmed.to_string(),
    }
}

/// Render retrieved solutions as a numbered reference block.
pub fn grounding_block(results: &[RetrievalResult]) -> String {
    results
        .iter()
        .enumerate()
        .map(|(i, r)| {
            let mut entry = format!(
                "Solution {} (relevance {:.2})\n  Problem: {}\n  Solution: {}",
                i + 1,
                r.score,
                r.problem,
                r.solution
            );
            if let Some(reference) = &r.manual_reference {
                entry.push_str(&format!("\n  Manual reference: {reference}"));
            }
            entry
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
