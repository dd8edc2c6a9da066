//! Classify the user's report on a proposed remediation step.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feedback {
    Resolved,
    NotResolved,
    Unclear,
}

/// Leading answers that settle the question on their own.
const AFFIRM_LEAD: &[&str] = &["yes", "yep", "yeah", "yup", "sure"];
const DENY_LEAD: &[&str] = &["no", "nope", "nah"];

/// "No more problems" and "no issues" describe the fault going away.
const ABSENCE: &[&str] = &[
    "more", "longer", "problem", "problems", "issue", "issues", "error", "errors", "leak",
    "leaks", "noise",
];

const NEGATIVE: &[&str] = &[
    "not", "didn't", "didnt", "doesn't", "doesnt", "don't", "dont", "isn't", "isnt", "won't",
    "wont", "can't", "cant", "failed", "nope", "neither", "broken",
];

const NEGATIVE_PHRASES: &[[&str; 2]] = &[
    ["no", "luck"],
    ["no", "change"],
    ["no", "difference"],
    ["same", "problem"],
    ["same", "issue"],
    ["same", "thing"],
    ["nothing", "changed"],
    ["nothing", "happened"],
];

const CONTRAST: &[&str] = &["but", "however", "though", "although", "except"];

const POSITIVE: &[&str] = &[
    "yes", "yep", "yeah", "yup", "fixed", "worked", "works", "working", "resolved", "solved",
    "thanks", "great", "perfect",
];

/// Phrase-based classification.
///
/// A leading yes/no answers the question unless a contrast clause carries a
/// negation ("yes, but it still leaks"). Otherwise negation wins over
/// affirmation, so "not fixed" and "still not working" are `NotResolved`.
pub fn classify(text: &str) -> Feedback {
    let normalized = text.to_lowercase().replace('\u{2019}', "'");
    let tokens: Vec<&str> = normalized
        .split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .filter(|t| !t.is_empty())
        .collect();

    let Some(first) = tokens.first() else {
        return Feedback::Unclear;
    };

    if AFFIRM_LEAD.contains(first) {
        return match tokens.iter().position(|t| CONTRAST.contains(t)) {
            Some(i) if has_negation(&tokens[i + 1..]) => Feedback::NotResolved,
            _ => Feedback::Resolved,
        };
    }
    if DENY_LEAD.contains(first) && !tokens.get(1).is_some_and(|t| ABSENCE.contains(t)) {
        return Feedback::NotResolved;
    }

    if has_negation(&tokens) {
        Feedback::NotResolved
    } else if tokens.iter().any(|t| POSITIVE.contains(t)) {
        Feedback::Resolved
    } else {
        Feedback::Unclear
    }
}

fn has_negation(tokens: &[&str]) -> bool {
    if tokens.iter().any(|t| NEGATIVE.contains(t)) {
        return true;
    }
    tokens.windows(2).any(|pair| {
        NEGATIVE_PHRASES.iter().any(|phrase| pair == phrase)
            // "still leaks", but not "still works"
            || (pair[0] == "still" && !POSITIVE.contains(&pair[1]))
    })
}
