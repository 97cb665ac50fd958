//! Heuristic detectors over the engine's freeform step text.
//!
//! All functions are pure and case-insensitive. Matching is by substring, so
//! "researching" counts as searching and "typed" counts as acting.

use std::collections::HashSet;
use std::fmt;

/// Coarse activity phase inferred from a step description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Searching,
    Comparing,
    Acting,
    Extracting,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Searching => "searching",
            Phase::Comparing => "comparing",
            Phase::Acting => "acting",
            Phase::Extracting => "extracting",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Checked in order; the first phase with a matching keyword wins.
const PHASE_KEYWORDS: &[(Phase, &[&str])] = &[
    (
        Phase::Searching,
        &["search", "find", "look", "browse", "navigate"],
    ),
    (
        Phase::Comparing,
        &["compare", "evaluate", "review", "assess", "weigh"],
    ),
    (
        Phase::Acting,
        &["click", "select", "choose", "submit", "fill", "type"],
    ),
    (
        Phase::Extracting,
        &["extract", "read", "get", "copy", "scrape", "collect"],
    ),
];

const HEDGING_PHRASES: &[&str] = &[
    "unsure",
    "uncertain",
    "might",
    "could be",
    "not certain",
    "unclear",
];

const COMPLETION_PHRASES: &[&str] = &["completed", "found", "successfully", "done"];

const FAILURE_PHRASES: &[&str] = &["failure", "failed"];

fn contains_any(text: &str, needles: &[&str]) -> bool {
    let lower = text.to_lowercase();
    needles.iter().any(|n| lower.contains(n))
}

/// Infers the activity phase of a step description.
pub fn classify_phase(description: &str) -> Option<Phase> {
    let lower = description.to_lowercase();
    PHASE_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| lower.contains(k)))
        .map(|(phase, _)| *phase)
}

/// True when the evaluation expresses uncertainty.
pub fn is_hedging(evaluation: &str) -> bool {
    contains_any(evaluation, HEDGING_PHRASES)
}

/// True when the evaluation reports something finished or found.
pub fn is_completion(evaluation: &str) -> bool {
    contains_any(evaluation, COMPLETION_PHRASES)
}

/// True when the evaluation reports a failed step.
pub fn is_failure(evaluation: &str) -> bool {
    contains_any(evaluation, FAILURE_PHRASES)
}

/// Jaccard similarity of the lower-cased whitespace word sets of `a` and `b`.
///
/// Returns 0.0 when either side has no words.
pub fn word_similarity(a: &str, b: &str) -> f64 {
    let a_lower = a.to_lowercase();
    let b_lower = b.to_lowercase();
    let words_a: HashSet<&str> = a_lower.split_whitespace().collect();
    let words_b: HashSet<&str> = b_lower.split_whitespace().collect();
    if words_a.is_empty() || words_b.is_empty() {
        return 0.0;
    }
    let shared = words_a.intersection(&words_b).count();
    let total = words_a.union(&words_b).count();
    shared as f64 / total as f64
}

/// True when every pair among the last `window` actions is at least
/// `threshold` similar.
pub fn is_repetitive<S: AsRef<str>>(actions: &[S], window: usize, threshold: f64) -> bool {
    if window == 0 || actions.len() < window {
        return false;
    }
    let recent = &actions[actions.len() - window..];
    recent.iter().enumerate().all(|(i, a)| {
        recent[i + 1..]
            .iter()
            .all(|b| word_similarity(a.as_ref(), b.as_ref()) >= threshold)
    })
}
