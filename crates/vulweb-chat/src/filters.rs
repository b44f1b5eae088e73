//! Free-text filter extraction for capability agents.

use regex::Regex;
use std::sync::LazyLock;

static NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+(?:\.\d+)?").expect("Invalid number regex"));

const COMPARATORS: &[&str] = &["greater", ">", "above", "more than"];

/// True if `message_lower` contains any of `phrases`.
pub fn contains_any(message_lower: &str, phrases: &[&str]) -> bool {
    phrases.iter().any(|p| message_lower.contains(p))
}

/// True if the message asks for a lower bound ("greater", ">", ...).
pub fn has_comparator(message_lower: &str) -> bool {
    contains_any(message_lower, COMPARATORS)
}

/// First numeric token as a fraction.
///
/// Values above 1 are read as percentages ("90" and "90%" give 0.9);
/// values at or below 1 are already fractions. `None` when the message
/// carries no number.
pub fn parse_threshold(message: &str) -> Option<f64> {
    let value: f64 = NUMBER_RE.find(message)?.as_str().parse().ok()?;
    Some(if value > 1.0 { value / 100.0 } else { value })
}
