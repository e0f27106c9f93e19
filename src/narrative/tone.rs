//! Tone policy for user-facing narrative text.
//!
//! Text must speak tentatively and must not prescribe or judge.

use once_cell::sync::Lazy;
use regex::Regex;

static TENTATIVE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(it looks like|you tend to|this might suggest|we noticed|might|could|seems)\b")
        .unwrap()
});

static PRESCRIPTIVE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(you should|overspending|always|must|mistakes?)\b").unwrap()
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToneViolation {
    /// No tentative phrasing at all
    NotTentative,
    /// Contains a banned phrase
    Prescriptive(String),
}

impl std::fmt::Display for ToneViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ToneViolation::NotTentative => write!(f, "missing tentative phrasing"),
            ToneViolation::Prescriptive(phrase) => write!(f, "prescriptive phrase \"{}\"", phrase),
        }
    }
}

pub fn check_tone(text: &str) -> Result<(), ToneViolation> {
    if let Some(found) = PRESCRIPTIVE.find(text) {
        return Err(ToneViolation::Prescriptive(found.as_str().to_lowercase()));
    }
    if !TENTATIVE.is_match(text) {
        return Err(ToneViolation::NotTentative);
    }
    Ok(())
}
