use super::Category;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// How well-established a pattern is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Strong,
    Emerging,
    Weak,
}

impl Confidence {
    /// The one place occurrences turn into a confidence tier.
    /// >= 6 strong, 3..=5 emerging, anything lower weak.
    pub fn from_occurrences(occurrences: usize) -> Self {
        if occurrences >= 6 {
            Confidence::Strong
        } else if occurrences >= 3 {
            Confidence::Emerging
        } else {
            Confidence::Weak
        }
    }

    /// Sort rank, strongest first
    pub fn rank(&self) -> u8 {
        match self {
            Confidence::Strong => 0,
            Confidence::Emerging => 1,
            Confidence::Weak => 2,
        }
    }

    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "strong" => Ok(Confidence::Strong),
            "emerging" => Ok(Confidence::Emerging),
            "weak" => Ok(Confidence::Weak),
            _ => Err(format!("Invalid confidence: {}", s)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::Strong => "strong",
            Confidence::Emerging => "emerging",
            Confidence::Weak => "weak",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Increasing,
    Stable,
    Decreasing,
}

impl Trend {
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "increasing" => Ok(Trend::Increasing),
            "stable" => Ok(Trend::Stable),
            "decreasing" => Ok(Trend::Decreasing),
            _ => Err(format!("Invalid trend: {}", s)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Trend::Increasing => "increasing",
            Trend::Stable => "stable",
            Trend::Decreasing => "decreasing",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    LateNight,
    Weekend,
    MorningRoutine,
    RegularMerchant,
}

impl PatternKind {
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s {
            "late_night" => Ok(PatternKind::LateNight),
            "weekend" => Ok(PatternKind::Weekend),
            "morning_routine" => Ok(PatternKind::MorningRoutine),
            "regular_merchant" => Ok(PatternKind::RegularMerchant),
            _ => Err(format!("Invalid pattern kind: {}", s)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PatternKind::LateNight => "late_night",
            PatternKind::Weekend => "weekend",
            PatternKind::MorningRoutine => "morning_routine",
            PatternKind::RegularMerchant => "regular_merchant",
        }
    }

    /// Fixed time range label shown next to the pattern
    pub fn time_range(&self) -> &'static str {
        match self {
            PatternKind::LateNight => "9 PM – 12 AM",
            PatternKind::Weekend => "Sat–Sun",
            PatternKind::MorningRoutine => "6 AM – 12 PM",
            PatternKind::RegularMerchant => "Last 90 days",
        }
    }
}

/// Identity of a pattern: what kind of habit, and about what.
///
/// `subject` is a category name for the temporal kinds and the merchant
/// name for [`PatternKind::RegularMerchant`]. The string form is
/// `"<kind>:<subject>"`, e.g. `late_night:food` or `regular_merchant:Swiggy`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct PatternKey {
    pub kind: PatternKind,
    pub subject: String,
}

impl PatternKey {
    pub fn for_category(kind: PatternKind, category: Category) -> Self {
        Self {
            kind,
            subject: category.as_str().to_string(),
        }
    }

    pub fn for_merchant(merchant: &str) -> Self {
        Self {
            kind: PatternKind::RegularMerchant,
            subject: merchant.to_string(),
        }
    }

    pub fn parse(s: &str) -> Result<Self, String> {
        let (kind, subject) = s
            .split_once(':')
            .ok_or_else(|| format!("Invalid pattern key: {}", s))?;
        let kind = PatternKind::from_str(kind)?;

        if subject.trim().is_empty() {
            return Err(format!("Invalid pattern key: {}", s));
        }
        if kind != PatternKind::RegularMerchant {
            Category::from_str(subject)?;
        }

        Ok(Self {
            kind,
            subject: subject.to_string(),
        })
    }

    /// Display title derived from the key
    pub fn title(&self) -> String {
        match self.kind {
            PatternKind::LateNight => format!("Late-night {}", self.subject),
            PatternKind::Weekend => format!("Weekend {}", self.subject),
            PatternKind::MorningRoutine => format!("Morning {} routine", self.subject),
            PatternKind::RegularMerchant => format!("Regular at {}", self.subject),
        }
    }
}

impl fmt::Display for PatternKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.as_str(), self.subject)
    }
}

impl From<PatternKey> for String {
    fn from(key: PatternKey) -> Self {
        key.to_string()
    }
}

impl TryFrom<String> for PatternKey {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        PatternKey::parse(&s)
    }
}

/// A detected recurring behaviour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pattern {
    pub user_id: Uuid,
    pub key: PatternKey,
    pub title: String,
    pub description: String,
    pub category: Category,
    pub confidence: Confidence,
    pub occurrences: i32,
    pub time_range: String,
    pub average_amount: Decimal,
    pub trend: Trend,
    /// Kept from the first upsert of this key
    pub first_detected: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}
