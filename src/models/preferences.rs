use super::Category;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// How large a weekly jump must be before it is reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sensitivity {
    Low,
    Medium,
    High,
}

impl Sensitivity {
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Sensitivity::Low),
            "medium" => Ok(Sensitivity::Medium),
            "high" => Ok(Sensitivity::High),
            _ => Err(format!(
                "Invalid sensitivity: {}. Must be one of: [\"low\", \"medium\", \"high\"]",
                s
            )),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Sensitivity::Low => "low",
            Sensitivity::Medium => "medium",
            Sensitivity::High => "high",
        }
    }

    /// Minimum relative increase over baseline: low 0.75, medium 0.50, high 0.25
    pub fn threshold(&self) -> Decimal {
        match self {
            Sensitivity::Low => Decimal::new(75, 2),
            Sensitivity::Medium => Decimal::new(50, 2),
            Sensitivity::High => Decimal::new(25, 2),
        }
    }
}

impl Default for Sensitivity {
    fn default() -> Self {
        Sensitivity::Medium
    }
}

/// Per-user notification settings.
///
/// Missing fields deserialize to their defaults, so a partially stored blob
/// still yields a usable value. Unknown sensitivities or categories fail to
/// deserialize, which rejects them at the HTTP boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NotificationPreferences {
    pub weekly_digest: bool,
    pub soft_nudges: bool,
    pub sensitivity: Sensitivity,
    pub muted_categories: BTreeSet<Category>,
}

impl Default for NotificationPreferences {
    fn default() -> Self {
        Self {
            weekly_digest: true,
            soft_nudges: false,
            sensitivity: Sensitivity::Medium,
            muted_categories: BTreeSet::new(),
        }
    }
}

impl NotificationPreferences {
    pub fn is_muted(&self, category: Category) -> bool {
        self.muted_categories.contains(&category)
    }
}
