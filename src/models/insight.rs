use super::{Category, Confidence, ContextTag, DayOfWeek, Pattern, PatternKey, Trend};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// User verdict on an insight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feedback {
    Accurate,
    NotQuite,
}

impl Feedback {
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "accurate" => Ok(Feedback::Accurate),
            "not_quite" => Ok(Feedback::NotQuite),
            _ => Err(format!("Invalid feedback: {}", s)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Feedback::Accurate => "accurate",
            Feedback::NotQuite => "not_quite",
        }
    }
}

/// Presentation state stored per (user, pattern key)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightState {
    pub user_id: Uuid,
    pub pattern_key: PatternKey,
    pub dismissed: bool,
    pub feedback: Option<Feedback>,
    pub updated_at: DateTime<Utc>,
}

impl InsightState {
    pub fn new(user_id: Uuid, pattern_key: PatternKey, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            pattern_key,
            dismissed: false,
            feedback: None,
            updated_at: now,
        }
    }
}

/// Read-side view of a pattern joined with its insight state. Never stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Insight {
    pub key: PatternKey,
    pub title: String,
    pub description: String,
    pub category: Category,
    pub confidence: Confidence,
    pub occurrences: i32,
    pub time_range: String,
    pub average_amount: Decimal,
    pub trend: Trend,
    pub dismissed: bool,
    pub feedback: Option<Feedback>,
    pub last_updated: DateTime<Utc>,
}

impl Insight {
    pub fn from_pattern(pattern: &Pattern, state: Option<&InsightState>) -> Self {
        Self {
            key: pattern.key.clone(),
            title: pattern.title.clone(),
            description: pattern.description.clone(),
            category: pattern.category,
            confidence: pattern.confidence,
            occurrences: pattern.occurrences,
            time_range: pattern.time_range.clone(),
            average_amount: pattern.average_amount,
            trend: pattern.trend,
            dismissed: state.map(|s| s.dismissed).unwrap_or(false),
            feedback: state.and_then(|s| s.feedback),
            last_updated: pattern.last_updated,
        }
    }
}

/// Matching transactions per weekday, Monday first
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WeekdayHeatmap {
    #[serde(rename = "Mon")]
    pub mon: u32,
    #[serde(rename = "Tue")]
    pub tue: u32,
    #[serde(rename = "Wed")]
    pub wed: u32,
    #[serde(rename = "Thu")]
    pub thu: u32,
    #[serde(rename = "Fri")]
    pub fri: u32,
    #[serde(rename = "Sat")]
    pub sat: u32,
    #[serde(rename = "Sun")]
    pub sun: u32,
}

impl WeekdayHeatmap {
    pub fn record(&mut self, day: DayOfWeek) {
        let slot = match day {
            DayOfWeek::Monday => &mut self.mon,
            DayOfWeek::Tuesday => &mut self.tue,
            DayOfWeek::Wednesday => &mut self.wed,
            DayOfWeek::Thursday => &mut self.thu,
            DayOfWeek::Friday => &mut self.fri,
            DayOfWeek::Saturday => &mut self.sat,
            DayOfWeek::Sunday => &mut self.sun,
        };
        *slot += 1;
    }

    pub fn total(&self) -> u32 {
        self.mon + self.tue + self.wed + self.thu + self.fri + self.sat + self.sun
    }
}

/// Short reflective story built around one pattern. Never stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MomentStory {
    pub key: PatternKey,
    pub title: String,
    pub narrative: String,
    pub category: Category,
    pub confidence: Confidence,
    pub occurrences: i32,
    pub context_tags: Vec<ContextTag>,
    pub heatmap: WeekdayHeatmap,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heatmap_counts_per_day() {
        let mut heatmap = WeekdayHeatmap::default();
        heatmap.record(DayOfWeek::Saturday);
        heatmap.record(DayOfWeek::Saturday);
        heatmap.record(DayOfWeek::Monday);

        assert_eq!(heatmap.sat, 2);
        assert_eq!(heatmap.mon, 1);
        assert_eq!(heatmap.total(), 3);

        let json = serde_json::to_value(heatmap).unwrap();
        assert_eq!(json["Sat"], 2);
        assert_eq!(json["Sun"], 0);
    }

    #[test]
    fn test_feedback_parsing() {
        assert_eq!(Feedback::from_str("not_quite").unwrap(), Feedback::NotQuite);
        assert!(Feedback::from_str("meh").is_err());
    }
}
