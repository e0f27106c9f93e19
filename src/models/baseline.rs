use super::Category;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Aggregation period of a baseline or deviation. Only weekly is produced today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimePeriod {
    Weekly,
}

impl TimePeriod {
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "weekly" => Ok(TimePeriod::Weekly),
            _ => Err(format!("Invalid time period: {}", s)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TimePeriod::Weekly => "weekly",
        }
    }
}

/// Expected spend for one (user, category, period)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
    pub user_id: Uuid,
    pub category: Category,
    pub time_period: TimePeriod,
    pub baseline_amount: Decimal,
    pub baseline_count: i32,
    pub calculated_at: DateTime<Utc>,
}
