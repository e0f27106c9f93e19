use super::{Category, TimePeriod};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A detected breach of a category's weekly baseline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviationEvent {
    pub id: Uuid,
    pub user_id: Uuid,
    pub category: Category,
    /// Whole percent above the category's own baseline
    pub deviation_percentage: i32,
    pub baseline_amount: Decimal,
    pub current_amount: Decimal,
    pub occurrence_count: i32,
    pub time_period: TimePeriod,
    pub narrative: String,
    pub acknowledged: bool,
    pub acknowledged_response: Option<String>,
    pub cooldown_until: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl DeviationEvent {
    /// Create a new, unacknowledged weekly deviation
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        user_id: Uuid,
        category: Category,
        deviation_percentage: i32,
        baseline_amount: Decimal,
        current_amount: Decimal,
        occurrence_count: i32,
        narrative: String,
        now: DateTime<Utc>,
        cooldown: chrono::Duration,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            category,
            deviation_percentage,
            baseline_amount,
            current_amount,
            occurrence_count,
            time_period: TimePeriod::Weekly,
            narrative,
            acknowledged: false,
            acknowledged_response: None,
            cooldown_until: now + cooldown,
            created_at: now,
        }
    }

    /// Whether this event still suppresses new events for its category at `now`
    pub fn is_cooling_down(&self, now: DateTime<Utc>) -> bool {
        self.cooldown_until > now
    }
}
