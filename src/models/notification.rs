use super::Category;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    SoftNudge,
    WeeklyDigest,
}

impl NotificationType {
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "soft_nudge" => Ok(NotificationType::SoftNudge),
            "weekly_digest" => Ok(NotificationType::WeeklyDigest),
            _ => Err(format!("Invalid notification type: {}", s)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::SoftNudge => "soft_nudge",
            NotificationType::WeeklyDigest => "weekly_digest",
        }
    }
}

/// In-app notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub title: String,
    pub body: String,
    pub data: Value,
    pub read: bool,
    pub dismissed: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        user_id: Uuid,
        notification_type: NotificationType,
        title: impl Into<String>,
        body: impl Into<String>,
        data: Value,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            notification_type,
            title: title.into(),
            body: body.into(),
            data,
            read: false,
            dismissed: false,
            created_at: now,
        }
    }
}

/// Per-category entry of a weekly check-in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryChange {
    /// Whole percent above baseline
    pub change: i32,
    pub amount: Decimal,
}

/// Weekly reflection record written alongside the digest notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyCheckin {
    pub id: Uuid,
    pub user_id: Uuid,
    pub week_start: NaiveDate,
    pub summary: String,
    pub category_changes: BTreeMap<Category, CategoryChange>,
    pub user_response: Option<String>,
    pub user_note: Option<String>,
    pub created_at: DateTime<Utc>,
}
