use super::decode_error;
use crate::error::RepositoryError;
use crate::models::{Category, CategoryChange, Notification, NotificationType, WeeklyCheckin};
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use std::collections::BTreeMap;
use uuid::Uuid;

#[derive(Debug, FromRow)]
struct NotificationRow {
    id: Uuid,
    user_id: Uuid,
    #[sqlx(rename = "type")]
    notification_type: String,
    title: String,
    body: String,
    data: Json<Value>,
    read: bool,
    dismissed: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<NotificationRow> for Notification {
    type Error = RepositoryError;

    fn try_from(row: NotificationRow) -> Result<Self, Self::Error> {
        Ok(Notification {
            id: row.id,
            user_id: row.user_id,
            notification_type: NotificationType::from_str(&row.notification_type)
                .map_err(decode_error)?,
            title: row.title,
            body: row.body,
            data: row.data.0,
            read: row.read,
            dismissed: row.dismissed,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct CheckinRow {
    id: Uuid,
    user_id: Uuid,
    week_start: NaiveDate,
    summary: String,
    category_changes: Json<BTreeMap<Category, CategoryChange>>,
    user_response: Option<String>,
    user_note: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<CheckinRow> for WeeklyCheckin {
    fn from(row: CheckinRow) -> Self {
        WeeklyCheckin {
            id: row.id,
            user_id: row.user_id,
            week_start: row.week_start,
            summary: row.summary,
            category_changes: row.category_changes.0,
            user_response: row.user_response,
            user_note: row.user_note,
            created_at: row.created_at,
        }
    }
}

/// Repository for notifications and the weekly check-ins written with digests
pub struct NotificationRepository {
    pool: PgPool,
}

impl NotificationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, notification: &Notification) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO notifications (id, user_id, type, title, body, data, read, dismissed, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(notification.id)
        .bind(notification.user_id)
        .bind(notification.notification_type.as_str())
        .bind(&notification.title)
        .bind(&notification.body)
        .bind(Json(&notification.data))
        .bind(notification.read)
        .bind(notification.dismissed)
        .bind(notification.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Notifications of a user, newest first
    pub async fn find_by_user(&self, user_id: Uuid) -> Result<Vec<Notification>, RepositoryError> {
        let rows = sqlx::query_as::<_, NotificationRow>(
            r#"
            SELECT id, user_id, type, title, body, data, read, dismissed, created_at
            FROM notifications
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Notification::try_from).collect()
    }

    /// Insert a check-in; a second one for the same (user, week) is ignored.
    /// Returns whether a row was written.
    pub async fn create_checkin(&self, checkin: &WeeklyCheckin) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r#"
            INSERT INTO weekly_checkins
                (id, user_id, week_start, summary, category_changes, user_response, user_note, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (user_id, week_start) DO NOTHING
            "#,
        )
        .bind(checkin.id)
        .bind(checkin.user_id)
        .bind(checkin.week_start)
        .bind(&checkin.summary)
        .bind(Json(&checkin.category_changes))
        .bind(&checkin.user_response)
        .bind(&checkin.user_note)
        .bind(checkin.created_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn find_checkins_by_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<WeeklyCheckin>, RepositoryError> {
        let rows = sqlx::query_as::<_, CheckinRow>(
            r#"
            SELECT id, user_id, week_start, summary, category_changes, user_response, user_note, created_at
            FROM weekly_checkins
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(WeeklyCheckin::from).collect())
    }
}
