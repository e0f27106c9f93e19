use crate::error::RepositoryError;
use crate::models::NotificationPreferences;
use serde_json::Value;
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;

/// Repository for per-user notification preferences (stored as JSONB)
pub struct PreferencesRepository {
    pool: PgPool,
}

impl PreferencesRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Stored preferences, or `None` if the user never saved any.
    /// A stored blob that no longer parses is treated as defaults.
    pub async fn find(&self, user_id: Uuid) -> Result<Option<NotificationPreferences>, RepositoryError> {
        let blob: Option<Json<Value>> = sqlx::query_scalar(
            "SELECT notification_preferences FROM user_preferences WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(blob.map(|Json(value)| {
            serde_json::from_value(value).unwrap_or_else(|e| {
                warn!("Stored preferences for {} are invalid, using defaults: {}", user_id, e);
                NotificationPreferences::default()
            })
        }))
    }

    pub async fn save(
        &self,
        user_id: Uuid,
        preferences: &NotificationPreferences,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO user_preferences (user_id, notification_preferences, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (user_id) DO UPDATE
            SET notification_preferences = EXCLUDED.notification_preferences,
                updated_at = NOW()
            "#,
        )
        .bind(user_id)
        .bind(Json(preferences))
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
