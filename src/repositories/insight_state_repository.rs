use super::decode_error;
use crate::error::RepositoryError;
use crate::models::{Feedback, InsightState, PatternKey};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

#[derive(Debug, FromRow)]
struct InsightStateRow {
    user_id: Uuid,
    pattern_key: String,
    dismissed: bool,
    feedback: Option<String>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<InsightStateRow> for InsightState {
    type Error = RepositoryError;

    fn try_from(row: InsightStateRow) -> Result<Self, Self::Error> {
        Ok(InsightState {
            user_id: row.user_id,
            pattern_key: PatternKey::parse(&row.pattern_key).map_err(decode_error)?,
            dismissed: row.dismissed,
            feedback: row
                .feedback
                .as_deref()
                .map(Feedback::from_str)
                .transpose()
                .map_err(decode_error)?,
            updated_at: row.updated_at,
        })
    }
}

/// Repository for insight dismissal and feedback state
pub struct InsightStateRepository {
    pool: PgPool,
}

impl InsightStateRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn upsert(&self, state: &InsightState) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO insight_states (user_id, pattern_key, dismissed, feedback, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id, pattern_key) DO UPDATE
            SET dismissed = EXCLUDED.dismissed,
                feedback = EXCLUDED.feedback,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(state.user_id)
        .bind(state.pattern_key.to_string())
        .bind(state.dismissed)
        .bind(state.feedback.map(|f| f.as_str()))
        .bind(state.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn find_by_user(&self, user_id: Uuid) -> Result<Vec<InsightState>, RepositoryError> {
        let rows = sqlx::query_as::<_, InsightStateRow>(
            r#"
            SELECT user_id, pattern_key, dismissed, feedback, updated_at
            FROM insight_states
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(InsightState::try_from).collect()
    }
}
