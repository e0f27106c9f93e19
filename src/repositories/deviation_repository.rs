use super::decode_error;
use crate::error::RepositoryError;
use crate::models::{Category, DeviationEvent, TimePeriod};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, FromRow)]
struct DeviationRow {
    id: Uuid,
    user_id: Uuid,
    category: String,
    deviation_percentage: i32,
    baseline_amount: Decimal,
    current_amount: Decimal,
    occurrence_count: i32,
    time_period: String,
    narrative: String,
    acknowledged: bool,
    acknowledged_response: Option<String>,
    cooldown_until: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl TryFrom<DeviationRow> for DeviationEvent {
    type Error = RepositoryError;

    fn try_from(row: DeviationRow) -> Result<Self, Self::Error> {
        Ok(DeviationEvent {
            id: row.id,
            user_id: row.user_id,
            category: Category::from_str(&row.category).map_err(decode_error)?,
            deviation_percentage: row.deviation_percentage,
            baseline_amount: row.baseline_amount,
            current_amount: row.current_amount,
            occurrence_count: row.occurrence_count,
            time_period: TimePeriod::from_str(&row.time_period).map_err(decode_error)?,
            narrative: row.narrative,
            acknowledged: row.acknowledged,
            acknowledged_response: row.acknowledged_response,
            cooldown_until: row.cooldown_until,
            created_at: row.created_at,
        })
    }
}

const COLUMNS: &str = r#"
    id, user_id, category, deviation_percentage, baseline_amount, current_amount,
    occurrence_count, time_period, narrative, acknowledged, acknowledged_response,
    cooldown_until, created_at
"#;

/// Repository for deviation events
pub struct DeviationRepository {
    pool: PgPool,
}

impl DeviationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Latest event for (user, category) whose cooldown runs past `now`
    pub async fn find_active_cooldown(
        &self,
        user_id: Uuid,
        category: Category,
        now: DateTime<Utc>,
    ) -> Result<Option<DeviationEvent>, RepositoryError> {
        let row = sqlx::query_as::<_, DeviationRow>(&format!(
            r#"
            SELECT {}
            FROM deviation_events
            WHERE user_id = $1 AND category = $2 AND cooldown_until > $3
            ORDER BY cooldown_until DESC
            LIMIT 1
            "#,
            COLUMNS
        ))
        .bind(user_id)
        .bind(category.as_str())
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        row.map(DeviationEvent::try_from).transpose()
    }

    /// Insert the event unless a cooldown for its (user, category) is still running.
    ///
    /// A transaction-scoped advisory lock on (user, category) serializes
    /// concurrent scans, so the re-check inside the transaction is authoritative.
    pub async fn create_unless_cooling(
        &self,
        event: &DeviationEvent,
        now: DateTime<Utc>,
    ) -> Result<Option<DeviationEvent>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(format!("{}:{}", event.user_id, event.category.as_str()))
            .execute(&mut *tx)
            .await?;

        let cooling: Option<Uuid> = sqlx::query_scalar(
            r#"
            SELECT id FROM deviation_events
            WHERE user_id = $1 AND category = $2 AND cooldown_until > $3
            LIMIT 1
            "#,
        )
        .bind(event.user_id)
        .bind(event.category.as_str())
        .bind(now)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(existing) = cooling {
            debug!(
                "Deviation for {} suppressed by cooldown of {}",
                event.category, existing
            );
            tx.commit().await?;
            return Ok(None);
        }

        let row = sqlx::query_as::<_, DeviationRow>(&format!(
            r#"
            INSERT INTO deviation_events
                (id, user_id, category, deviation_percentage, baseline_amount, current_amount,
                 occurrence_count, time_period, narrative, acknowledged, acknowledged_response,
                 cooldown_until, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING {}
            "#,
            COLUMNS
        ))
        .bind(event.id)
        .bind(event.user_id)
        .bind(event.category.as_str())
        .bind(event.deviation_percentage)
        .bind(event.baseline_amount)
        .bind(event.current_amount)
        .bind(event.occurrence_count)
        .bind(event.time_period.as_str())
        .bind(&event.narrative)
        .bind(event.acknowledged)
        .bind(&event.acknowledged_response)
        .bind(event.cooldown_until)
        .bind(event.created_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        DeviationEvent::try_from(row).map(Some)
    }

    /// Record the user's acknowledgment
    pub async fn acknowledge(
        &self,
        user_id: Uuid,
        id: Uuid,
        response: Option<&str>,
    ) -> Result<DeviationEvent, RepositoryError> {
        let row = sqlx::query_as::<_, DeviationRow>(&format!(
            r#"
            UPDATE deviation_events
            SET acknowledged = TRUE, acknowledged_response = $3
            WHERE id = $1 AND user_id = $2
            RETURNING {}
            "#,
            COLUMNS
        ))
        .bind(id)
        .bind(user_id)
        .bind(response)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| RepositoryError::NotFound(format!("deviation {}", id)))?;

        DeviationEvent::try_from(row)
    }

    /// All events of a user, newest first
    pub async fn find_by_user(&self, user_id: Uuid) -> Result<Vec<DeviationEvent>, RepositoryError> {
        let rows = sqlx::query_as::<_, DeviationRow>(&format!(
            "SELECT {} FROM deviation_events WHERE user_id = $1 ORDER BY created_at DESC",
            COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(DeviationEvent::try_from).collect()
    }
}
