use super::decode_error;
use crate::error::RepositoryError;
use crate::models::{Baseline, Category, TimePeriod};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

#[derive(Debug, FromRow)]
struct BaselineRow {
    user_id: Uuid,
    category: String,
    time_period: String,
    baseline_amount: Decimal,
    baseline_count: i32,
    calculated_at: DateTime<Utc>,
}

impl TryFrom<BaselineRow> for Baseline {
    type Error = RepositoryError;

    fn try_from(row: BaselineRow) -> Result<Self, Self::Error> {
        Ok(Baseline {
            user_id: row.user_id,
            category: Category::from_str(&row.category).map_err(decode_error)?,
            time_period: TimePeriod::from_str(&row.time_period).map_err(decode_error)?,
            baseline_amount: row.baseline_amount,
            baseline_count: row.baseline_count,
            calculated_at: row.calculated_at,
        })
    }
}

/// Repository for spending baselines
pub struct BaselineRepository {
    pool: PgPool,
}

impl BaselineRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert or overwrite the baseline for (user, category, period)
    pub async fn upsert(&self, baseline: &Baseline) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO spending_baselines
                (user_id, category, time_period, baseline_amount, baseline_count, calculated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (user_id, category, time_period) DO UPDATE
            SET baseline_amount = EXCLUDED.baseline_amount,
                baseline_count = EXCLUDED.baseline_count,
                calculated_at = EXCLUDED.calculated_at
            "#,
        )
        .bind(baseline.user_id)
        .bind(baseline.category.as_str())
        .bind(baseline.time_period.as_str())
        .bind(baseline.baseline_amount)
        .bind(baseline.baseline_count)
        .bind(baseline.calculated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// All baselines of a user, ordered by category
    pub async fn find_by_user(&self, user_id: Uuid) -> Result<Vec<Baseline>, RepositoryError> {
        let rows = sqlx::query_as::<_, BaselineRow>(
            r#"
            SELECT user_id, category, time_period, baseline_amount, baseline_count, calculated_at
            FROM spending_baselines
            WHERE user_id = $1
            ORDER BY category
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Baseline::try_from).collect()
    }
}
