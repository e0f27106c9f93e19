use super::decode_error;
use crate::error::RepositoryError;
use crate::models::{Category, Confidence, Pattern, PatternKey, Trend};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

#[derive(Debug, FromRow)]
struct PatternRow {
    user_id: Uuid,
    pattern_key: String,
    title: String,
    description: String,
    category: String,
    confidence: String,
    occurrences: i32,
    time_range: String,
    average_amount: Decimal,
    trend: String,
    first_detected: DateTime<Utc>,
    last_updated: DateTime<Utc>,
}

impl TryFrom<PatternRow> for Pattern {
    type Error = RepositoryError;

    fn try_from(row: PatternRow) -> Result<Self, Self::Error> {
        Ok(Pattern {
            user_id: row.user_id,
            key: PatternKey::parse(&row.pattern_key).map_err(decode_error)?,
            title: row.title,
            description: row.description,
            category: Category::from_str(&row.category).map_err(decode_error)?,
            confidence: Confidence::from_str(&row.confidence).map_err(decode_error)?,
            occurrences: row.occurrences,
            time_range: row.time_range,
            average_amount: row.average_amount,
            trend: Trend::from_str(&row.trend).map_err(decode_error)?,
            first_detected: row.first_detected,
            last_updated: row.last_updated,
        })
    }
}

const RETURNING_COLUMNS: &str = r#"
    user_id, pattern_key, title, description, category, confidence, occurrences,
    time_range, average_amount, trend, first_detected, last_updated
"#;

/// Repository for detected spending patterns
pub struct PatternRepository {
    pool: PgPool,
}

impl PatternRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert or refresh a pattern keyed on (user, pattern_key).
    /// `first_detected` of an existing row is left untouched.
    pub async fn upsert(&self, pattern: &Pattern) -> Result<Pattern, RepositoryError> {
        let row = sqlx::query_as::<_, PatternRow>(&format!(
            r#"
            INSERT INTO spending_patterns
                (user_id, pattern_key, title, description, category, confidence, occurrences,
                 time_range, average_amount, trend, first_detected, last_updated)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (user_id, pattern_key) DO UPDATE
            SET title = EXCLUDED.title,
                description = EXCLUDED.description,
                category = EXCLUDED.category,
                confidence = EXCLUDED.confidence,
                occurrences = EXCLUDED.occurrences,
                time_range = EXCLUDED.time_range,
                average_amount = EXCLUDED.average_amount,
                trend = EXCLUDED.trend,
                last_updated = EXCLUDED.last_updated
            RETURNING {}
            "#,
            RETURNING_COLUMNS
        ))
        .bind(pattern.user_id)
        .bind(pattern.key.to_string())
        .bind(&pattern.title)
        .bind(&pattern.description)
        .bind(pattern.category.as_str())
        .bind(pattern.confidence.as_str())
        .bind(pattern.occurrences)
        .bind(&pattern.time_range)
        .bind(pattern.average_amount)
        .bind(pattern.trend.as_str())
        .bind(pattern.first_detected)
        .bind(pattern.last_updated)
        .fetch_one(&self.pool)
        .await?;

        Pattern::try_from(row)
    }

    /// All patterns of a user, strongest and most frequent first
    pub async fn find_by_user(&self, user_id: Uuid) -> Result<Vec<Pattern>, RepositoryError> {
        let rows = sqlx::query_as::<_, PatternRow>(&format!(
            r#"
            SELECT {}
            FROM spending_patterns
            WHERE user_id = $1
            ORDER BY CASE confidence WHEN 'strong' THEN 0 WHEN 'emerging' THEN 1 ELSE 2 END,
                     occurrences DESC,
                     pattern_key
            "#,
            RETURNING_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Pattern::try_from).collect()
    }

    pub async fn find_by_key(
        &self,
        user_id: Uuid,
        key: &PatternKey,
    ) -> Result<Option<Pattern>, RepositoryError> {
        let row = sqlx::query_as::<_, PatternRow>(&format!(
            "SELECT {} FROM spending_patterns WHERE user_id = $1 AND pattern_key = $2",
            RETURNING_COLUMNS
        ))
        .bind(user_id)
        .bind(key.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Pattern::try_from).transpose()
    }
}
