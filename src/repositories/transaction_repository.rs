use super::decode_error;
use crate::error::RepositoryError;
use crate::models::{Category, ContextTag, DayOfWeek, TimeOfDay, Transaction};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// Row shape of the `transactions` table
#[derive(Debug, FromRow)]
struct TransactionRow {
    id: Uuid,
    user_id: Uuid,
    occurred_at: DateTime<Utc>,
    amount: Decimal,
    merchant: String,
    category: String,
    time_of_day: String,
    day_of_week: String,
    is_recurring: bool,
    context_tags: Vec<String>,
    custom_note: Option<String>,
}

impl TryFrom<TransactionRow> for Transaction {
    type Error = RepositoryError;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        let context_tags = row
            .context_tags
            .iter()
            .map(|t| ContextTag::from_str(t))
            .collect::<Result<Vec<_>, _>>()
            .map_err(decode_error)?;

        Ok(Transaction {
            id: row.id,
            user_id: row.user_id,
            timestamp: row.occurred_at,
            amount: row.amount,
            merchant: row.merchant,
            category: Category::from_str(&row.category).map_err(decode_error)?,
            time_of_day: TimeOfDay::from_str(&row.time_of_day).map_err(decode_error)?,
            day_of_week: DayOfWeek::from_str(&row.day_of_week).map_err(decode_error)?,
            is_recurring: row.is_recurring,
            context_tags,
            custom_note: row.custom_note,
        })
    }
}

const SELECT_COLUMNS: &str = r#"
    SELECT id, user_id, occurred_at, amount, merchant, category, time_of_day,
           day_of_week, is_recurring, context_tags, custom_note
    FROM transactions
"#;

/// Repository for transaction data access
pub struct TransactionRepository {
    pool: PgPool,
}

impl TransactionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a new transaction
    pub async fn create(&self, txn: &Transaction) -> Result<(), RepositoryError> {
        let tags: Vec<String> = txn.context_tags.iter().map(|t| t.as_str().to_string()).collect();

        sqlx::query(
            r#"
            INSERT INTO transactions
                (id, user_id, occurred_at, amount, merchant, category, time_of_day,
                 day_of_week, is_recurring, context_tags, custom_note)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(txn.id)
        .bind(txn.user_id)
        .bind(txn.timestamp)
        .bind(txn.amount)
        .bind(&txn.merchant)
        .bind(txn.category.as_str())
        .bind(txn.time_of_day.as_str())
        .bind(txn.day_of_week.as_str())
        .bind(txn.is_recurring)
        .bind(&tags)
        .bind(&txn.custom_note)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get the user's transactions within `[since, until]`, newest first
    pub async fn find_between(
        &self,
        user_id: Uuid,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<Transaction>, RepositoryError> {
        let rows = sqlx::query_as::<_, TransactionRow>(&format!(
            "{} WHERE user_id = $1 AND occurred_at >= $2 AND occurred_at <= $3 \
             ORDER BY occurred_at DESC, id",
            SELECT_COLUMNS
        ))
        .bind(user_id)
        .bind(since)
        .bind(until)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Transaction::try_from).collect()
    }

    /// Append tags that are not present yet, keeping existing order.
    /// A provided note replaces the stored one.
    pub async fn append_tags(
        &self,
        user_id: Uuid,
        id: Uuid,
        tags: &[ContextTag],
        note: Option<&str>,
    ) -> Result<Transaction, RepositoryError> {
        let tags: Vec<String> = tags.iter().map(|t| t.as_str().to_string()).collect();

        let row = sqlx::query_as::<_, TransactionRow>(
            r#"
            UPDATE transactions
            SET context_tags = context_tags || ARRAY(
                    SELECT DISTINCT t FROM unnest($3::text[]) AS t
                    WHERE NOT (t = ANY(context_tags))
                ),
                custom_note = COALESCE($4, custom_note)
            WHERE id = $1 AND user_id = $2
            RETURNING id, user_id, occurred_at, amount, merchant, category, time_of_day,
                      day_of_week, is_recurring, context_tags, custom_note
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(&tags)
        .bind(note)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| RepositoryError::NotFound(format!("transaction {}", id)))?;

        Transaction::try_from(row)
    }

    /// Distinct users with transactions since a point in time
    pub async fn user_ids_since(&self, since: DateTime<Utc>) -> Result<Vec<Uuid>, RepositoryError> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT DISTINCT user_id FROM transactions WHERE occurred_at >= $1 ORDER BY user_id",
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }
}
