use crate::config::DetectionConfig;
use crate::error::{AppError, AppResult};
use crate::models::{ContextTag, NewTransaction, Transaction};
use crate::storage::InsightStorage;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Ingestion and after-the-fact tagging of transactions
pub struct TransactionService {
    storage: Arc<dyn InsightStorage>,
    detection: DetectionConfig,
}

impl TransactionService {
    pub fn new(storage: Arc<dyn InsightStorage>, detection: DetectionConfig) -> Self {
        Self { storage, detection }
    }

    /// Validate, derive local buckets, store
    pub async fn record_transaction(
        &self,
        user_id: Uuid,
        input: NewTransaction,
    ) -> AppResult<Transaction> {
        input.validate().map_err(AppError::Validation)?;

        let txn = input.into_transaction(user_id, self.detection.utc_offset);
        self.storage.insert_transaction(&txn).await?;

        info!(
            "Recorded transaction {} for user {}: {} {} at {}",
            txn.id, user_id, txn.amount, txn.category, txn.merchant
        );
        Ok(txn)
    }

    /// Append context tags and optionally set the note. Existing tags are kept.
    pub async fn tag_transaction(
        &self,
        user_id: Uuid,
        transaction_id: Uuid,
        tags: &[ContextTag],
        note: Option<&str>,
    ) -> AppResult<Transaction> {
        let note = note.map(str::trim).filter(|n| !n.is_empty());
        if tags.is_empty() && note.is_none() {
            return Err(AppError::Validation(
                "At least one context tag or a note is required".into(),
            ));
        }

        let txn = self
            .storage
            .append_context_tags(user_id, transaction_id, tags, note)
            .await?;

        info!("Tagged transaction {} for user {}", transaction_id, user_id);
        Ok(txn)
    }
}
