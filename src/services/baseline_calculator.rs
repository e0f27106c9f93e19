use crate::config::DetectionConfig;
use crate::error::AppResult;
use crate::models::{Baseline, Category, TimePeriod};
use crate::services::round_whole;
use crate::storage::InsightStorage;
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BaselineOutcome {
    pub calculated: bool,
    pub categories: usize,
}

/// Recomputes weekly per-category baselines from the trailing window.
///
/// The window total is divided by a fixed number of weeks
/// (`BASELINE_WEEKS`), so users with less history than the window get
/// lower baselines than their real weekly spend.
pub struct BaselineCalculator {
    storage: Arc<dyn InsightStorage>,
    detection: DetectionConfig,
}

impl BaselineCalculator {
    pub fn new(storage: Arc<dyn InsightStorage>, detection: DetectionConfig) -> Self {
        Self { storage, detection }
    }

    pub async fn calculate_baselines(&self, user_id: Uuid) -> AppResult<BaselineOutcome> {
        self.calculate_baselines_at(user_id, Utc::now()).await
    }

    pub async fn calculate_baselines_at(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> AppResult<BaselineOutcome> {
        let transactions = self
            .storage
            .transactions_between(user_id, now - self.detection.window(), now)
            .await?;

        if transactions.is_empty() {
            debug!("No transactions in window for user {}, baselines untouched", user_id);
            return Ok(BaselineOutcome {
                calculated: false,
                categories: 0,
            });
        }

        let mut totals: BTreeMap<Category, (Decimal, u32)> = BTreeMap::new();
        for txn in &transactions {
            let entry = totals.entry(txn.category).or_insert((Decimal::ZERO, 0));
            entry.0 += txn.amount;
            entry.1 += 1;
        }

        let weeks = Decimal::from(self.detection.baseline_weeks);
        for (category, (total, count)) in &totals {
            let baseline = Baseline {
                user_id,
                category: *category,
                time_period: TimePeriod::Weekly,
                baseline_amount: round_whole(*total / weeks),
                baseline_count: round_whole(Decimal::from(*count) / weeks)
                    .to_i32()
                    .unwrap_or(i32::MAX),
                calculated_at: now,
            };
            self.storage.upsert_baseline(&baseline).await?;
        }

        info!(
            "Calculated {} weekly baselines for user {} from {} transactions",
            totals.len(),
            user_id,
            transactions.len()
        );

        Ok(BaselineOutcome {
            calculated: true,
            categories: totals.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewTransaction, Transaction};
    use crate::storage::MemoryStorage;
    use chrono::{Duration, FixedOffset};

    fn txn(user_id: Uuid, days_ago: i64, amount: i64, category: Category, now: DateTime<Utc>) -> Transaction {
        NewTransaction {
            timestamp: now - Duration::days(days_ago),
            amount: Decimal::new(amount, 0),
            merchant: "Shop".to_string(),
            category,
            is_recurring: false,
            context_tags: vec![],
            custom_note: None,
        }
        .into_transaction(user_id, FixedOffset::east_opt(0).unwrap())
    }

    fn config() -> DetectionConfig {
        DetectionConfig {
            utc_offset: FixedOffset::east_opt(0).unwrap(),
            ..DetectionConfig::default()
        }
    }

    #[tokio::test]
    async fn test_weekly_average_uses_fixed_divisor() {
        let storage = Arc::new(MemoryStorage::new());
        let user = Uuid::new_v4();
        let now = Utc::now();

        // 12 food transactions of 1000 over the window, plus 3 transport of 150
        for i in 0..12 {
            storage.insert_transaction(&txn(user, i * 7, 1000, Category::Food, now)).await.unwrap();
        }
        for i in 0..3 {
            storage.insert_transaction(&txn(user, i, 150, Category::Transport, now)).await.unwrap();
        }

        let calculator = BaselineCalculator::new(storage.clone(), config());
        let outcome = calculator.calculate_baselines_at(user, now).await.unwrap();
        assert_eq!(outcome, BaselineOutcome { calculated: true, categories: 2 });

        let baselines = storage.baselines_for_user(user).await.unwrap();
        let food = baselines.iter().find(|b| b.category == Category::Food).unwrap();
        assert_eq!(food.baseline_amount, Decimal::new(1000, 0));
        assert_eq!(food.baseline_count, 1);

        // 450 / 12 = 37.5 rounds half away from zero
        let transport = baselines.iter().find(|b| b.category == Category::Transport).unwrap();
        assert_eq!(transport.baseline_amount, Decimal::new(38, 0));
        assert_eq!(transport.baseline_count, 0);
    }

    #[tokio::test]
    async fn test_ignores_transactions_outside_window() {
        let storage = Arc::new(MemoryStorage::new());
        let user = Uuid::new_v4();
        let now = Utc::now();
        storage.insert_transaction(&txn(user, 120, 500, Category::Food, now)).await.unwrap();

        let calculator = BaselineCalculator::new(storage.clone(), config());
        let outcome = calculator.calculate_baselines_at(user, now).await.unwrap();
        assert!(!outcome.calculated);
        assert!(storage.baselines_for_user(user).await.unwrap().is_empty());
    }
}
