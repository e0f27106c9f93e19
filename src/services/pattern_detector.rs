use crate::config::DetectionConfig;
use crate::error::AppResult;
use crate::models::{
    Category, Confidence, Pattern, PatternKey, PatternKind, TimeOfDay, Transaction, Trend,
};
use crate::services::round_whole;
use crate::storage::InsightStorage;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

const LATE_NIGHT_MIN: usize = 3;
const WEEKEND_MIN: usize = 3;
const MORNING_MIN: usize = 5;
const MERCHANT_MIN: usize = 4;

/// Relative change between half-window means that counts as a trend
const TREND_THRESHOLD: Decimal = Decimal::from_parts(15, 0, 0, false, 2);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionOutcome {
    pub patterns: Vec<Pattern>,
    pub count: usize,
}

/// Whether `txn` belongs to the habit identified by `key`
pub fn matches_pattern(key: &PatternKey, txn: &Transaction) -> bool {
    match key.kind {
        PatternKind::RegularMerchant => txn.merchant == key.subject,
        kind => {
            if txn.category.as_str() != key.subject {
                return false;
            }
            match kind {
                PatternKind::LateNight => {
                    matches!(txn.time_of_day, TimeOfDay::LateNight | TimeOfDay::Evening)
                }
                PatternKind::Weekend => txn.day_of_week.is_weekend(),
                PatternKind::MorningRoutine => txn.time_of_day == TimeOfDay::Morning,
                PatternKind::RegularMerchant => false,
            }
        }
    }
}

/// Trend of amounts over time.
///
/// Fewer than three transactions is always stable. Otherwise the
/// chronologically sorted amounts are split at n/2 and the rounded means of
/// the halves compared: more than +15% is increasing, less than -15%
/// decreasing.
pub fn calculate_trend(transactions: &[&Transaction]) -> Trend {
    if transactions.len() < 3 {
        return Trend::Stable;
    }

    let mut sorted: Vec<&Transaction> = transactions.to_vec();
    sorted.sort_by_key(|t| t.timestamp);

    let mid = sorted.len() / 2;
    let first = mean_amount(&sorted[..mid]);
    let second = mean_amount(&sorted[mid..]);

    if first.is_zero() {
        return Trend::Stable;
    }

    let change = (second - first) / first;
    if change > TREND_THRESHOLD {
        Trend::Increasing
    } else if change < -TREND_THRESHOLD {
        Trend::Decreasing
    } else {
        Trend::Stable
    }
}

fn mean_amount(transactions: &[&Transaction]) -> Decimal {
    if transactions.is_empty() {
        return Decimal::ZERO;
    }
    let total: Decimal = transactions.iter().map(|t| t.amount).sum();
    round_whole(total / Decimal::from(transactions.len()))
}

/// Category of the most recent transaction. `transactions` must be newest first.
fn latest_category(transactions: &[&Transaction]) -> Option<Category> {
    transactions.first().map(|t| t.category)
}

fn describe(key: &PatternKey) -> String {
    match key.kind {
        PatternKind::LateNight => format!(
            "You tend to spend on {} during late evenings. This might be linked to unwinding after work or late-night cravings.",
            key.subject
        ),
        PatternKind::Weekend => format!(
            "Your {} spending peaks on weekends. This might reflect social activities or personal time.",
            key.subject
        ),
        PatternKind::MorningRoutine => format!(
            "You have a consistent morning {} habit. This seems to be part of your daily routine.",
            key.subject
        ),
        PatternKind::RegularMerchant => format!(
            "You frequently visit {}. It looks like this has become one of your regular spots.",
            key.subject
        ),
    }
}

fn build_pattern(
    user_id: Uuid,
    key: PatternKey,
    category: Category,
    matching: &[&Transaction],
    now: DateTime<Utc>,
) -> Pattern {
    Pattern {
        user_id,
        title: key.title(),
        description: describe(&key),
        category,
        confidence: Confidence::from_occurrences(matching.len()),
        occurrences: matching.len() as i32,
        time_range: key.kind.time_range().to_string(),
        average_amount: mean_amount(matching),
        trend: calculate_trend(matching),
        first_detected: now,
        last_updated: now,
        key,
    }
}

/// Pure detection over a window of transactions (newest first).
/// Output is ordered strongest first, then by occurrences, then by key.
pub fn detect(user_id: Uuid, transactions: &[Transaction], now: DateTime<Utc>) -> Vec<Pattern> {
    let mut patterns = Vec::new();

    let mut by_category: BTreeMap<Category, Vec<&Transaction>> = BTreeMap::new();
    let mut by_merchant: BTreeMap<&str, Vec<&Transaction>> = BTreeMap::new();
    for txn in transactions {
        by_category.entry(txn.category).or_default().push(txn);
        by_merchant.entry(txn.merchant.as_str()).or_default().push(txn);
    }

    let temporal = [
        (PatternKind::LateNight, LATE_NIGHT_MIN),
        (PatternKind::Weekend, WEEKEND_MIN),
        (PatternKind::MorningRoutine, MORNING_MIN),
    ];

    for (category, txns) in &by_category {
        for (kind, min) in temporal {
            let key = PatternKey::for_category(kind, *category);
            let matching: Vec<&Transaction> = txns
                .iter()
                .copied()
                .filter(|t| matches_pattern(&key, t))
                .collect();
            if matching.len() >= min {
                patterns.push(build_pattern(user_id, key, *category, &matching, now));
            }
        }
    }

    for (merchant, txns) in &by_merchant {
        if txns.len() < MERCHANT_MIN {
            continue;
        }
        if let Some(category) = latest_category(txns) {
            let key = PatternKey::for_merchant(merchant);
            patterns.push(build_pattern(user_id, key, category, txns, now));
        }
    }

    patterns.sort_by(|a, b| {
        a.confidence
            .rank()
            .cmp(&b.confidence.rank())
            .then(b.occurrences.cmp(&a.occurrences))
            .then_with(|| a.key.cmp(&b.key))
    });
    patterns
}

/// Detects and persists recurring behavioural patterns
pub struct PatternDetector {
    storage: Arc<dyn InsightStorage>,
    detection: DetectionConfig,
}

impl PatternDetector {
    pub fn new(storage: Arc<dyn InsightStorage>, detection: DetectionConfig) -> Self {
        Self { storage, detection }
    }

    pub async fn detect_patterns(&self, user_id: Uuid) -> AppResult<DetectionOutcome> {
        self.detect_patterns_at(user_id, Utc::now()).await
    }

    pub async fn detect_patterns_at(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> AppResult<DetectionOutcome> {
        let transactions = self
            .storage
            .transactions_between(user_id, now - self.detection.window(), now)
            .await?;

        let detected = detect(user_id, &transactions, now);

        let mut stored = Vec::with_capacity(detected.len());
        for pattern in &detected {
            debug!(
                "Pattern {} for user {}: {} occurrences, {}",
                pattern.key,
                user_id,
                pattern.occurrences,
                pattern.confidence.as_str()
            );
            stored.push(self.storage.upsert_pattern(pattern).await?);
        }

        info!(
            "Detected {} patterns for user {} from {} transactions",
            stored.len(),
            user_id,
            transactions.len()
        );

        Ok(DetectionOutcome {
            count: stored.len(),
            patterns: stored,
        })
    }
}
