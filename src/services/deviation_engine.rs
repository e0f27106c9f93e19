use crate::calendar;
use crate::config::DetectionConfig;
use crate::error::AppResult;
use crate::models::{
    Baseline, Category, CategoryChange, DeviationEvent, Notification, NotificationPreferences,
    NotificationType, TimePeriod, Transaction, WeeklyCheckin,
};
use crate::narrative::{NarrativeFacts, Narrator};
use crate::services::{digest, round_whole, BaselineCalculator};
use crate::storage::InsightStorage;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Current-week transactions needed before a category can fire
const MIN_WEEKLY_COUNT: i32 = 3;

pub const SOFT_NUDGE_TITLE: &str = "Noticed a change in your usual pattern";
pub const BASELINES_CALCULATED: &str = "Baselines calculated";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanOutcome {
    pub deviations: Vec<DeviationEvent>,
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Why a category produced no event in a scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Skip {
    NoBaseline,
    ZeroBaseline,
    BelowThreshold,
    TooFewTransactions,
}

/// Whole-percent increase of `current` over `baseline`, or the reason the
/// category cannot fire. Both the threshold and the count must be met.
pub fn evaluate_category(
    current_amount: Decimal,
    current_count: i32,
    baseline: Option<&Baseline>,
    threshold: Decimal,
) -> Result<i32, Skip> {
    let baseline = baseline.ok_or(Skip::NoBaseline)?;
    if baseline.baseline_amount.is_zero() {
        return Err(Skip::ZeroBaseline);
    }

    let ratio = (current_amount - baseline.baseline_amount) / baseline.baseline_amount;
    if ratio < threshold {
        return Err(Skip::BelowThreshold);
    }
    if current_count < MIN_WEEKLY_COUNT {
        return Err(Skip::TooFewTransactions);
    }

    Ok(round_whole(ratio * Decimal::ONE_HUNDRED)
        .to_i32()
        .unwrap_or(i32::MAX))
}

/// Compares the current week against stored baselines and records deviations
pub struct DeviationEngine {
    storage: Arc<dyn InsightStorage>,
    baselines: Arc<BaselineCalculator>,
    narrator: Narrator,
    detection: DetectionConfig,
}

impl DeviationEngine {
    pub fn new(
        storage: Arc<dyn InsightStorage>,
        baselines: Arc<BaselineCalculator>,
        narrator: Narrator,
        detection: DetectionConfig,
    ) -> Self {
        Self {
            storage,
            baselines,
            narrator,
            detection,
        }
    }

    pub async fn run_deviation_scan(&self, user_id: Uuid) -> AppResult<ScanOutcome> {
        self.run_deviation_scan_at(user_id, Utc::now()).await
    }

    pub async fn run_deviation_scan_at(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> AppResult<ScanOutcome> {
        let preferences = self
            .storage
            .preferences(user_id)
            .await?
            .unwrap_or_default();

        let baselines = self.storage.baselines_for_user(user_id).await?;
        if baselines.is_empty() {
            info!("No baselines for user {}, calculating before first scan", user_id);
            self.baselines.calculate_baselines_at(user_id, now).await?;
            return Ok(ScanOutcome {
                deviations: Vec::new(),
                count: 0,
                message: Some(BASELINES_CALCULATED.to_string()),
            });
        }

        let weekly: HashMap<Category, &Baseline> = baselines
            .iter()
            .filter(|b| b.time_period == TimePeriod::Weekly)
            .map(|b| (b.category, b))
            .collect();

        let week_start = calendar::week_start(now, self.detection.utc_offset);
        let this_week = self
            .storage
            .transactions_between(user_id, week_start, now)
            .await?;
        let threshold = preferences.sensitivity.threshold();

        let mut deviations = Vec::new();
        for (category, (amount, count)) in weekly_totals(&this_week) {
            if preferences.is_muted(category) {
                debug!("{} muted for user {}", category, user_id);
                continue;
            }

            let baseline = weekly.get(&category).copied();
            let percentage = match evaluate_category(amount, count, baseline, threshold) {
                Ok(p) => p,
                Err(reason) => {
                    debug!("{} skipped for user {}: {:?}", category, user_id, reason);
                    continue;
                }
            };
            let baseline_amount = baseline.map(|b| b.baseline_amount).unwrap_or_default();

            if let Some(active) = self.storage.active_cooldown(user_id, category, now).await? {
                debug!(
                    "{} cooling down for user {} until {}",
                    category, user_id, active.cooldown_until
                );
                continue;
            }

            let narrative = self
                .narrator
                .narrate(&NarrativeFacts::deviation(category, percentage, count))
                .await;

            let event = DeviationEvent::new(
                user_id,
                category,
                percentage,
                baseline_amount,
                amount,
                count,
                narrative,
                now,
                self.detection.cooldown(),
            );

            // The storage re-checks the cooldown atomically; a concurrent scan may have won
            let Some(event) = self
                .storage
                .insert_deviation_unless_cooling(&event, now)
                .await?
            else {
                warn!("Deviation for {} / {} suppressed by concurrent scan", user_id, category);
                continue;
            };

            info!(
                "Deviation for user {}: {} up {}% ({} vs baseline {})",
                user_id, category, percentage, amount, baseline_amount
            );

            if preferences.soft_nudges {
                let nudge = Notification::new(
                    user_id,
                    NotificationType::SoftNudge,
                    SOFT_NUDGE_TITLE,
                    event.narrative.clone(),
                    json!({ "deviation_id": event.id, "category": category }),
                    now,
                );
                self.storage.insert_notification(&nudge).await?;
            }

            deviations.push(event);
        }

        if preferences.weekly_digest && calendar::is_local_monday(now, self.detection.utc_offset) {
            self.write_weekly_digest(user_id, &deviations, now).await?;
        }

        Ok(ScanOutcome {
            count: deviations.len(),
            deviations,
            message: None,
        })
    }

    /// Digest notification plus check-in for the week that just ended.
    /// At most one per user and week.
    async fn write_weekly_digest(
        &self,
        user_id: Uuid,
        deviations: &[DeviationEvent],
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        let week_start = calendar::local_date(now - Duration::days(7), self.detection.utc_offset);

        let categories: Vec<Category> = deviations.iter().map(|d| d.category).collect();
        let body = digest::digest_body(&categories);

        let category_changes: BTreeMap<Category, CategoryChange> = deviations
            .iter()
            .map(|d| {
                (
                    d.category,
                    CategoryChange {
                        change: d.deviation_percentage,
                        amount: d.current_amount,
                    },
                )
            })
            .collect();

        // The check-in claims the week; the notification follows only if it was new
        let checkin = WeeklyCheckin {
            id: Uuid::new_v4(),
            user_id,
            week_start,
            summary: body.clone(),
            category_changes,
            user_response: None,
            user_note: None,
            created_at: now,
        };
        if !self.storage.insert_weekly_checkin(&checkin).await? {
            debug!("Weekly digest for {} already written for {}", user_id, week_start);
            return Ok(());
        }

        let notification = Notification::new(
            user_id,
            NotificationType::WeeklyDigest,
            digest::DIGEST_TITLE,
            body,
            json!({ "deviation_count": deviations.len() }),
            now,
        );
        self.storage.insert_notification(&notification).await?;

        info!(
            "Weekly digest written for user {} ({} deviations)",
            user_id,
            deviations.len()
        );
        Ok(())
    }

    pub async fn acknowledge_deviation(
        &self,
        user_id: Uuid,
        deviation_id: Uuid,
        response: Option<&str>,
    ) -> AppResult<DeviationEvent> {
        let event = self
            .storage
            .acknowledge_deviation(user_id, deviation_id, response)
            .await?;
        info!("Deviation {} acknowledged by user {}", deviation_id, user_id);
        Ok(event)
    }

    /// Preferences in effect for `user_id`
    pub async fn preferences(&self, user_id: Uuid) -> AppResult<NotificationPreferences> {
        Ok(self.storage.preferences(user_id).await?.unwrap_or_default())
    }

    pub async fn save_preferences(
        &self,
        user_id: Uuid,
        preferences: NotificationPreferences,
    ) -> AppResult<NotificationPreferences> {
        self.storage.save_preferences(user_id, &preferences).await?;
        info!(
            "Preferences updated for user {} (sensitivity {})",
            user_id,
            preferences.sensitivity.as_str()
        );
        Ok(preferences)
    }
}

/// Amount and count per category, in category order
fn weekly_totals(transactions: &[Transaction]) -> BTreeMap<Category, (Decimal, i32)> {
    let mut totals: BTreeMap<Category, (Decimal, i32)> = BTreeMap::new();
    for txn in transactions {
        let entry = totals.entry(txn.category).or_insert((Decimal::ZERO, 0));
        entry.0 += txn.amount;
        entry.1 += 1;
    }
    totals
}

#[cfg(test)]
mod tests {
    use super::*;

    fn baseline(amount: i64) -> Baseline {
        Baseline {
            user_id: Uuid::nil(),
            category: Category::Food,
            time_period: TimePeriod::Weekly,
            baseline_amount: Decimal::new(amount, 0),
            baseline_count: 3,
            calculated_at: Utc::now(),
        }
    }

    fn medium() -> Decimal {
        Decimal::new(50, 2)
    }

    #[test]
    fn test_fires_on_threshold_and_count() {
        let b = baseline(1000);
        assert_eq!(evaluate_category(Decimal::new(1600, 0), 4, Some(&b), medium()), Ok(60));
        // exactly at threshold fires
        assert_eq!(evaluate_category(Decimal::new(1500, 0), 3, Some(&b), medium()), Ok(50));
    }

    #[test]
    fn test_two_transactions_never_fire() {
        let b = baseline(1000);
        assert_eq!(
            evaluate_category(Decimal::new(3000, 0), 2, Some(&b), medium()),
            Err(Skip::TooFewTransactions)
        );
    }

    #[test]
    fn test_below_threshold() {
        let b = baseline(1000);
        assert_eq!(
            evaluate_category(Decimal::new(1400, 0), 10, Some(&b), medium()),
            Err(Skip::BelowThreshold)
        );
        assert_eq!(
            evaluate_category(Decimal::new(1400, 0), 10, Some(&b), Decimal::new(25, 2)),
            Ok(40)
        );
    }

    #[test]
    fn test_missing_or_zero_baseline_is_skipped() {
        assert_eq!(
            evaluate_category(Decimal::new(100, 0), 5, None, medium()),
            Err(Skip::NoBaseline)
        );
        assert_eq!(
            evaluate_category(Decimal::new(100, 0), 5, Some(&baseline(0)), medium()),
            Err(Skip::ZeroBaseline)
        );
    }

    #[test]
    fn test_percentage_rounds_half_away_from_zero() {
        // 1005 over 670 is exactly +50%
        let b = baseline(670);
        assert_eq!(evaluate_category(Decimal::new(1005, 0), 3, Some(&b), medium()), Ok(50));
        let b = baseline(200);
        // 301 over 200 is +50.5%
        assert_eq!(evaluate_category(Decimal::new(301, 0), 3, Some(&b), medium()), Ok(51));
    }
}
