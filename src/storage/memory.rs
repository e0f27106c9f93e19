//! In-memory storage.
//!
//! Used by the test suites and for running the service without Postgres.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::InsightStorage;
use crate::error::{RepositoryError, RepositoryResult};
use crate::models::{
    Baseline, Category, ContextTag, DeviationEvent, InsightState, Notification,
    NotificationPreferences, Pattern, PatternKey, TimePeriod, Transaction, WeeklyCheckin,
};

#[derive(Debug, Clone)]
pub struct MemoryStorage {
    transactions: Arc<RwLock<HashMap<Uuid, Transaction>>>,
    baselines: Arc<RwLock<HashMap<(Uuid, Category, TimePeriod), Baseline>>>,
    patterns: Arc<RwLock<HashMap<(Uuid, PatternKey), Pattern>>>,
    deviations: Arc<RwLock<Vec<DeviationEvent>>>,
    notifications: Arc<RwLock<Vec<Notification>>>,
    checkins: Arc<RwLock<Vec<WeeklyCheckin>>>,
    preferences: Arc<RwLock<HashMap<Uuid, NotificationPreferences>>>,
    insight_states: Arc<RwLock<HashMap<(Uuid, PatternKey), InsightState>>>,
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            transactions: Arc::new(RwLock::new(HashMap::new())),
            baselines: Arc::new(RwLock::new(HashMap::new())),
            patterns: Arc::new(RwLock::new(HashMap::new())),
            deviations: Arc::new(RwLock::new(Vec::new())),
            notifications: Arc::new(RwLock::new(Vec::new())),
            checkins: Arc::new(RwLock::new(Vec::new())),
            preferences: Arc::new(RwLock::new(HashMap::new())),
            insight_states: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Drop everything
    pub async fn clear(&self) {
        self.transactions.write().await.clear();
        self.baselines.write().await.clear();
        self.patterns.write().await.clear();
        self.deviations.write().await.clear();
        self.notifications.write().await.clear();
        self.checkins.write().await.clear();
        self.preferences.write().await.clear();
        self.insight_states.write().await.clear();
    }
}

fn latest_cooldown<'a>(
    events: &'a [DeviationEvent],
    user_id: Uuid,
    category: Category,
    now: DateTime<Utc>,
) -> Option<&'a DeviationEvent> {
    events
        .iter()
        .filter(|e| e.user_id == user_id && e.category == category && e.is_cooling_down(now))
        .max_by_key(|e| e.cooldown_until)
}

#[async_trait]
impl InsightStorage for MemoryStorage {
    async fn insert_transaction(&self, txn: &Transaction) -> RepositoryResult<()> {
        let mut transactions = self.transactions.write().await;
        if transactions.contains_key(&txn.id) {
            return Err(RepositoryError::Duplicate(format!("transaction {}", txn.id)));
        }
        transactions.insert(txn.id, txn.clone());
        Ok(())
    }

    async fn transactions_between(
        &self,
        user_id: Uuid,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> RepositoryResult<Vec<Transaction>> {
        let transactions = self.transactions.read().await;
        let mut result: Vec<Transaction> = transactions
            .values()
            .filter(|t| t.user_id == user_id && t.timestamp >= since && t.timestamp <= until)
            .cloned()
            .collect();
        result.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(a.id.cmp(&b.id)));
        Ok(result)
    }

    async fn append_context_tags(
        &self,
        user_id: Uuid,
        transaction_id: Uuid,
        tags: &[ContextTag],
        note: Option<&str>,
    ) -> RepositoryResult<Transaction> {
        let mut transactions = self.transactions.write().await;
        let txn = transactions
            .get_mut(&transaction_id)
            .filter(|t| t.user_id == user_id)
            .ok_or_else(|| RepositoryError::NotFound(format!("transaction {}", transaction_id)))?;

        for tag in tags {
            if !txn.context_tags.contains(tag) {
                txn.context_tags.push(*tag);
            }
        }
        if let Some(note) = note {
            txn.custom_note = Some(note.to_string());
        }
        Ok(txn.clone())
    }

    async fn active_user_ids(&self, since: DateTime<Utc>) -> RepositoryResult<Vec<Uuid>> {
        let transactions = self.transactions.read().await;
        let users: HashSet<Uuid> = transactions
            .values()
            .filter(|t| t.timestamp >= since)
            .map(|t| t.user_id)
            .collect();
        let mut users: Vec<Uuid> = users.into_iter().collect();
        users.sort();
        Ok(users)
    }

    async fn upsert_baseline(&self, baseline: &Baseline) -> RepositoryResult<()> {
        let mut baselines = self.baselines.write().await;
        baselines.insert(
            (baseline.user_id, baseline.category, baseline.time_period),
            baseline.clone(),
        );
        Ok(())
    }

    async fn baselines_for_user(&self, user_id: Uuid) -> RepositoryResult<Vec<Baseline>> {
        let baselines = self.baselines.read().await;
        let mut result: Vec<Baseline> = baselines
            .values()
            .filter(|b| b.user_id == user_id)
            .cloned()
            .collect();
        result.sort_by_key(|b| b.category);
        Ok(result)
    }

    async fn upsert_pattern(&self, pattern: &Pattern) -> RepositoryResult<Pattern> {
        let mut patterns = self.patterns.write().await;
        let slot = (pattern.user_id, pattern.key.clone());
        let mut stored = pattern.clone();
        if let Some(existing) = patterns.get(&slot) {
            stored.first_detected = existing.first_detected;
        }
        patterns.insert(slot, stored.clone());
        Ok(stored)
    }

    async fn patterns_for_user(&self, user_id: Uuid) -> RepositoryResult<Vec<Pattern>> {
        let patterns = self.patterns.read().await;
        let mut result: Vec<Pattern> = patterns
            .values()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect();
        result.sort_by(|a, b| {
            a.confidence
                .rank()
                .cmp(&b.confidence.rank())
                .then(b.occurrences.cmp(&a.occurrences))
                .then(a.key.cmp(&b.key))
        });
        Ok(result)
    }

    async fn find_pattern(
        &self,
        user_id: Uuid,
        key: &PatternKey,
    ) -> RepositoryResult<Option<Pattern>> {
        let patterns = self.patterns.read().await;
        Ok(patterns.get(&(user_id, key.clone())).cloned())
    }

    async fn active_cooldown(
        &self,
        user_id: Uuid,
        category: Category,
        now: DateTime<Utc>,
    ) -> RepositoryResult<Option<DeviationEvent>> {
        let deviations = self.deviations.read().await;
        Ok(latest_cooldown(&deviations, user_id, category, now).cloned())
    }

    async fn insert_deviation_unless_cooling(
        &self,
        event: &DeviationEvent,
        now: DateTime<Utc>,
    ) -> RepositoryResult<Option<DeviationEvent>> {
        // One write guard covers both the check and the insert
        let mut deviations = self.deviations.write().await;
        if latest_cooldown(&deviations, event.user_id, event.category, now).is_some() {
            return Ok(None);
        }
        deviations.push(event.clone());
        Ok(Some(event.clone()))
    }

    async fn acknowledge_deviation(
        &self,
        user_id: Uuid,
        deviation_id: Uuid,
        response: Option<&str>,
    ) -> RepositoryResult<DeviationEvent> {
        let mut deviations = self.deviations.write().await;
        let event = deviations
            .iter_mut()
            .find(|e| e.id == deviation_id && e.user_id == user_id)
            .ok_or_else(|| RepositoryError::NotFound(format!("deviation {}", deviation_id)))?;

        event.acknowledged = true;
        event.acknowledged_response = response.map(str::to_string);
        Ok(event.clone())
    }

    async fn deviations_for_user(&self, user_id: Uuid) -> RepositoryResult<Vec<DeviationEvent>> {
        let deviations = self.deviations.read().await;
        let mut result: Vec<DeviationEvent> = deviations
            .iter()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect();
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(result)
    }

    async fn insert_notification(&self, notification: &Notification) -> RepositoryResult<()> {
        self.notifications.write().await.push(notification.clone());
        Ok(())
    }

    async fn notifications_for_user(&self, user_id: Uuid) -> RepositoryResult<Vec<Notification>> {
        let notifications = self.notifications.read().await;
        let mut result: Vec<Notification> = notifications
            .iter()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect();
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(result)
    }

    async fn insert_weekly_checkin(&self, checkin: &WeeklyCheckin) -> RepositoryResult<bool> {
        let mut checkins = self.checkins.write().await;
        if checkins
            .iter()
            .any(|c| c.user_id == checkin.user_id && c.week_start == checkin.week_start)
        {
            return Ok(false);
        }
        checkins.push(checkin.clone());
        Ok(true)
    }

    async fn checkins_for_user(&self, user_id: Uuid) -> RepositoryResult<Vec<WeeklyCheckin>> {
        let checkins = self.checkins.read().await;
        let mut result: Vec<WeeklyCheckin> = checkins
            .iter()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect();
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(result)
    }

    async fn preferences(
        &self,
        user_id: Uuid,
    ) -> RepositoryResult<Option<NotificationPreferences>> {
        Ok(self.preferences.read().await.get(&user_id).cloned())
    }

    async fn save_preferences(
        &self,
        user_id: Uuid,
        preferences: &NotificationPreferences,
    ) -> RepositoryResult<()> {
        self.preferences
            .write()
            .await
            .insert(user_id, preferences.clone());
        Ok(())
    }

    async fn upsert_insight_state(&self, state: &InsightState) -> RepositoryResult<()> {
        self.insight_states
            .write()
            .await
            .insert((state.user_id, state.pattern_key.clone()), state.clone());
        Ok(())
    }

    async fn insight_states(&self, user_id: Uuid) -> RepositoryResult<Vec<InsightState>> {
        let states = self.insight_states.read().await;
        Ok(states
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect())
    }
}
