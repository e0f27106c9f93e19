//! Postgres-backed storage composed from the per-table repositories.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use super::InsightStorage;
use crate::error::RepositoryResult;
use crate::models::{
    Baseline, Category, ContextTag, DeviationEvent, InsightState, Notification,
    NotificationPreferences, Pattern, PatternKey, Transaction, WeeklyCheckin,
};
use crate::repositories::*;

#[derive(Clone)]
pub struct PgStorage {
    transactions: Arc<TransactionRepository>,
    baselines: Arc<BaselineRepository>,
    patterns: Arc<PatternRepository>,
    deviations: Arc<DeviationRepository>,
    notifications: Arc<NotificationRepository>,
    preferences: Arc<PreferencesRepository>,
    insight_states: Arc<InsightStateRepository>,
}

impl PgStorage {
    pub fn new(pool: PgPool) -> Self {
        Self {
            transactions: Arc::new(TransactionRepository::new(pool.clone())),
            baselines: Arc::new(BaselineRepository::new(pool.clone())),
            patterns: Arc::new(PatternRepository::new(pool.clone())),
            deviations: Arc::new(DeviationRepository::new(pool.clone())),
            notifications: Arc::new(NotificationRepository::new(pool.clone())),
            preferences: Arc::new(PreferencesRepository::new(pool.clone())),
            insight_states: Arc::new(InsightStateRepository::new(pool)),
        }
    }
}

#[async_trait]
impl InsightStorage for PgStorage {
    async fn insert_transaction(&self, txn: &Transaction) -> RepositoryResult<()> {
        self.transactions.create(txn).await
    }

    async fn transactions_between(
        &self,
        user_id: Uuid,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> RepositoryResult<Vec<Transaction>> {
        self.transactions.find_between(user_id, since, until).await
    }

    async fn append_context_tags(
        &self,
        user_id: Uuid,
        transaction_id: Uuid,
        tags: &[ContextTag],
        note: Option<&str>,
    ) -> RepositoryResult<Transaction> {
        self.transactions
            .append_tags(user_id, transaction_id, tags, note)
            .await
    }

    async fn active_user_ids(&self, since: DateTime<Utc>) -> RepositoryResult<Vec<Uuid>> {
        self.transactions.user_ids_since(since).await
    }

    async fn upsert_baseline(&self, baseline: &Baseline) -> RepositoryResult<()> {
        self.baselines.upsert(baseline).await
    }

    async fn baselines_for_user(&self, user_id: Uuid) -> RepositoryResult<Vec<Baseline>> {
        self.baselines.find_by_user(user_id).await
    }

    async fn upsert_pattern(&self, pattern: &Pattern) -> RepositoryResult<Pattern> {
        self.patterns.upsert(pattern).await
    }

    async fn patterns_for_user(&self, user_id: Uuid) -> RepositoryResult<Vec<Pattern>> {
        self.patterns.find_by_user(user_id).await
    }

    async fn find_pattern(
        &self,
        user_id: Uuid,
        key: &PatternKey,
    ) -> RepositoryResult<Option<Pattern>> {
        self.patterns.find_by_key(user_id, key).await
    }

    async fn active_cooldown(
        &self,
        user_id: Uuid,
        category: Category,
        now: DateTime<Utc>,
    ) -> RepositoryResult<Option<DeviationEvent>> {
        self.deviations
            .find_active_cooldown(user_id, category, now)
            .await
    }

    async fn insert_deviation_unless_cooling(
        &self,
        event: &DeviationEvent,
        now: DateTime<Utc>,
    ) -> RepositoryResult<Option<DeviationEvent>> {
        self.deviations.create_unless_cooling(event, now).await
    }

    async fn acknowledge_deviation(
        &self,
        user_id: Uuid,
        deviation_id: Uuid,
        response: Option<&str>,
    ) -> RepositoryResult<DeviationEvent> {
        self.deviations
            .acknowledge(user_id, deviation_id, response)
            .await
    }

    async fn deviations_for_user(&self, user_id: Uuid) -> RepositoryResult<Vec<DeviationEvent>> {
        self.deviations.find_by_user(user_id).await
    }

    async fn insert_notification(&self, notification: &Notification) -> RepositoryResult<()> {
        self.notifications.create(notification).await
    }

    async fn notifications_for_user(&self, user_id: Uuid) -> RepositoryResult<Vec<Notification>> {
        self.notifications.find_by_user(user_id).await
    }

    async fn insert_weekly_checkin(&self, checkin: &WeeklyCheckin) -> RepositoryResult<bool> {
        self.notifications.create_checkin(checkin).await
    }

    async fn checkins_for_user(&self, user_id: Uuid) -> RepositoryResult<Vec<WeeklyCheckin>> {
        self.notifications.find_checkins_by_user(user_id).await
    }

    async fn preferences(
        &self,
        user_id: Uuid,
    ) -> RepositoryResult<Option<NotificationPreferences>> {
        self.preferences.find(user_id).await
    }

    async fn save_preferences(
        &self,
        user_id: Uuid,
        preferences: &NotificationPreferences,
    ) -> RepositoryResult<()> {
        self.preferences.save(user_id, preferences).await
    }

    async fn upsert_insight_state(&self, state: &InsightState) -> RepositoryResult<()> {
        self.insight_states.upsert(state).await
    }

    async fn insight_states(&self, user_id: Uuid) -> RepositoryResult<Vec<InsightState>> {
        self.insight_states.find_by_user(user_id).await
    }
}
