//! Storage seam for the detection pipeline.
//!
//! Services only talk to [`InsightStorage`]. `PgStorage` composes the
//! per-table repositories; `MemoryStorage` backs tests and local runs.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::RepositoryResult;
use crate::models::{
    Baseline, Category, ContextTag, DeviationEvent, InsightState, Notification,
    NotificationPreferences, Pattern, PatternKey, Transaction, WeeklyCheckin,
};

#[async_trait]
pub trait InsightStorage: Send + Sync {
    // ==================== Transactions ====================

    async fn insert_transaction(&self, txn: &Transaction) -> RepositoryResult<()>;

    /// Transactions of `user_id` in `[since, until]`, newest first
    async fn transactions_between(
        &self,
        user_id: Uuid,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> RepositoryResult<Vec<Transaction>>;

    /// Append tags (deduplicated) and optionally replace the note.
    /// Returns the updated transaction.
    async fn append_context_tags(
        &self,
        user_id: Uuid,
        transaction_id: Uuid,
        tags: &[ContextTag],
        note: Option<&str>,
    ) -> RepositoryResult<Transaction>;

    /// Users with at least one transaction at or after `since`
    async fn active_user_ids(&self, since: DateTime<Utc>) -> RepositoryResult<Vec<Uuid>>;

    // ==================== Baselines ====================

    /// Insert or overwrite on (user, category, time_period)
    async fn upsert_baseline(&self, baseline: &Baseline) -> RepositoryResult<()>;

    async fn baselines_for_user(&self, user_id: Uuid) -> RepositoryResult<Vec<Baseline>>;

    // ==================== Patterns ====================

    /// Insert or refresh on (user, key); `first_detected` of an existing row is kept.
    /// Returns the stored row.
    async fn upsert_pattern(&self, pattern: &Pattern) -> RepositoryResult<Pattern>;

    async fn patterns_for_user(&self, user_id: Uuid) -> RepositoryResult<Vec<Pattern>>;

    async fn find_pattern(
        &self,
        user_id: Uuid,
        key: &PatternKey,
    ) -> RepositoryResult<Option<Pattern>>;

    // ==================== Deviations ====================

    /// The latest event for (user, category) whose cooldown is still running at `now`
    async fn active_cooldown(
        &self,
        user_id: Uuid,
        category: Category,
        now: DateTime<Utc>,
    ) -> RepositoryResult<Option<DeviationEvent>>;

    /// Insert the event unless an unexpired cooldown exists for its
    /// (user, category) at `now`. Check and insert are one atomic step.
    /// Returns `None` when suppressed.
    async fn insert_deviation_unless_cooling(
        &self,
        event: &DeviationEvent,
        now: DateTime<Utc>,
    ) -> RepositoryResult<Option<DeviationEvent>>;

    async fn acknowledge_deviation(
        &self,
        user_id: Uuid,
        deviation_id: Uuid,
        response: Option<&str>,
    ) -> RepositoryResult<DeviationEvent>;

    async fn deviations_for_user(&self, user_id: Uuid) -> RepositoryResult<Vec<DeviationEvent>>;

    // ==================== Notifications & check-ins ====================

    async fn insert_notification(&self, notification: &Notification) -> RepositoryResult<()>;

    async fn notifications_for_user(&self, user_id: Uuid) -> RepositoryResult<Vec<Notification>>;

    /// Insert unless the user already has a check-in for the same week.
    /// Returns whether a row was written.
    async fn insert_weekly_checkin(&self, checkin: &WeeklyCheckin) -> RepositoryResult<bool>;

    async fn checkins_for_user(&self, user_id: Uuid) -> RepositoryResult<Vec<WeeklyCheckin>>;

    // ==================== Preferences ====================

    /// `None` when the user never saved preferences
    async fn preferences(&self, user_id: Uuid)
        -> RepositoryResult<Option<NotificationPreferences>>;

    async fn save_preferences(
        &self,
        user_id: Uuid,
        preferences: &NotificationPreferences,
    ) -> RepositoryResult<()>;

    // ==================== Insight state ====================

    async fn upsert_insight_state(&self, state: &InsightState) -> RepositoryResult<()>;

    async fn insight_states(&self, user_id: Uuid) -> RepositoryResult<Vec<InsightState>>;
}

pub use memory::MemoryStorage;
pub use postgres::PgStorage;
