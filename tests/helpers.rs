#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use reflect_backend::auth;
use reflect_backend::config::{AppConfig, DatabaseConfig, NarrativeProvider};
use reflect_backend::database::{create_pool, run_migrations};
use reflect_backend::models::*;
use reflect_backend::narrative::{CompletionRequest, NarrativeError, TextGenerator};
use reflect_backend::storage::{InsightStorage, MemoryStorage, PgStorage};
use reflect_backend::AppState;
use rust_decimal::Decimal;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

// ============================================================================
// Clock fixtures (all UTC, local offset zero)
// ============================================================================

/// Wednesday 2024-03-06 12:00 UTC; the local week started Sunday 2024-03-03
pub fn wednesday() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 6, 12, 0, 0).unwrap()
}

/// Monday 2024-03-04 10:00 UTC
pub fn monday() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 4, 10, 0, 0).unwrap()
}

pub fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
}

pub fn utc_offset() -> FixedOffset {
    FixedOffset::east_opt(0).unwrap()
}

// ============================================================================
// Application fixtures
// ============================================================================

/// Config with deterministic local time and a known auth secret
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.detection.utc_offset = utc_offset();
    config.auth.secret = "integration-test-secret".to_string();
    config
}

/// Services wired over an in-memory store
pub struct TestApp {
    pub storage: Arc<MemoryStorage>,
    pub config: AppConfig,
    pub state: AppState,
}

impl TestApp {
    pub fn new() -> Self {
        Self::build(test_config(), None)
    }

    /// Use `generator` as the AI narrative and statement backend
    pub fn with_generator(generator: Arc<dyn TextGenerator>) -> Self {
        let mut config = test_config();
        config.narrative.provider = NarrativeProvider::Ai;
        Self::build(config, Some(generator))
    }

    fn build(config: AppConfig, generator: Option<Arc<dyn TextGenerator>>) -> Self {
        let storage = Arc::new(MemoryStorage::new());
        let state = AppState::new(storage.clone(), &config, generator);
        Self {
            storage,
            config,
            state,
        }
    }

    pub fn token_for(&self, user_id: Uuid) -> String {
        auth::issue_token(&self.config.auth, user_id, Utc::now().timestamp()).unwrap()
    }

    pub async fn seed(&self, transactions: &[Transaction]) {
        for txn in transactions {
            self.storage.insert_transaction(txn).await.unwrap();
        }
    }

    pub async fn set_baseline(&self, user_id: Uuid, category: Category, amount: i64) {
        self.storage
            .upsert_baseline(&Baseline {
                user_id,
                category,
                time_period: TimePeriod::Weekly,
                baseline_amount: Decimal::new(amount, 0),
                baseline_count: 3,
                calculated_at: Utc::now(),
            })
            .await
            .unwrap();
    }

    pub async fn set_preferences(&self, user_id: Uuid, preferences: NotificationPreferences) {
        self.storage
            .save_preferences(user_id, &preferences)
            .await
            .unwrap();
    }
}

// ============================================================================
// Transaction builders
// ============================================================================

pub fn txn(
    user_id: Uuid,
    timestamp: DateTime<Utc>,
    amount: i64,
    merchant: &str,
    category: Category,
) -> Transaction {
    NewTransaction {
        timestamp,
        amount: Decimal::new(amount, 0),
        merchant: merchant.to_string(),
        category,
        is_recurring: false,
        context_tags: vec![],
        custom_note: None,
    }
    .into_transaction(user_id, utc_offset())
}

pub fn tagged_txn(
    user_id: Uuid,
    timestamp: DateTime<Utc>,
    amount: i64,
    merchant: &str,
    category: Category,
    tags: Vec<ContextTag>,
) -> Transaction {
    let mut txn = txn(user_id, timestamp, amount, merchant, category);
    txn.context_tags = tags;
    txn
}

/// `count` hourly transactions of `category` from Monday 2024-03-04 09:00,
/// summing to `total`
pub fn this_week(user_id: Uuid, category: Category, count: i64, total: i64) -> Vec<Transaction> {
    let each = total / count;
    (0..count)
        .map(|i| {
            let amount = if i == count - 1 { total - each * (count - 1) } else { each };
            txn(
                user_id,
                at(2024, 3, 4, 9) + chrono::Duration::hours(i),
                amount,
                &format!("Shop {}", i),
                category,
            )
        })
        .collect()
}

// ============================================================================
// Text generator stubs
// ============================================================================

/// Always replies with the same text
pub struct CannedGenerator(pub String);

#[async_trait]
impl TextGenerator for CannedGenerator {
    async fn complete(&self, _request: &CompletionRequest) -> Result<String, NarrativeError> {
        Ok(self.0.clone())
    }
}

/// Always fails with a rate limit
pub struct RateLimitedGenerator;

#[async_trait]
impl TextGenerator for RateLimitedGenerator {
    async fn complete(&self, _request: &CompletionRequest) -> Result<String, NarrativeError> {
        Err(NarrativeError::RateLimited)
    }
}

/// Always fails with an exhausted quota
pub struct QuotaExhaustedGenerator;

#[async_trait]
impl TextGenerator for QuotaExhaustedGenerator {
    async fn complete(&self, _request: &CompletionRequest) -> Result<String, NarrativeError> {
        Err(NarrativeError::QuotaExceeded)
    }
}

// ============================================================================
// Postgres fixtures
// ============================================================================

/// Test database connection. Tests using it are skipped when
/// `TEST_DATABASE_URL` is not set.
pub struct TestDatabase {
    pub pool: PgPool,
    pub storage: PgStorage,
}

impl TestDatabase {
    pub async fn connect() -> Option<Self> {
        let database_url = match std::env::var("TEST_DATABASE_URL") {
            Ok(url) => url,
            Err(_) => {
                eprintln!("TEST_DATABASE_URL not set, skipping database test");
                return None;
            }
        };

        let config = DatabaseConfig {
            url: database_url,
            max_connections: 5,
            acquire_timeout_secs: 10,
            idle_timeout_secs: 300,
            max_lifetime_secs: 600,
            test_before_acquire: true,
        };

        let pool = create_pool(&config)
            .await
            .expect("Failed to create test database pool");

        run_migrations(&pool, None)
            .await
            .expect("Failed to run migrations");

        Some(Self {
            storage: PgStorage::new(pool.clone()),
            pool,
        })
    }

    /// Clean up all test data
    pub async fn cleanup(&self) {
        sqlx::query(
            "TRUNCATE TABLE insight_states, user_preferences, weekly_checkins, notifications, \
             deviation_events, spending_patterns, spending_baselines, transactions",
        )
        .execute(&self.pool)
        .await
        .expect("Failed to cleanup test data");
    }
}
