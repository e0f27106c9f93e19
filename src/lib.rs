//! Reflect Backend Library
//!
//! Pattern and deviation detection over a user's spending history, exposed
//! as an HTTP API. This module exposes the components for use by the binary
//! and by tests.

pub mod api;
pub mod auth;
pub mod calendar;
pub mod config;
pub mod database;
pub mod error;
pub mod models;
pub mod narrative;
pub mod repositories;
pub mod services;
pub mod storage;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{AppError, AppResult};

use config::{AuthConfig, DetectionConfig, SchedulerConfig};
use database::Database;
use narrative::{Narrator, TextGenerator};
use services::*;
use std::sync::Arc;
use storage::InsightStorage;

/// Application state shared by all handlers
#[derive(Clone)]
pub struct AppState {
    /// Present when running against Postgres; checked by `/health`
    pub database: Option<Database>,
    pub auth: AuthConfig,
    pub detection: DetectionConfig,
    pub storage: Arc<dyn InsightStorage>,
    pub transactions: Arc<TransactionService>,
    pub baselines: Arc<BaselineCalculator>,
    pub patterns: Arc<PatternDetector>,
    pub deviations: Arc<DeviationEngine>,
    pub insights: Arc<InsightService>,
    pub statements: Arc<StatementAnalyzer>,
}

impl AppState {
    /// Wire services over `storage`. `text_generator` is shared by the
    /// narrator and statement analysis; `None` means templates only.
    pub fn new(
        storage: Arc<dyn InsightStorage>,
        config: &AppConfig,
        text_generator: Option<Arc<dyn TextGenerator>>,
    ) -> Self {
        let detection = config.detection.clone();
        let narrator = Narrator::from_config(&config.narrative, text_generator.clone());

        let baselines = Arc::new(BaselineCalculator::new(storage.clone(), detection.clone()));

        Self {
            database: None,
            auth: config.auth.clone(),
            transactions: Arc::new(TransactionService::new(storage.clone(), detection.clone())),
            patterns: Arc::new(PatternDetector::new(storage.clone(), detection.clone())),
            deviations: Arc::new(DeviationEngine::new(
                storage.clone(),
                baselines.clone(),
                narrator.clone(),
                detection.clone(),
            )),
            insights: Arc::new(InsightService::new(storage.clone(), narrator, detection.clone())),
            statements: Arc::new(StatementAnalyzer::new(text_generator)),
            baselines,
            detection,
            storage,
        }
    }

    pub fn with_database(mut self, database: Database) -> Self {
        self.database = Some(database);
        self
    }

    /// Background scheduler over the same services
    pub fn scheduler(&self, config: SchedulerConfig) -> DetectionScheduler {
        DetectionScheduler::new(
            self.storage.clone(),
            self.baselines.clone(),
            self.patterns.clone(),
            self.deviations.clone(),
            self.detection.clone(),
            config,
        )
    }
}
