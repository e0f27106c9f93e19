use crate::calendar;
use crate::config::{DetectionConfig, SchedulerConfig};
use crate::error::AppResult;
use crate::services::{BaselineCalculator, DeviationEngine, PatternDetector};
use crate::storage::InsightStorage;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::time;
use tracing::{error, info};
use uuid::Uuid;

/// Result of one scheduler pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PassSummary {
    pub users: usize,
    pub failed: usize,
    pub deviations: usize,
}

/// Periodically recomputes baselines, patterns and deviations for every
/// user with recent transactions
pub struct DetectionScheduler {
    storage: Arc<dyn InsightStorage>,
    baselines: Arc<BaselineCalculator>,
    patterns: Arc<PatternDetector>,
    deviations: Arc<DeviationEngine>,
    detection: DetectionConfig,
    config: SchedulerConfig,
}

impl DetectionScheduler {
    pub fn new(
        storage: Arc<dyn InsightStorage>,
        baselines: Arc<BaselineCalculator>,
        patterns: Arc<PatternDetector>,
        deviations: Arc<DeviationEngine>,
        detection: DetectionConfig,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            storage,
            baselines,
            patterns,
            deviations,
            detection,
            config,
        }
    }

    /// Run passes forever on the configured interval
    pub async fn start(self) {
        let mut interval = time::interval(self.config.interval());
        info!(
            "Detection scheduler started, every {:?} with concurrency {}",
            self.config.interval(),
            self.config.concurrency
        );

        loop {
            interval.tick().await;

            match self.run_pass(Utc::now()).await {
                Ok(summary) => info!(
                    "Detection pass finished: {} users, {} failed, {} deviations",
                    summary.users, summary.failed, summary.deviations
                ),
                Err(e) => error!("Detection pass could not start: {}", e),
            }
        }
    }

    /// One pass over all active users. A failing user is logged and skipped.
    pub async fn run_pass(&self, now: DateTime<Utc>) -> AppResult<PassSummary> {
        let users = self
            .storage
            .active_user_ids(now - self.detection.window())
            .await?;

        let mut summary = PassSummary {
            users: users.len(),
            ..PassSummary::default()
        };

        // At most `concurrency` users in flight
        for chunk in users.chunks(self.config.concurrency.max(1)) {
            let runs: Vec<_> = chunk.iter().map(|&user_id| self.run_user(user_id, now)).collect();
            let results = futures::future::join_all(runs).await;

            for (user_id, result) in chunk.iter().zip(results) {
                match result {
                    Ok(count) => summary.deviations += count,
                    Err(e) => {
                        error!("Detection failed for user {}: {}", user_id, e);
                        summary.failed += 1;
                    }
                }
            }
        }
        Ok(summary)
    }

    /// Existing baselines are refreshed from the window ending at the start of
    /// the current week, so this week's spend never feeds its own baseline.
    /// Users without baselines get them from the scan's cold start.
    async fn run_user(&self, user_id: Uuid, now: DateTime<Utc>) -> AppResult<usize> {
        if !self.storage.baselines_for_user(user_id).await?.is_empty() {
            let week_start = calendar::week_start(now, self.detection.utc_offset);
            self.baselines
                .calculate_baselines_at(user_id, week_start)
                .await?;
        }
        self.patterns.detect_patterns_at(user_id, now).await?;
        let scan = self.deviations.run_deviation_scan_at(user_id, now).await?;
        Ok(scan.count)
    }
}
