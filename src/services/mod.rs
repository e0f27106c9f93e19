pub mod baseline_calculator;
pub mod deviation_engine;
pub mod digest;
pub mod insight_service;
pub mod pattern_detector;
pub mod scheduler;
pub mod statement_analysis;
pub mod transaction_service;

pub use baseline_calculator::{BaselineCalculator, BaselineOutcome};
pub use deviation_engine::{DeviationEngine, ScanOutcome};
pub use insight_service::{InsightService, StoriesOutcome};
pub use pattern_detector::{calculate_trend, DetectionOutcome, PatternDetector};
pub use scheduler::{DetectionScheduler, PassSummary};
pub use statement_analysis::StatementAnalyzer;
pub use transaction_service::TransactionService;

use rust_decimal::{Decimal, RoundingStrategy};

/// Round to whole currency units, half away from zero
pub(crate) fn round_whole(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
}
