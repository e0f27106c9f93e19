pub mod baseline_repository;
pub mod deviation_repository;
pub mod insight_state_repository;
pub mod notification_repository;
pub mod pattern_repository;
pub mod preferences_repository;
pub mod transaction_repository;

// Re-export all repositories for convenient access
pub use baseline_repository::BaselineRepository;
pub use deviation_repository::DeviationRepository;
pub use insight_state_repository::InsightStateRepository;
pub use notification_repository::NotificationRepository;
pub use pattern_repository::PatternRepository;
pub use preferences_repository::PreferencesRepository;
pub use transaction_repository::TransactionRepository;

use crate::error::RepositoryError;

/// A stored value no longer maps onto its domain enum
pub(crate) fn decode_error(msg: String) -> RepositoryError {
    RepositoryError::Query(sqlx::Error::Decode(msg.into()))
}
