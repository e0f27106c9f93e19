//! Domain models for the reflection backend.
//!
//! Stored entities (transactions, baselines, patterns, deviations,
//! notifications, check-ins, preferences, insight state) plus the derived
//! read-side views built from them.

pub mod baseline;
pub mod deviation;
pub mod insight;
pub mod notification;
pub mod pattern;
pub mod preferences;
pub mod statement;
pub mod transaction;

// Re-export all models for convenient access
pub use baseline::{Baseline, TimePeriod};
pub use deviation::DeviationEvent;
pub use insight::{Feedback, Insight, InsightState, MomentStory, WeekdayHeatmap};
pub use notification::{CategoryChange, Notification, NotificationType, WeeklyCheckin};
pub use pattern::{Confidence, Pattern, PatternKey, PatternKind, Trend};
pub use preferences::{NotificationPreferences, Sensitivity};
pub use statement::StatementAnalysis;
pub use transaction::{
    Category, ContextTag, DayOfWeek, NewTransaction, TimeOfDay, Transaction,
};
