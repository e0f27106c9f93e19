use crate::config::DetectionConfig;
use crate::error::{AppError, AppResult};
use crate::models::{
    Confidence, ContextTag, Feedback, Insight, InsightState, MomentStory, Pattern, PatternKey,
    Transaction, WeekdayHeatmap,
};
use crate::narrative::{NarrativeFacts, NarrativeSubject, Narrator};
use crate::services::pattern_detector::matches_pattern;
use crate::storage::InsightStorage;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

const MAX_STORY_PATTERNS: usize = 5;
const NARRATED_STORIES: usize = 3;
const MAX_STORY_TAGS: usize = 5;

pub const NOT_ENOUGH_PATTERNS: &str = "Not enough patterns detected yet";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoriesOutcome {
    pub stories: Vec<MomentStory>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Read-side views over detected patterns: insights and moment stories
pub struct InsightService {
    storage: Arc<dyn InsightStorage>,
    narrator: Narrator,
    detection: DetectionConfig,
}

impl InsightService {
    pub fn new(
        storage: Arc<dyn InsightStorage>,
        narrator: Narrator,
        detection: DetectionConfig,
    ) -> Self {
        Self {
            storage,
            narrator,
            detection,
        }
    }

    /// Stored patterns joined with their insight state
    pub async fn list_insights(
        &self,
        user_id: Uuid,
        include_dismissed: bool,
    ) -> AppResult<Vec<Insight>> {
        let patterns = self.storage.patterns_for_user(user_id).await?;
        let states: HashMap<PatternKey, InsightState> = self
            .storage
            .insight_states(user_id)
            .await?
            .into_iter()
            .map(|s| (s.pattern_key.clone(), s))
            .collect();

        Ok(patterns
            .iter()
            .map(|p| Insight::from_pattern(p, states.get(&p.key)))
            .filter(|i| include_dismissed || !i.dismissed)
            .collect())
    }

    pub async fn record_feedback(
        &self,
        user_id: Uuid,
        key: &PatternKey,
        feedback: Feedback,
    ) -> AppResult<Insight> {
        self.update_state(user_id, key, |state| state.feedback = Some(feedback))
            .await
    }

    pub async fn dismiss_insight(&self, user_id: Uuid, key: &PatternKey) -> AppResult<Insight> {
        self.update_state(user_id, key, |state| state.dismissed = true)
            .await
    }

    async fn update_state<F>(&self, user_id: Uuid, key: &PatternKey, apply: F) -> AppResult<Insight>
    where
        F: FnOnce(&mut InsightState) + Send,
    {
        let pattern = self
            .storage
            .find_pattern(user_id, key)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Pattern {} not found", key)))?;

        let now = Utc::now();
        let mut state = self
            .storage
            .insight_states(user_id)
            .await?
            .into_iter()
            .find(|s| &s.pattern_key == key)
            .unwrap_or_else(|| InsightState::new(user_id, key.clone(), now));

        apply(&mut state);
        state.updated_at = now;
        self.storage.upsert_insight_state(&state).await?;

        debug!(
            "Insight {} for user {}: dismissed={}, feedback={:?}",
            key, user_id, state.dismissed, state.feedback
        );
        Ok(Insight::from_pattern(&pattern, Some(&state)))
    }

    pub async fn generate_stories(&self, user_id: Uuid) -> AppResult<StoriesOutcome> {
        self.generate_stories_at(user_id, Utc::now()).await
    }

    /// Stories for the most frequent established patterns.
    /// Only the first few are narrated; the rest reuse the pattern description.
    pub async fn generate_stories_at(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> AppResult<StoriesOutcome> {
        let mut patterns: Vec<Pattern> = self
            .storage
            .patterns_for_user(user_id)
            .await?
            .into_iter()
            .filter(|p| matches!(p.confidence, Confidence::Strong | Confidence::Emerging))
            .collect();

        if patterns.is_empty() {
            return Ok(StoriesOutcome {
                stories: Vec::new(),
                message: Some(NOT_ENOUGH_PATTERNS.to_string()),
            });
        }

        patterns.sort_by(|a, b| {
            b.occurrences
                .cmp(&a.occurrences)
                .then_with(|| a.key.cmp(&b.key))
        });
        patterns.truncate(MAX_STORY_PATTERNS);

        let transactions = self
            .storage
            .transactions_between(user_id, now - self.detection.window(), now)
            .await?;

        let mut stories = Vec::with_capacity(patterns.len());
        for (rank, pattern) in patterns.iter().enumerate() {
            let context_tags = context_tags_for(pattern, &transactions);

            let narrative = if rank < NARRATED_STORIES {
                let facts = NarrativeFacts {
                    subject: NarrativeSubject::Pattern {
                        title: pattern.title.clone(),
                        description: pattern.description.clone(),
                        time_range: pattern.time_range.clone(),
                        average_amount: pattern.average_amount,
                    },
                    category: pattern.category,
                    occurrences: pattern.occurrences,
                    trend: Some(pattern.trend),
                    context_tags: context_tags.clone(),
                };
                self.narrator.narrate(&facts).await
            } else {
                pattern.description.clone()
            };

            stories.push(MomentStory {
                key: pattern.key.clone(),
                title: pattern.title.clone(),
                narrative,
                category: pattern.category,
                confidence: pattern.confidence,
                occurrences: pattern.occurrences,
                context_tags,
                heatmap: heatmap_for(&pattern.key, &transactions),
                created_at: now,
            });
        }

        info!("Generated {} moment stories for user {}", stories.len(), user_id);
        Ok(StoriesOutcome {
            stories,
            message: None,
        })
    }
}

/// Distinct tags seen on in-window transactions of the pattern's category,
/// newest first
fn context_tags_for(pattern: &Pattern, transactions: &[Transaction]) -> Vec<ContextTag> {
    let mut tags = Vec::new();
    for txn in transactions.iter().filter(|t| t.category == pattern.category) {
        for tag in &txn.context_tags {
            if tags.len() == MAX_STORY_TAGS {
                return tags;
            }
            if !tags.contains(tag) {
                tags.push(*tag);
            }
        }
    }
    tags
}

fn heatmap_for(key: &PatternKey, transactions: &[Transaction]) -> WeekdayHeatmap {
    let mut heatmap = WeekdayHeatmap::default();
    for txn in transactions.iter().filter(|t| matches_pattern(key, t)) {
        heatmap.record(txn.day_of_week);
    }
    heatmap
}
