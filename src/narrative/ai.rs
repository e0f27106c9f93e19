use async_trait::async_trait;
use std::sync::Arc;

use super::{
    CompletionRequest, NarrativeError, NarrativeFacts, NarrativeGenerator, NarrativeSubject,
    TextGenerator,
};

const SYSTEM_PROMPT: &str = "You are a warm, non-judgmental behavioral finance analyst who helps people reflect on their spending patterns. Use tentative language such as \"It looks like\", \"You tend to\", \"This might suggest\" or \"We noticed\". Never give advice, never judge, and never use absolute words.";

/// Narratives from the external text generator
pub struct AiNarrator {
    client: Arc<dyn TextGenerator>,
}

impl AiNarrator {
    pub fn new(client: Arc<dyn TextGenerator>) -> Self {
        Self { client }
    }

    /// Fact sheet sent as the user prompt
    pub fn prompt(facts: &NarrativeFacts) -> String {
        let mut lines = Vec::new();

        match &facts.subject {
            NarrativeSubject::Deviation { percentage } => {
                lines.push(format!(
                    "Write one or two short sentences about a change in weekly {} spending.",
                    facts.category
                ));
                lines.push(format!("- Increase over the usual week: {}%", percentage));
                lines.push(format!("- Transactions this week: {}", facts.occurrences));
            }
            NarrativeSubject::Pattern {
                title,
                description,
                time_range,
                average_amount,
            } => {
                lines.push(
                    "Write a 2-3 sentence reflective story about this spending pattern."
                        .to_string(),
                );
                lines.push(format!("- Title: {}", title));
                lines.push(format!("- Description: {}", description));
                lines.push(format!("- Category: {}", facts.category));
                lines.push(format!(
                    "- Occurrences: {} times in the last 90 days",
                    facts.occurrences
                ));
                lines.push(format!("- Average amount: {}", average_amount));
                lines.push(format!("- Time range: {}", time_range));
            }
        }

        if let Some(trend) = facts.trend {
            lines.push(format!("- Trend: {}", trend.as_str()));
        }
        if !facts.context_tags.is_empty() {
            let tags: Vec<&str> = facts.context_tags.iter().map(|t| t.label()).collect();
            lines.push(format!(
                "- Context tags on related transactions: {}",
                tags.join(", ")
            ));
        }

        lines.join("\n")
    }
}

#[async_trait]
impl NarrativeGenerator for AiNarrator {
    async fn generate(&self, facts: &NarrativeFacts) -> Result<String, NarrativeError> {
        let request = CompletionRequest {
            system: SYSTEM_PROMPT.to_string(),
            user: Self::prompt(facts),
            max_tokens: Some(200),
            temperature: None,
        };

        let text = self.client.complete(&request).await?;
        let text = text.trim().trim_matches('"').trim().to_string();
        if text.is_empty() {
            return Err(NarrativeError::Malformed("empty narrative".to_string()));
        }
        Ok(text)
    }

    fn name(&self) -> &'static str {
        "ai"
    }
}
