use crate::error::{AppError, AppResult};
use crate::models::StatementAnalysis;
use crate::narrative::{CompletionRequest, TextGenerator};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tracing::{info, warn};

static JSON_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```json\s*([\s\S]*?)\s*```").unwrap());
static ANY_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"```\s*([\s\S]*?)\s*```").unwrap());

const SYSTEM_PROMPT: &str = r#"You are a warm, non-judgmental behavioral finance analyst. Analyze the bank statement text you are given and reply with JSON only, in exactly this shape:
{
  "summary": {
    "totalTransactions": number,
    "totalSpent": number,
    "dateRange": { "start": "YYYY-MM-DD", "end": "YYYY-MM-DD" },
    "topCategories": [{ "name": string, "amount": number, "percentage": number }]
  },
  "patterns": [{
    "id": string, "title": string, "description": string,
    "confidence": "strong" | "emerging" | "weak",
    "category": string, "occurrences": number, "averageAmount": number,
    "timeRange": string, "trend": "increasing" | "stable" | "decreasing"
  }],
  "insights": [{
    "id": string, "title": string, "description": string,
    "confidence": "strong" | "emerging" | "weak",
    "category": string, "actionable": string
  }],
  "transactions": [{ "date": "YYYY-MM-DD", "description": string, "amount": number, "category": string }]
}
Use tentative language such as "It looks like", "You tend to" or "This might suggest". Never judge and never give advice."#;

/// JSON payload of a generator reply: the contents of a ```json fence, else
/// of any fence, else the trimmed reply itself
pub fn extract_json(reply: &str) -> &str {
    JSON_FENCE
        .captures(reply)
        .or_else(|| ANY_FENCE.captures(reply))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or_else(|| reply.trim())
}

/// Parse a generator reply into an analysis, degrading instead of failing
pub fn parse_analysis(reply: &str) -> StatementAnalysis {
    match serde_json::from_str::<StatementAnalysis>(extract_json(reply)) {
        Ok(mut analysis) => {
            analysis.raw_analysis = None;
            analysis.normalize_confidences();
            analysis
        }
        Err(e) => {
            warn!("Statement analysis reply did not match the expected shape: {}", e);
            StatementAnalysis::unparsed(reply)
        }
    }
}

/// Free-text statement analysis through the external text generator
pub struct StatementAnalyzer {
    generator: Option<Arc<dyn TextGenerator>>,
}

impl StatementAnalyzer {
    pub fn new(generator: Option<Arc<dyn TextGenerator>>) -> Self {
        Self { generator }
    }

    /// Rate-limit and quota failures surface as retryable errors; the
    /// request is never retried here.
    pub async fn analyze_statement(&self, document_text: &str) -> AppResult<StatementAnalysis> {
        if document_text.trim().is_empty() {
            return Err(AppError::Validation("Document text is required".into()));
        }

        let generator = self.generator.as_ref().ok_or_else(|| {
            AppError::ExternalService(
                "No text generator configured (set NARRATIVE_PROVIDER=ai)".into(),
            )
        })?;

        let request = CompletionRequest {
            system: SYSTEM_PROMPT.to_string(),
            user: format!(
                "Analyze this bank statement and identify spending patterns:\n\n{}",
                document_text
            ),
            max_tokens: Some(4000),
            temperature: Some(0.3),
        };

        let reply = generator.complete(&request).await?;
        let analysis = parse_analysis(&reply);

        info!(
            "Statement analysed: {} transactions, {} patterns{}",
            analysis.summary.total_transactions,
            analysis.patterns.len(),
            if analysis.is_degraded() { " (unparsed)" } else { "" }
        );
        Ok(analysis)
    }
}
