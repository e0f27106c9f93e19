use super::{Confidence, Trend};
use serde::{Deserialize, Serialize};

/// Structured result of analysing a free-text bank statement.
///
/// Field names follow the camelCase JSON contract the text generator is asked
/// to produce, so the same type validates the reply and is returned to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatementAnalysis {
    pub summary: StatementSummary,
    pub patterns: Vec<StatementPattern>,
    pub insights: Vec<StatementInsight>,
    pub transactions: Vec<StatementTransaction>,
    /// Set only when the reply could not be parsed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_analysis: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatementSummary {
    pub total_transactions: u32,
    pub total_spent: f64,
    pub date_range: DateRange,
    pub top_categories: Vec<TopCategory>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: String,
    pub end: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopCategory {
    pub name: String,
    pub amount: f64,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatementPattern {
    pub id: String,
    pub title: String,
    pub description: String,
    pub confidence: Confidence,
    pub category: String,
    pub occurrences: u32,
    pub average_amount: f64,
    pub time_range: String,
    pub trend: Trend,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementInsight {
    pub id: String,
    pub title: String,
    pub description: String,
    pub confidence: Confidence,
    pub category: String,
    #[serde(default)]
    pub actionable: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementTransaction {
    pub date: String,
    pub description: String,
    pub amount: f64,
    pub category: String,
}

pub const PARSE_ERROR_INSIGHT_ID: &str = "parse-error";

impl StatementAnalysis {
    /// Degraded result carrying the unparseable reply verbatim
    pub fn unparsed(raw: &str) -> Self {
        Self {
            summary: StatementSummary {
                total_transactions: 0,
                total_spent: 0.0,
                date_range: DateRange::default(),
                top_categories: Vec::new(),
            },
            patterns: Vec::new(),
            insights: vec![StatementInsight {
                id: PARSE_ERROR_INSIGHT_ID.to_string(),
                title: "Analysis Complete".to_string(),
                description: raw.to_string(),
                confidence: Confidence::Emerging,
                category: "general".to_string(),
                actionable: Some(
                    "Please upload a clearer document for more detailed analysis.".to_string(),
                ),
            }],
            transactions: Vec::new(),
            raw_analysis: Some(raw.to_string()),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.raw_analysis.is_some()
    }

    /// Overwrite generator-supplied confidences with the occurrence-based tiers
    pub fn normalize_confidences(&mut self) {
        for pattern in &mut self.patterns {
            pattern.confidence = Confidence::from_occurrences(pattern.occurrences as usize);
        }
    }
}
