//! Request and response bodies that are not domain models themselves

use serde::{Deserialize, Serialize};

use crate::models::{ContextTag, Feedback};

#[derive(Debug, Deserialize)]
pub struct TagTransactionRequest {
    #[serde(default)]
    pub tags: Vec<ContextTag>,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AcknowledgeRequest {
    #[serde(default)]
    pub response: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct InsightQuery {
    #[serde(default)]
    pub include_dismissed: bool,
}

#[derive(Debug, Deserialize)]
pub struct FeedbackRequest {
    pub feedback: Feedback,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeStatementRequest {
    #[serde(default)]
    pub document_text: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub database: Option<bool>,
}
