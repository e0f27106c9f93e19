use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use uuid::Uuid;

use super::dto::{
    AcknowledgeRequest, AnalyzeStatementRequest, FeedbackRequest, HealthResponse, InsightQuery,
    TagTransactionRequest,
};
use super::middleware::AuthUser;
use crate::error::{AppError, AppResult};
use crate::models::{
    DeviationEvent, Insight, NewTransaction, NotificationPreferences, PatternKey,
    StatementAnalysis, Transaction,
};
use crate::services::{BaselineOutcome, DetectionOutcome, ScanOutcome, StoriesOutcome};
use crate::AppState;

fn parse_key(raw: &str) -> AppResult<PatternKey> {
    PatternKey::parse(raw).map_err(AppError::Validation)
}

/// Liveness; reports database reachability when one is attached
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let database = match &state.database {
        Some(db) => Some(db.ping().await.is_ok()),
        None => None,
    };

    Json(HealthResponse {
        status: if database == Some(false) { "degraded" } else { "healthy" },
        version: env!("CARGO_PKG_VERSION"),
        database,
    })
}

// ==================== Transactions ====================

pub async fn record_transaction(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Json(input): Json<NewTransaction>,
) -> AppResult<(StatusCode, Json<Transaction>)> {
    let txn = state.transactions.record_transaction(user_id, input).await?;
    Ok((StatusCode::CREATED, Json(txn)))
}

pub async fn tag_transaction(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(body): Json<TagTransactionRequest>,
) -> AppResult<Json<Transaction>> {
    let txn = state
        .transactions
        .tag_transaction(user_id, id, &body.tags, body.note.as_deref())
        .await?;
    Ok(Json(txn))
}

// ==================== Detection ====================

pub async fn calculate_baselines(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
) -> AppResult<Json<BaselineOutcome>> {
    Ok(Json(state.baselines.calculate_baselines(user_id).await?))
}

pub async fn detect_patterns(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
) -> AppResult<Json<DetectionOutcome>> {
    Ok(Json(state.patterns.detect_patterns(user_id).await?))
}

pub async fn scan_deviations(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
) -> AppResult<Json<ScanOutcome>> {
    Ok(Json(state.deviations.run_deviation_scan(user_id).await?))
}

pub async fn acknowledge_deviation(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    body: Option<Json<AcknowledgeRequest>>,
) -> AppResult<Json<DeviationEvent>> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let event = state
        .deviations
        .acknowledge_deviation(user_id, id, body.response.as_deref())
        .await?;
    Ok(Json(event))
}

// ==================== Insights ====================

pub async fn list_insights(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Query(query): Query<InsightQuery>,
) -> AppResult<Json<Vec<Insight>>> {
    Ok(Json(
        state
            .insights
            .list_insights(user_id, query.include_dismissed)
            .await?,
    ))
}

pub async fn record_feedback(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path(key): Path<String>,
    Json(body): Json<FeedbackRequest>,
) -> AppResult<Json<Insight>> {
    let key = parse_key(&key)?;
    Ok(Json(
        state
            .insights
            .record_feedback(user_id, &key, body.feedback)
            .await?,
    ))
}

pub async fn dismiss_insight(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path(key): Path<String>,
) -> AppResult<Json<Insight>> {
    let key = parse_key(&key)?;
    Ok(Json(state.insights.dismiss_insight(user_id, &key).await?))
}

pub async fn generate_stories(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
) -> AppResult<Json<StoriesOutcome>> {
    Ok(Json(state.insights.generate_stories(user_id).await?))
}

// ==================== Preferences ====================

pub async fn get_preferences(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
) -> AppResult<Json<NotificationPreferences>> {
    Ok(Json(state.deviations.preferences(user_id).await?))
}

/// Replace preferences. Unknown fields or values are rejected with 400.
pub async fn put_preferences(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Json(body): Json<serde_json::Value>,
) -> AppResult<Json<NotificationPreferences>> {
    let preferences: NotificationPreferences = serde_json::from_value(body)
        .map_err(|e| AppError::Validation(format!("Invalid preferences: {}", e)))?;
    Ok(Json(
        state
            .deviations
            .save_preferences(user_id, preferences)
            .await?,
    ))
}

// ==================== Statements ====================

pub async fn analyze_statement(
    State(state): State<AppState>,
    Extension(AuthUser(_user_id)): Extension<AuthUser>,
    Json(body): Json<AnalyzeStatementRequest>,
) -> AppResult<Json<StatementAnalysis>> {
    Ok(Json(
        state
            .statements
            .analyze_statement(&body.document_text)
            .await?,
    ))
}
