//! HTTP API.
//!
//! `/health` is public. Everything under `/v1` passes through
//! [`middleware::require_auth`] before reaching a handler.

pub mod dto;
pub mod handlers;
pub mod middleware;

use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::AppState;

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    let v1 = Router::new()
        // Transactions
        .route("/transactions", post(handlers::record_transaction))
        .route("/transactions/:id/tags", post(handlers::tag_transaction))
        // Detection
        .route("/baselines/calculate", post(handlers::calculate_baselines))
        .route("/patterns/detect", post(handlers::detect_patterns))
        .route("/deviations/scan", post(handlers::scan_deviations))
        .route("/deviations/:id/acknowledge", post(handlers::acknowledge_deviation))
        // Insights
        .route("/insights", get(handlers::list_insights))
        .route("/insights/:key/feedback", post(handlers::record_feedback))
        .route("/insights/:key/dismiss", post(handlers::dismiss_insight))
        .route("/stories", get(handlers::generate_stories))
        // Preferences
        .route(
            "/preferences",
            get(handlers::get_preferences).put(handlers::put_preferences),
        )
        // Statements
        .route("/statements/analyze", post(handlers::analyze_statement))
        .route_layer(from_fn_with_state(state.clone(), middleware::require_auth));

    Router::new()
        .route("/health", get(handlers::health))
        .nest("/v1", v1)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
