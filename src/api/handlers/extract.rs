//! Extraction Service endpoints

use crate::api::envelope::{ApiErrorResponse, ApiResponse};
use crate::api::handlers::ingest::LimitQuery;
use crate::api::handlers::AppState;
use axum::extract::{Query, State};
use axum::response::Response;
use serde_json::json;

/// GET/POST /api/v1/analyze — synchronous extraction batch.
pub async fn analyze(State(app): State<AppState>, Query(query): Query<LimitQuery>) -> Response {
    match app.extraction.analyze(query.limit).await {
        Ok(summary) => ApiResponse::ok(summary),
        Err(e) => ApiErrorResponse::from_pipeline(&e),
    }
}

/// GET /api/v1/events?limit=
pub async fn list_events(State(app): State<AppState>, Query(query): Query<LimitQuery>) -> Response {
    match app.extraction.list_events(query.limit) {
        Ok(events) => ApiResponse::ok(json!({
            "count": events.len(),
            "events": events,
        })),
        Err(e) => ApiErrorResponse::from_pipeline(&e),
    }
}

/// GET /api/v1/status — combined pipeline status.
pub async fn combined_status(State(app): State<AppState>) -> Response {
    ApiResponse::ok(json!({
        "scheduler": app.ingestion.scheduler.status(),
        "extraction": app.extraction.status(),
        "scoring": app.scoring.status(),
    }))
}

/// POST /api/v1/start-processor — resume both pipeline consumers.
pub async fn start_processor(State(app): State<AppState>) -> Response {
    app.extraction.start_processor();
    app.scoring.start_processor();
    ApiResponse::ok(json!({"processors": "running"}))
}

/// POST /api/v1/stop-processor — pause both pipeline consumers.
pub async fn stop_processor(State(app): State<AppState>) -> Response {
    app.extraction.stop_processor();
    app.scoring.stop_processor();
    ApiResponse::ok(json!({"processors": "stopped"}))
}
