//! Ingestion Service endpoints

use crate::api::envelope::{ApiErrorResponse, ApiResponse};
use crate::api::handlers::AppState;
use axum::extract::{Query, State};
use axum::response::Response;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    50
}

#[derive(Debug, Deserialize)]
pub struct ArticlesQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub since: Option<DateTime<Utc>>,
}

/// GET/POST /api/v1/scrape — trigger an on-demand run.
pub async fn trigger_scrape(State(app): State<AppState>) -> Response {
    match app.ingestion.trigger_scrape().await {
        Ok(summary) => ApiResponse::ok(summary),
        Err(e) => ApiErrorResponse::from_pipeline(&e),
    }
}

/// GET /api/v1/scheduler/status
pub async fn scheduler_status(State(app): State<AppState>) -> Response {
    ApiResponse::ok(app.ingestion.scheduler.status())
}

/// GET /api/v1/automation/logs?limit=
pub async fn automation_logs(
    State(app): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> Response {
    let (logs, total_count) = app.ingestion.automation_logs(query.limit);
    ApiResponse::ok(json!({
        "logs": logs,
        "total_count": total_count,
    }))
}

/// GET /api/v1/articles?limit=&since=
pub async fn list_articles(
    State(app): State<AppState>,
    Query(query): Query<ArticlesQuery>,
) -> Response {
    match app.ingestion.list_articles(query.since, query.limit) {
        Ok(articles) => ApiResponse::ok(json!({
            "count": articles.len(),
            "articles": articles,
        })),
        Err(e) => ApiErrorResponse::from_pipeline(&e),
    }
}

/// GET /api/v1/alerts?limit= — recent high-risk alert groups.
pub async fn list_alerts(
    State(app): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> Response {
    ApiResponse::ok(json!({
        "alerts": app.ingestion.recent_alerts(query.limit),
    }))
}
