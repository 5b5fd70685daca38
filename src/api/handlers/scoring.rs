//! Scoring Service endpoints

use crate::api::envelope::{ApiErrorResponse, ApiResponse};
use crate::api::handlers::AppState;
use crate::scoring::SimulationParams;
use axum::extract::{Query, State};
use axum::response::Response;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
pub struct SignalsQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub state: Option<String>,
    /// When true, return only the highest-version signal per (state, lga).
    #[serde(default)]
    pub latest: bool,
}

#[derive(Debug, Deserialize)]
pub struct PredictQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    50
}

#[derive(Debug, Deserialize)]
pub struct InitEconomicBody {
    #[serde(default)]
    pub source: String,
}

/// GET/POST /api/v1/predict — batch-score pending events.
pub async fn predict(State(app): State<AppState>, Query(query): Query<PredictQuery>) -> Response {
    match app.scoring.predict(query.limit) {
        Ok(summary) => ApiResponse::ok(summary),
        Err(e) => ApiErrorResponse::from_pipeline(&e),
    }
}

/// GET /api/v1/signals?state=&limit=&latest=
pub async fn list_signals(
    State(app): State<AppState>,
    Query(query): Query<SignalsQuery>,
) -> Response {
    let result = if query.latest {
        app.scoring.latest_signals(query.state.as_deref())
    } else {
        app.scoring.list_signals(query.state.as_deref(), query.limit)
    };
    match result {
        Ok(signals) => ApiResponse::ok(json!({
            "count": signals.len(),
            "signals": signals,
        })),
        Err(e) => ApiErrorResponse::from_pipeline(&e),
    }
}

/// POST /api/v1/simulate — what-if pass over all persisted events.
/// Out-of-range parameters are clamped to [0, 100].
pub async fn simulate(
    State(app): State<AppState>,
    Json(params): Json<SimulationParams>,
) -> Response {
    match app.scoring.simulate(params) {
        Ok(output) => ApiResponse::ok(output),
        Err(e) => ApiErrorResponse::from_pipeline(&e),
    }
}

/// POST /api/v1/initialize-economic-data
pub async fn initialize_economic_data(
    State(app): State<AppState>,
    body: Option<Json<InitEconomicBody>>,
) -> Response {
    let source = body.map(|Json(b)| b.source).unwrap_or_default();
    match app.scoring.initialize_economic_data(&source) {
        Ok(records_loaded) => ApiResponse::ok(json!({
            "records_loaded": records_loaded,
        })),
        Err(e) => ApiErrorResponse::from_pipeline(&e),
    }
}
