//! API route definitions
//!
//! Admin surface for the three services:
//! - /health — dependency checks
//! - /api/v1/scrape, /scheduler/status, /automation/logs, /articles, /alerts
//! - /api/v1/analyze, /events, /status, /start-processor, /stop-processor
//! - /api/v1/predict, /signals, /simulate, /initialize-economic-data

use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{self, AppState};

/// Build the full application router.
pub fn create_app(state: AppState) -> Router {
    let cors = cors_layer(&state.config.allowed_origins);

    let api = Router::new()
        // Ingestion
        .route(
            "/scrape",
            get(handlers::ingest::trigger_scrape).post(handlers::ingest::trigger_scrape),
        )
        .route("/scheduler/status", get(handlers::ingest::scheduler_status))
        .route("/automation/logs", get(handlers::ingest::automation_logs))
        .route("/articles", get(handlers::ingest::list_articles))
        .route("/alerts", get(handlers::ingest::list_alerts))
        // Extraction
        .route(
            "/analyze",
            get(handlers::extract::analyze).post(handlers::extract::analyze),
        )
        .route("/events", get(handlers::extract::list_events))
        .route("/status", get(handlers::extract::combined_status))
        .route("/start-processor", post(handlers::extract::start_processor))
        .route("/stop-processor", post(handlers::extract::stop_processor))
        // Scoring
        .route(
            "/predict",
            get(handlers::scoring::predict).post(handlers::scoring::predict),
        )
        .route("/signals", get(handlers::scoring::list_signals))
        .route("/simulate", post(handlers::scoring::simulate))
        .route(
            "/initialize-economic-data",
            post(handlers::scoring::initialize_economic_data),
        );

    Router::new()
        .route("/health", get(handlers::health::get_health))
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    if allowed_origins.iter().any(|o| o == "*") {
        CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
    } else {
        let origins: Vec<HeaderValue> = allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
