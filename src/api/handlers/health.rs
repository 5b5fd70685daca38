//! Health endpoint
//!
//! Aggregates dependency probes: document store, message bus, reference
//! data completeness. Missing reference tables degrade the report without
//! failing it; a dead store or bus marks the service unhealthy.

use crate::api::envelope::ApiResponse;
use crate::api::handlers::AppState;
use axum::extract::State;
use axum::response::Response;
use chrono::Utc;
use serde_json::json;

pub async fn get_health(State(app): State<AppState>) -> Response {
    let db_ok = app.store.is_healthy();
    let mq_ok = app.bus.is_healthy();
    let reference = app.reference.load();

    let status = if !db_ok || !mq_ok {
        "unhealthy"
    } else if reference.is_degraded() {
        "degraded"
    } else {
        "ok"
    };

    ApiResponse::ok(json!({
        "status": status,
        "checks": {
            "db": db_ok,
            "mq": mq_ok,
            "reference_data": !reference.is_degraded(),
        },
        "missing_reference_files": reference.missing.clone(),
        "timestamp": Utc::now(),
    }))
}
