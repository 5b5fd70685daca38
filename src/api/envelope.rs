//! Response envelope for the admin API
//!
//! Success: `{ "data": T, "meta": { ... } }`. Errors: `{ "error":
//! { "code", "message" }, "meta": { ... } }`. Internal detail never leaks
//! into error messages; the code is the machine-stable part.

use crate::error::PipelineError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use serde::Serialize;

/// Metadata included in every response.
#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub timestamp: String,
    pub version: &'static str,
}

impl Default for ResponseMeta {
    fn default() -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            version: "1",
        }
    }
}

/// Successful response wrapper.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Response {
        let body = Self {
            data,
            meta: ResponseMeta::default(),
        };
        (StatusCode::OK, axum::Json(body)).into_response()
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub error_code: String,
    pub message: String,
}

/// Error response wrapper.
#[derive(Debug, Serialize)]
pub struct ApiErrorResponse {
    pub error: ErrorDetail,
    pub meta: ResponseMeta,
}

impl ApiErrorResponse {
    fn build(status: StatusCode, code: &str, msg: impl Into<String>) -> Response {
        let body = Self {
            error: ErrorDetail {
                error_code: code.to_string(),
                message: msg.into(),
            },
            meta: ResponseMeta::default(),
        };
        (status, axum::Json(body)).into_response()
    }

    pub fn bad_request(msg: impl Into<String>) -> Response {
        Self::build(StatusCode::BAD_REQUEST, "BAD_REQUEST", msg)
    }

    pub fn internal(msg: impl Into<String>) -> Response {
        Self::build(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg)
    }

    /// Map a pipeline error to its wire shape. SchedulerBusy is a
    /// conflict, not a server fault; validation is the caller's problem.
    pub fn from_pipeline(err: &PipelineError) -> Response {
        let status = match err {
            PipelineError::SchedulerBusy => StatusCode::CONFLICT,
            PipelineError::ValidationFailure(_) => StatusCode::BAD_REQUEST,
            PipelineError::Configuration(_) => StatusCode::SERVICE_UNAVAILABLE,
            PipelineError::CircuitOpen { .. } => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        // Code plus generic message; reasons stay in the logs.
        let message = match err {
            PipelineError::SchedulerBusy => "a scrape run is already in progress".to_string(),
            PipelineError::ValidationFailure(m) => m.clone(),
            _ => "request could not be completed".to_string(),
        };
        Self::build(status, err.code(), message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ok_envelope_shape() {
        let resp = ApiResponse::ok(serde_json::json!({"count": 3}));
        assert_eq!(resp.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let v: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(v["data"]["count"], 3);
        assert_eq!(v["meta"]["version"], "1");
    }

    #[tokio::test]
    async fn test_scheduler_busy_maps_to_conflict() {
        let resp = ApiErrorResponse::from_pipeline(&PipelineError::SchedulerBusy);
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let v: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(v["error"]["error_code"], "SCHEDULER_BUSY");
    }

    #[tokio::test]
    async fn test_storage_error_hides_detail() {
        let resp =
            ApiErrorResponse::from_pipeline(&PipelineError::Storage("sled: io error at /x".into()));
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let v: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(v["error"]["error_code"], "STORE_ERROR");
        assert!(!v["error"]["message"].as_str().unwrap().contains("sled"));
    }
}
