//! Error taxonomy for the pipeline
//!
//! Retry decisions are driven by the error kind, never by downcasting:
//! transient externals back off and retry, validation failures are terminal
//! per-item, duplicates are silently dropped and counted.

use thiserror::Error;

/// Unified error kind used across the three services.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Network / LLM / store timeout-class failures. Retried with backoff.
    #[error("transient external failure: {0}")]
    TransientExternal(String),

    /// LLM output missing fields, non-JSON, out-of-range. Terminal per-item.
    #[error("validation failure: {0}")]
    ValidationFailure(String),

    /// URL or content-hash collision. Dropped and counted, never surfaced.
    #[error("duplicate item: {0}")]
    DuplicateItem(String),

    /// On-demand trigger while a scrape run is already active.
    #[error("scrape run already in progress")]
    SchedulerBusy,

    /// LLM circuit is open; messages are nacked with delay until recovery.
    #[error("circuit open, retry after {retry_after_secs}s")]
    CircuitOpen { retry_after_secs: u64 },

    /// Missing or malformed reference data / environment. Startup-time or
    /// degraded-mode condition.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Document store failure.
    #[error("store error: {0}")]
    Storage(String),

    /// Message bus failure.
    #[error("bus error: {0}")]
    Bus(String),
}

impl PipelineError {
    /// Whether the backoff policy should retry this failure.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            PipelineError::TransientExternal(_)
                | PipelineError::CircuitOpen { .. }
                | PipelineError::Bus(_)
        )
    }

    /// Stable machine code for API error envelopes.
    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::TransientExternal(_) => "TRANSIENT_EXTERNAL",
            PipelineError::ValidationFailure(_) => "VALIDATION_FAILURE",
            PipelineError::DuplicateItem(_) => "DUPLICATE_ITEM",
            PipelineError::SchedulerBusy => "SCHEDULER_BUSY",
            PipelineError::CircuitOpen { .. } => "CIRCUIT_OPEN",
            PipelineError::Configuration(_) => "CONFIGURATION_ERROR",
            PipelineError::Storage(_) => "STORE_ERROR",
            PipelineError::Bus(_) => "BUS_ERROR",
        }
    }
}

impl From<sled::Error> for PipelineError {
    fn from(err: sled::Error) -> Self {
        PipelineError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        PipelineError::ValidationFailure(err.to_string())
    }
}

impl From<reqwest::Error> for PipelineError {
    fn from(err: reqwest::Error) -> Self {
        PipelineError::TransientExternal(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retriable_classification() {
        assert!(PipelineError::TransientExternal("timeout".into()).is_retriable());
        assert!(PipelineError::CircuitOpen { retry_after_secs: 30 }.is_retriable());
        assert!(!PipelineError::ValidationFailure("bad json".into()).is_retriable());
        assert!(!PipelineError::DuplicateItem("url".into()).is_retriable());
        assert!(!PipelineError::SchedulerBusy.is_retriable());
    }

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(PipelineError::SchedulerBusy.code(), "SCHEDULER_BUSY");
        assert_eq!(
            PipelineError::Configuration("x".into()).code(),
            "CONFIGURATION_ERROR"
        );
    }
}
