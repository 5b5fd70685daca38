//! Sentinel: proactive conflict monitoring for Nigeria
//!
//! A three-service pipeline behind one process:
//!
//! - **Ingestion**: scheduled scrape of pluggable article fetchers, dedup
//!   gate, high-risk alert fan-out
//! - **Extraction**: article → structured conflict event via the LLM
//!   contract, guarded by cache + circuit breaker
//! - **Scoring**: multi-factor risk model with geospatial and economic
//!   context, surge detection and a synchronous simulation endpoint
//!
//! Stages are joined by durable queues and a document store; each stage is
//! idempotent so at-least-once delivery is safe end to end.

pub mod api;
pub mod app;
pub mod artifacts;
pub mod bus;
pub mod config;
pub mod error;
pub mod extract;
pub mod ingest;
pub mod scoring;
pub mod store;
pub mod types;

// Re-export the shapes most callers need
pub use app::App;
pub use config::Config;
pub use error::{PipelineError, Result};
pub use types::{
    Article, AutomationLog, EventType, HighRiskAlert, ParsedEvent, ProcessingStatus, RiskLevel,
    RiskSignal, Severity, SignalStatus,
};

pub use scoring::SimulationParams;
