//! Extraction Service
//!
//! Consumes the `articles` queue, calls the extraction LLM, validates and
//! normalizes the response into a [`crate::types::ParsedEvent`], persists
//! it and publishes to the `events` queue. The LLM is protected by an LRU
//! response cache, a circuit breaker and a concurrency semaphore.

mod cache;
mod circuit;
mod llm;
mod service;
mod validate;

pub use cache::ResponseCache;
pub use circuit::{CircuitBreaker, CircuitState};
pub use llm::{LlmClient, LlmExtractor};
pub use service::{AnalyzeSummary, ExtractionService, ProcessorState};
pub use validate::{validated_event_from_response, ExtractedFields};
