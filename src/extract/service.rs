//! Extraction consumer
//!
//! Pulls article messages from the `articles` queue with a bounded worker
//! pool, runs the LLM extraction (cache → breaker → semaphore → retry),
//! persists the resulting event and publishes it to `events`.
//!
//! Terminal validation failures mark the article `failed` and are acked,
//! never retried. Transient failures are nacked for redelivery; while the
//! circuit is open messages are nacked with the recovery delay.

use crate::bus::{Delivery, MessageBus};
use crate::config::Config;
use crate::error::{PipelineError, Result};
use crate::extract::cache::ResponseCache;
use crate::extract::circuit::{CircuitBreaker, CircuitState};
use crate::extract::llm::{build_extraction_prompt, LlmExtractor};
use crate::extract::validate::validated_event_from_response;
use crate::store::DocumentStore;
use crate::types::{Article, ParsedEvent, ProcessingStatus};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Background consumer lifecycle, mirrored from the scrape scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessorState {
    Idle,
    Running,
    Stopped,
}

/// Counters returned by a synchronous `analyze` batch.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AnalyzeSummary {
    pub drained: usize,
    pub events_created: usize,
    pub failed: usize,
    pub deferred: usize,
}

const STATE_IDLE: u8 = 0;
const STATE_RUNNING: u8 = 1;
const STATE_STOPPED: u8 = 2;

/// The Extraction Service. Exclusively owns parsed events.
pub struct ExtractionService {
    store: DocumentStore,
    bus: MessageBus,
    llm: Arc<dyn LlmExtractor>,
    cache: ResponseCache,
    breaker: CircuitBreaker,
    llm_semaphore: Arc<Semaphore>,
    state: AtomicU8,
    processed: AtomicU64,
    failed: AtomicU64,
    cache_hits: AtomicU64,
}

impl ExtractionService {
    pub fn new(
        config: &Config,
        store: DocumentStore,
        bus: MessageBus,
        llm: Arc<dyn LlmExtractor>,
    ) -> Self {
        Self {
            store,
            bus,
            llm,
            cache: ResponseCache::new(256),
            breaker: CircuitBreaker::new(
                config.cb_failure_threshold,
                Duration::from_secs(config.cb_recovery_seconds),
            ),
            llm_semaphore: Arc::new(Semaphore::new(config.max_concurrent_processing)),
            state: AtomicU8::new(STATE_IDLE),
            processed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
        }
    }

    // === Lifecycle ===

    pub fn start_processor(&self) {
        self.state.store(STATE_RUNNING, Ordering::SeqCst);
        info!("Extraction processor started");
    }

    pub fn stop_processor(&self) {
        self.state.store(STATE_STOPPED, Ordering::SeqCst);
        info!("Extraction processor stopped");
    }

    pub fn processor_state(&self) -> ProcessorState {
        match self.state.load(Ordering::SeqCst) {
            STATE_RUNNING => ProcessorState::Running,
            STATE_STOPPED => ProcessorState::Stopped,
            _ => ProcessorState::Idle,
        }
    }

    /// Long-lived consumer loop. Spawned by the supervisor; honors
    /// start/stop via the state flag and shuts down on cancellation.
    pub async fn run_consumer(self: Arc<Self>, cancel: CancellationToken) {
        info!("Extraction consumer loop starting");
        loop {
            if cancel.is_cancelled() {
                break;
            }
            if self.processor_state() != ProcessorState::Running {
                tokio::time::sleep(Duration::from_millis(500)).await;
                continue;
            }
            match self.bus.articles.claim() {
                Ok(Some(delivery)) => {
                    let service = Arc::clone(&self);
                    let Ok(permit) =
                        Arc::clone(&self.llm_semaphore).acquire_owned().await
                    else {
                        break;
                    };
                    tokio::spawn(async move {
                        service.handle_delivery(delivery).await;
                        drop(permit);
                    });
                }
                Ok(None) => {
                    let _ = self.bus.articles.reclaim_expired();
                    tokio::time::sleep(Duration::from_millis(500)).await;
                }
                Err(e) => {
                    error!(error = %e, "Article claim failed");
                    tokio::time::sleep(Duration::from_secs(2)).await;
                }
            }
        }
        info!("Extraction consumer loop stopped");
    }

    /// Synchronous batch: drain up to `limit` pending article messages.
    pub async fn analyze(&self, limit: usize) -> Result<AnalyzeSummary> {
        let mut summary = AnalyzeSummary::default();
        for _ in 0..limit {
            let Some(delivery) = self.bus.articles.claim()? else {
                break;
            };
            summary.drained += 1;
            match self.process_delivery(&delivery).await {
                Ok(Some(_)) => summary.events_created += 1,
                Ok(None) => {}
                Err(e) if matches!(e, PipelineError::CircuitOpen { .. }) => {
                    summary.deferred += 1;
                }
                Err(_) => summary.failed += 1,
            }
        }
        Ok(summary)
    }

    /// Wrapper used by the background loop: routes the outcome into
    /// ack/nack and keeps the loop alive on any error.
    async fn handle_delivery(&self, delivery: Delivery) {
        if let Err(e) = self.process_delivery(&delivery).await {
            debug!(seq = delivery.seq, error = %e, "Delivery not completed");
        }
    }

    /// Process one article message end to end. Returns the created event,
    /// or None for idempotent/terminal outcomes. Acks/nacks internally.
    async fn process_delivery(&self, delivery: &Delivery) -> Result<Option<ParsedEvent>> {
        let article: Article = match serde_json::from_slice(&delivery.body) {
            Ok(article) => article,
            Err(e) => {
                // Undecodable message: poison, drop it.
                warn!(seq = delivery.seq, error = %e, "Dropping undecodable article message");
                self.bus.articles.ack(delivery)?;
                return Ok(None);
            }
        };

        // Idempotence gate: redelivered article already extracted. The
        // event is republished so a publish lost between persist and ack
        // heals on redelivery; scoring dedups on event id.
        if let Some(existing) = self.store.events.get_by_article(&article.id)? {
            debug!(article_id = %article.id, "Article already extracted, acking redelivery");
            self.bus.events.publish_json(&existing)?;
            self.bus.articles.ack(delivery)?;
            return Ok(None);
        }

        // Circuit open: nack with the recovery delay, consumer pauses.
        if !self.breaker.allow_request() {
            let retry_after_secs = self.breaker.retry_after_secs();
            self.bus.articles.nack(delivery, retry_after_secs)?;
            return Err(PipelineError::CircuitOpen { retry_after_secs });
        }

        match self.extract_event(&article).await {
            Ok(event) => {
                let inserted = self.store.events.insert_new(&event)?;
                if inserted {
                    self.bus.events.publish_json(&event)?;
                    if let Err(e) = self.store.articles.set_status(
                        &article.id,
                        ProcessingStatus::Processed,
                        None,
                    ) {
                        warn!(article_id = %article.id, error = %e, "Status flip failed");
                    }
                    self.processed.fetch_add(1, Ordering::Relaxed);
                    info!(
                        article_id = %article.id,
                        event_id = %event.id,
                        event_type = %event.event_type,
                        state = %event.state,
                        lga = %event.lga,
                        "Event extracted"
                    );
                }
                self.bus.articles.ack(delivery)?;
                Ok(if inserted { Some(event) } else { None })
            }
            Err(e @ PipelineError::ValidationFailure(_)) => {
                // Terminal: mark failed, ack, never retry.
                self.failed.fetch_add(1, Ordering::Relaxed);
                warn!(article_id = %article.id, error = %e, "Extraction validation failed");
                if let Err(flip) = self.store.articles.set_status(
                    &article.id,
                    ProcessingStatus::Failed,
                    Some(e.to_string()),
                ) {
                    warn!(article_id = %article.id, error = %flip, "Status flip failed");
                }
                self.bus.articles.ack(delivery)?;
                Err(e)
            }
            Err(e) => {
                // Transient after retries: redeliver later.
                warn!(article_id = %article.id, error = %e, "Extraction deferred for redelivery");
                self.bus.articles.nack(delivery, 5)?;
                Err(e)
            }
        }
    }

    /// Cache → LLM (with retry/backoff) → validation → ParsedEvent.
    async fn extract_event(&self, article: &Article) -> Result<ParsedEvent> {
        if let Some(cached) = self.cache.get(&article.content_hash) {
            self.cache_hits.fetch_add(1, Ordering::Relaxed);
            debug!(article_id = %article.id, "LLM cache hit");
            return validated_event_from_response(article, &cached);
        }

        let prompt = build_extraction_prompt(article);
        let response = self.call_llm_with_retry(&prompt).await?;
        let event = validated_event_from_response(article, &response)?;
        // Only schema-valid responses are worth caching.
        self.cache.put(&article.content_hash, &response);
        Ok(event)
    }

    async fn call_llm_with_retry(&self, prompt: &str) -> Result<String> {
        let mut delay = Duration::from_secs(2);
        let max_delay = Duration::from_secs(10);
        let mut last_err = None;

        for attempt in 1..=3u32 {
            match self.llm.extract(prompt).await {
                Ok(response) => {
                    self.breaker.record_success();
                    return Ok(response);
                }
                Err(e) if e.is_retriable() && attempt < 3 => {
                    warn!(attempt, error = %e, "LLM call failed, backing off");
                    tokio::time::sleep(delay).await;
                    delay = (delay * 2).min(max_delay);
                    last_err = Some(e);
                }
                Err(e) => {
                    if e.is_retriable() {
                        self.breaker.record_failure();
                    }
                    return Err(e);
                }
            }
        }
        self.breaker.record_failure();
        Err(last_err.unwrap_or_else(|| {
            PipelineError::TransientExternal("llm retries exhausted".into())
        }))
    }

    // === Introspection ===

    pub fn list_events(&self, limit: usize) -> Result<Vec<ParsedEvent>> {
        self.store.events.list(limit)
    }

    pub fn status(&self) -> serde_json::Value {
        serde_json::json!({
            "processor": self.processor_state(),
            "circuit": self.breaker.state().to_string(),
            "events_total": self.store.events.count(),
            "processed": self.processed.load(Ordering::Relaxed),
            "failed": self.failed.load(Ordering::Relaxed),
            "cache_hits": self.cache_hits.load(Ordering::Relaxed),
            "cache_entries": self.cache.len(),
            "queue_pending": self.bus.articles.pending_count(),
        })
    }

    pub fn circuit_state(&self) -> CircuitState {
        self.breaker.state()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::content_hash;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::AtomicU32;

    /// Scripted extractor: answers from a fixed response, counting calls.
    struct ScriptedLlm {
        response: String,
        calls: AtomicU32,
        fail: bool,
    }

    #[async_trait]
    impl LlmExtractor for ScriptedLlm {
        async fn extract(&self, _prompt: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(PipelineError::TransientExternal("gateway down".into()))
            } else {
                Ok(self.response.clone())
            }
        }
    }

    fn article(id: &str, title: &str) -> Article {
        Article {
            id: id.to_string(),
            url: format!("https://x/{id}"),
            title: title.to_string(),
            content: format!("body of {title}"),
            source: "wire".to_string(),
            scraped_at: Utc::now(),
            content_hash: content_hash(title, &format!("body of {title}")),
            processing_status: ProcessingStatus::Pending,
            error_log: None,
            pre_risk_score: None,
        }
    }

    fn service_with(llm: Arc<dyn LlmExtractor>) -> (Arc<ExtractionService>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();
        let store = DocumentStore::open(dir.path().join("doc")).unwrap();
        let bus = MessageBus::open(dir.path().join("bus")).unwrap();
        (
            Arc::new(ExtractionService::new(&config, store, bus, llm)),
            dir,
        )
    }

    const GOOD_RESPONSE: &str =
        r#"{"Event_Type": "attack", "State": "Lagos", "LGA": "Ikeja", "Severity": "medium"}"#;

    #[tokio::test]
    async fn test_analyze_extracts_and_publishes() {
        let llm = Arc::new(ScriptedLlm {
            response: GOOD_RESPONSE.to_string(),
            calls: AtomicU32::new(0),
            fail: false,
        });
        let (service, _dir) = service_with(llm.clone());

        let a = article("a1", "Attack in Ikeja");
        service.store.articles.insert_new(&a).unwrap();
        service.bus.articles.publish_json(&a).unwrap();

        let summary = service.analyze(10).await.unwrap();
        assert_eq!(summary.drained, 1);
        assert_eq!(summary.events_created, 1);
        assert_eq!(service.bus.events.pending_count(), 1);
        assert_eq!(
            service
                .store
                .articles
                .get("a1")
                .unwrap()
                .unwrap()
                .processing_status,
            ProcessingStatus::Processed
        );
    }

    #[tokio::test]
    async fn test_redelivery_creates_no_second_event() {
        let llm = Arc::new(ScriptedLlm {
            response: GOOD_RESPONSE.to_string(),
            calls: AtomicU32::new(0),
            fail: false,
        });
        let (service, _dir) = service_with(llm.clone());

        let a = article("a1", "Attack in Ikeja");
        service.store.articles.insert_new(&a).unwrap();
        service.bus.articles.publish_json(&a).unwrap();
        service.bus.articles.publish_json(&a).unwrap();

        let summary = service.analyze(10).await.unwrap();
        assert_eq!(summary.drained, 2);
        assert_eq!(summary.events_created, 1);
        assert_eq!(service.store.events.count(), 1);
        // The redelivered article re-publishes the existing event; the
        // scoring side dedups on event id.
        assert_eq!(service.bus.events.pending_count(), 2);
    }

    #[tokio::test]
    async fn test_validation_failure_marks_article_failed() {
        let llm = Arc::new(ScriptedLlm {
            response: "no json here at all".to_string(),
            calls: AtomicU32::new(0),
            fail: false,
        });
        let (service, _dir) = service_with(llm);

        let a = article("a1", "Unparseable");
        service.store.articles.insert_new(&a).unwrap();
        service.bus.articles.publish_json(&a).unwrap();

        let summary = service.analyze(10).await.unwrap();
        assert_eq!(summary.failed, 1);
        let stored = service.store.articles.get("a1").unwrap().unwrap();
        assert_eq!(stored.processing_status, ProcessingStatus::Failed);
        assert!(stored.error_log.is_some());
        // Terminal: nothing left to redeliver.
        assert_eq!(service.bus.articles.pending_count(), 0);
        assert_eq!(service.store.events.count(), 0);
    }

    #[tokio::test]
    async fn test_cache_avoids_second_llm_call() {
        let llm = Arc::new(ScriptedLlm {
            response: GOOD_RESPONSE.to_string(),
            calls: AtomicU32::new(0),
            fail: false,
        });
        let (service, _dir) = service_with(llm.clone());

        // Two distinct articles with identical content hash (same body).
        let a1 = article("a1", "Same story");
        let mut a2 = article("a2", "Same story");
        a2.url = "https://other/2".to_string();
        service.store.articles.insert_new(&a1).unwrap();
        service.bus.articles.publish_json(&a1).unwrap();
        service.bus.articles.publish_json(&a2).unwrap();

        service.analyze(10).await.unwrap();
        assert_eq!(llm.calls.load(Ordering::SeqCst), 1);
        assert_eq!(service.cache_hits.load(Ordering::Relaxed), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_circuit_opens_and_defers_messages() {
        let llm = Arc::new(ScriptedLlm {
            response: String::new(),
            calls: AtomicU32::new(0),
            fail: true,
        });
        let (service, _dir) = service_with(llm);

        // Threshold is 5 consecutive failures; each failing message
        // records one breaker failure after its retries exhaust.
        for i in 0..6 {
            let a = article(&format!("a{i}"), &format!("story {i}"));
            service.store.articles.insert_new(&a).unwrap();
            service.bus.articles.publish_json(&a).unwrap();
        }

        let summary = service.analyze(10).await.unwrap();
        assert_eq!(service.circuit_state(), CircuitState::Open);
        assert!(summary.deferred >= 1);
        // Deferred messages remain queued (delay-stamped).
        assert!(service.bus.articles.pending_count() >= 1);
    }
}
