//! Scoring consumer and the synchronous simulation entry point
//!
//! Consumes `events`, joins context, runs the risk model, stitches in
//! surge detection, persists the signal with its per-location version and
//! publishes to `signals`. Per-event failures are logged and the event is
//! skipped; the pipeline keeps moving.

use crate::artifacts::{load_economic_csv, ReferenceData};
use crate::bus::{Delivery, MessageBus};
use crate::config::Config;
use crate::error::{PipelineError, Result};
use crate::scoring::context::resolve_context;
use crate::scoring::model::{score_event, SimulationParams};
use crate::scoring::simulate::{run_simulation, SimulationOutput};
use crate::scoring::surge::SurgeTracker;
use crate::store::DocumentStore;
use crate::types::{ParsedEvent, RiskSignal, SimulationContext};
use arc_swap::ArcSwap;
use chrono::Utc;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Counters returned by a `predict` batch.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PredictSummary {
    pub drained: usize,
    pub signals_created: usize,
    pub skipped: usize,
}

const STATE_IDLE: u8 = 0;
const STATE_RUNNING: u8 = 1;
const STATE_STOPPED: u8 = 2;

/// The Scoring Service. Exclusively owns risk signals and the surge map.
pub struct ScoringService {
    config: Config,
    store: DocumentStore,
    bus: MessageBus,
    reference: Arc<ArcSwap<ReferenceData>>,
    surge: SurgeTracker,
    state: AtomicU8,
    scored: AtomicU64,
    skipped: AtomicU64,
}

impl ScoringService {
    pub fn new(
        config: Config,
        store: DocumentStore,
        bus: MessageBus,
        reference: Arc<ArcSwap<ReferenceData>>,
    ) -> Self {
        let surge = SurgeTracker::new(config.surge_percentage);
        Self {
            config,
            store,
            bus,
            reference,
            surge,
            state: AtomicU8::new(STATE_IDLE),
            scored: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
        }
    }

    // === Lifecycle ===

    pub fn start_processor(&self) {
        self.state.store(STATE_RUNNING, Ordering::SeqCst);
        info!("Scoring processor started");
    }

    pub fn stop_processor(&self) {
        self.state.store(STATE_STOPPED, Ordering::SeqCst);
        info!("Scoring processor stopped");
    }

    fn is_running(&self) -> bool {
        self.state.load(Ordering::SeqCst) == STATE_RUNNING
    }

    /// Long-lived consumer loop over the `events` queue.
    pub async fn run_consumer(self: Arc<Self>, cancel: CancellationToken) {
        info!("Scoring consumer loop starting");
        loop {
            if cancel.is_cancelled() {
                break;
            }
            if !self.is_running() {
                tokio::time::sleep(Duration::from_millis(500)).await;
                continue;
            }
            match self.bus.events.claim() {
                Ok(Some(delivery)) => self.handle_delivery(&delivery),
                Ok(None) => {
                    let _ = self.bus.events.reclaim_expired();
                    tokio::time::sleep(Duration::from_millis(500)).await;
                }
                Err(e) => {
                    error!(error = %e, "Event claim failed");
                    tokio::time::sleep(Duration::from_secs(2)).await;
                }
            }
        }
        info!("Scoring consumer loop stopped");
    }

    /// Synchronous batch: drain up to `limit` pending event messages.
    pub fn predict(&self, limit: usize) -> Result<PredictSummary> {
        let mut summary = PredictSummary::default();
        for _ in 0..limit {
            let Some(delivery) = self.bus.events.claim()? else {
                break;
            };
            summary.drained += 1;
            match self.score_delivery(&delivery) {
                Ok(true) => summary.signals_created += 1,
                Ok(false) => summary.skipped += 1,
                Err(e) => {
                    summary.skipped += 1;
                    warn!(seq = delivery.seq, error = %e, "Event skipped");
                }
            }
        }
        Ok(summary)
    }

    fn handle_delivery(&self, delivery: &Delivery) {
        match self.score_delivery(delivery) {
            Ok(true) => {
                self.scored.fetch_add(1, Ordering::Relaxed);
            }
            Ok(false) => {
                self.skipped.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                self.skipped.fetch_add(1, Ordering::Relaxed);
                warn!(seq = delivery.seq, error = %e, "Event scoring failed, skipped");
            }
        }
    }

    /// Score one event message. Returns whether a new signal was created.
    /// Storage errors nack for redelivery; anything else acks.
    fn score_delivery(&self, delivery: &Delivery) -> Result<bool> {
        let event: ParsedEvent = match serde_json::from_slice(&delivery.body) {
            Ok(event) => event,
            Err(e) => {
                warn!(seq = delivery.seq, error = %e, "Dropping undecodable event message");
                self.bus.events.ack(delivery)?;
                return Ok(false);
            }
        };

        match self.score_live(&event) {
            Ok(created) => {
                self.bus.events.ack(delivery)?;
                Ok(created)
            }
            Err(e @ PipelineError::Storage(_)) => {
                self.bus.events.nack(delivery, 5)?;
                Err(e)
            }
            Err(e) => {
                // Per-event failure: log, ack, move on.
                self.bus.events.ack(delivery)?;
                Err(e)
            }
        }
    }

    /// Live-path scoring for one event: context join → model → surge →
    /// version → persist → publish. Idempotent on event id.
    pub fn score_live(&self, event: &ParsedEvent) -> Result<bool> {
        // Redelivery gate before any side effect.
        if self.store.signals.get_by_event(&event.id)?.is_some() {
            debug!(event_id = %event.id, "Event already scored, skipping redelivery");
            return Ok(false);
        }

        let reference = self.reference.load();
        let ctx = resolve_context(event, &self.store, &reference);
        let breakdown = score_event(event, &ctx, None, self.config.urban_fuel_threshold);

        let surge = self
            .surge
            .observe(&event.state, &event.lga, breakdown.risk_score);
        let mut trigger_reason = breakdown.trigger_reason.clone();
        if let Some(pct) = surge.percentage_increase {
            trigger_reason.push_str(&format!("; SURGE ALERT: +{pct:.1}% vs previous pass"));
        }

        let version = self.store.signals.next_version(&event.state, &event.lga)?;
        let signal = RiskSignal {
            id: uuid::Uuid::new_v4().to_string(),
            event_id: Some(event.id.clone()),
            state: event.state.clone(),
            lga: event.lga.clone(),
            severity: event.severity,
            event_type: event.event_type,
            risk_score: breakdown.risk_score,
            risk_level: breakdown.risk_level,
            status: breakdown.status,
            trigger_reason,
            calculated_at: Utc::now(),
            location: ctx.location,
            economic: ctx.economic,
            dimensions: breakdown.dimensions,
            strategic: breakdown.strategic,
            high_escalation_potential: breakdown.high_escalation_potential,
            is_farmer_herder_conflict: breakdown.is_farmer_herder_conflict,
            surge_detected: surge.surge_detected,
            surge_percentage_increase: surge.percentage_increase,
            simulation: SimulationContext::default(),
            version,
        };

        let inserted = self.store.signals.insert_for_event(&signal)?;
        if inserted {
            self.bus.signals.publish_json(&signal)?;
            info!(
                event_id = %event.id,
                state = %signal.state,
                lga = %signal.lga,
                risk_score = signal.risk_score,
                risk_level = %signal.risk_level,
                status = %signal.status,
                surge = signal.surge_detected,
                "Risk signal emitted"
            );
        }
        Ok(inserted)
    }

    /// Synchronous what-if pass over every persisted event.
    pub fn simulate(&self, params: SimulationParams) -> Result<SimulationOutput> {
        let events = self.store.events.all()?;
        let reference = self.reference.load();
        let (signals, output) = run_simulation(
            &events,
            &self.store,
            &reference,
            params,
            self.config.urban_fuel_threshold,
        );
        for signal in &signals {
            self.store.signals.insert_simulation(signal)?;
        }
        info!(
            events = output.metadata.total_events,
            critical = output.metadata.critical_count,
            "Simulation pass complete"
        );
        Ok(output)
    }

    /// Load economic indicators into the document store. `source` names a
    /// CSV in the artifact directory; empty selects the default file.
    pub fn initialize_economic_data(&self, source: &str) -> Result<usize> {
        let file = if source.trim().is_empty() {
            crate::artifacts::ECONOMIC_INDICATORS_FILE
        } else {
            source.trim()
        };
        let path = std::path::Path::new(&self.config.artifact_dir).join(file);
        let records = load_economic_csv(&path)?;
        let count = records.len();
        for record in &records {
            self.store.put_economic(record)?;
        }
        info!(records = count, file, "Economic data initialized");
        Ok(count)
    }

    // === Introspection ===

    pub fn list_signals(&self, state: Option<&str>, limit: usize) -> Result<Vec<RiskSignal>> {
        self.store.signals.list(state, limit)
    }

    /// Authoritative view: the highest-version live signal per location.
    pub fn latest_signals(&self, state: Option<&str>) -> Result<Vec<RiskSignal>> {
        let state_lower = state.map(str::to_lowercase);
        let mut latest = self.store.signals.latest_per_location()?;
        if let Some(state) = state_lower {
            latest.retain(|s| s.state.to_lowercase() == state);
        }
        latest.sort_by(|a, b| b.risk_score.total_cmp(&a.risk_score));
        Ok(latest)
    }

    pub fn status(&self) -> serde_json::Value {
        let reference = self.reference.load();
        serde_json::json!({
            "processor": match self.state.load(Ordering::SeqCst) {
                STATE_RUNNING => "running",
                STATE_STOPPED => "stopped",
                _ => "idle",
            },
            "signals_total": self.store.signals.count(),
            "scored": self.scored.load(Ordering::Relaxed),
            "skipped": self.skipped.load(Ordering::Relaxed),
            "queue_pending": self.bus.events.pending_count(),
            "surge_locations": self.surge.tracked_locations(),
            "economic_records": self.store.economic_count(),
            "reference_degraded": reference.is_degraded(),
            "reference_missing": reference.missing.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EventType, RiskLevel, Severity, SignalStatus, StrategicIndicators};

    fn event(id: &str, event_type: EventType, severity: Severity, state: &str, lga: &str) -> ParsedEvent {
        ParsedEvent {
            id: id.to_string(),
            article_id: format!("art-{id}"),
            event_type,
            state: state.to_string(),
            lga: lga.to_string(),
            severity,
            fatalities: 0,
            conflict_actor: None,
            parsed_at: Utc::now(),
            confidence_score: None,
            location: None,
            title: String::new(),
            summary: String::new(),
        }
    }

    fn service() -> (ScoringService, tempfile::TempDir) {
        service_with_reference(ReferenceData::default())
    }

    fn service_with_reference(reference: ReferenceData) -> (ScoringService, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            artifact_dir: dir.path().join("artifacts").display().to_string(),
            ..Config::default()
        };
        let store = DocumentStore::open(dir.path().join("doc")).unwrap();
        let bus = MessageBus::open(dir.path().join("bus")).unwrap();
        let reference = Arc::new(ArcSwap::from_pointee(reference));
        (ScoringService::new(config, store, bus, reference), dir)
    }

    #[test]
    fn test_live_scoring_persists_and_publishes() {
        let (service, _dir) = service();
        let e = event("e1", EventType::Attack, Severity::Medium, "Lagos", "Ikeja");
        service.store.events.insert_new(&e).unwrap();

        assert!(service.score_live(&e).unwrap());
        assert_eq!(service.bus.signals.pending_count(), 1);

        let signal = service.store.signals.get_by_event("e1").unwrap().unwrap();
        assert_eq!(signal.version, 1);
        assert_eq!(signal.risk_score, 50.0); // attack 40 + medium 10, no context
        assert_eq!(signal.risk_level, RiskLevel::Medium);
        assert_eq!(signal.status, SignalStatus::Normal);
        assert!(!signal.simulation.is_simulation);
    }

    #[test]
    fn test_event_redelivery_is_idempotent() {
        let (service, _dir) = service();
        let e = event("e1", EventType::Attack, Severity::Medium, "Kano", "Dala");
        assert!(service.score_live(&e).unwrap());
        assert!(!service.score_live(&e).unwrap());
        assert_eq!(service.store.signals.count(), 1);
        assert_eq!(service.bus.signals.pending_count(), 1);
    }

    #[test]
    fn test_surge_fires_on_second_pass() {
        let mut reference = ReferenceData::default();
        reference.strategic.insert(
            "kaduna".to_string(),
            StrategicIndicators {
                state: "Kaduna".to_string(),
                poverty_rate: 0.5,
                inflation_rate: 0.5,
                unemployment: 0.5,
                mining_density: 0.3,
                climate_vulnerability: 0.3,
                migration_pressure: 0.3,
            },
        );
        let (service, _dir) = service_with_reference(reference);

        // First pass: protest/low = 13 baseline for Zaria.
        let e1 = event("e1", EventType::Protest, Severity::Low, "Kaduna", "Zaria");
        service.score_live(&e1).unwrap();

        // Second pass: attack/medium = 50, a 284% jump.
        let e2 = event("e2", EventType::Attack, Severity::Medium, "Kaduna", "Zaria");
        service.score_live(&e2).unwrap();

        let signal = service.store.signals.get_by_event("e2").unwrap().unwrap();
        assert!(signal.surge_detected);
        assert!(signal.surge_percentage_increase.unwrap() > 20.0);
        assert!(signal.trigger_reason.contains("SURGE ALERT"));
        assert_eq!(signal.version, 2);
    }

    #[test]
    fn test_predict_drains_queue() {
        let (service, _dir) = service();
        for i in 0..3 {
            let e = event(
                &format!("e{i}"),
                EventType::Banditry,
                Severity::High,
                "Zamfara",
                "Anka",
            );
            service.bus.events.publish_json(&e).unwrap();
        }

        let summary = service.predict(10).unwrap();
        assert_eq!(summary.drained, 3);
        assert_eq!(summary.signals_created, 3);
        assert_eq!(service.bus.events.pending_count(), 0);
        assert_eq!(service.store.signals.count(), 3);
    }

    #[test]
    fn test_simulation_does_not_disturb_surge_state() {
        let (service, _dir) = service();
        let e = event("e1", EventType::Attack, Severity::Medium, "Kano", "Dala");
        service.store.events.insert_new(&e).unwrap();

        service
            .simulate(SimulationParams {
                fuel_price_index: 90.0,
                inflation_rate: 60.0,
                chatter_intensity: 50.0,
            })
            .unwrap();
        assert_eq!(service.surge.tracked_locations(), 0);

        // Live pass right after: still a first observation, no surge.
        service.score_live(&e).unwrap();
        let signal = service.store.signals.get_by_event("e1").unwrap().unwrap();
        assert!(!signal.surge_detected);
    }

    #[test]
    fn test_simulation_signals_are_persisted_flagged() {
        let (service, _dir) = service();
        let e = event("e1", EventType::Attack, Severity::High, "Borno", "Jere");
        service.store.events.insert_new(&e).unwrap();

        let output = service
            .simulate(SimulationParams {
                fuel_price_index: 85.0,
                inflation_rate: 45.0,
                chatter_intensity: 70.0,
            })
            .unwrap();
        assert_eq!(output.metadata.total_events, 1);

        let all = service.store.signals.list(None, 10).unwrap();
        assert_eq!(all.len(), 1);
        assert!(all[0].simulation.is_simulation);
        assert!(all[0].simulation.simulation_id.is_some());
        // Simulation signals never win the live latest-per-location view.
        assert!(service.store.signals.latest_per_location().unwrap().is_empty());
    }

    #[test]
    fn test_initialize_economic_data_from_csv() {
        let (service, dir) = service();
        let artifacts = dir.path().join("artifacts");
        std::fs::create_dir_all(&artifacts).unwrap();
        std::fs::write(
            artifacts.join(crate::artifacts::ECONOMIC_INDICATORS_FILE),
            "state,lga,inflation_rate,fuel_price,unemployment_rate,source,lon,lat\n\
             Lagos,Ikeja,22.5,650,,NBS,,\n\
             Benue,,24.0,710,,NBS,,\n",
        )
        .unwrap();

        let count = service.initialize_economic_data("").unwrap();
        assert_eq!(count, 2);
        assert_eq!(service.store.economic_count(), 2);

        // The loaded data now feeds live scoring.
        let e = event("e1", EventType::Attack, Severity::Medium, "Lagos", "Ikeja");
        service.score_live(&e).unwrap();
        let signal = service.store.signals.get_by_event("e1").unwrap().unwrap();
        assert_eq!(signal.economic.unwrap().fuel_price, 650.0);
        // attack 40 + medium 10 + inflation (22.5-20)*2 = 55.
        assert_eq!(signal.risk_score, 55.0);
    }

    #[test]
    fn test_missing_reference_data_skips_modifiers() {
        let (service, _dir) = service();
        let e = event("e1", EventType::Clash, Severity::Critical, "Benue", "Guma");
        assert!(service.score_live(&e).unwrap());
        let signal = service.store.signals.get_by_event("e1").unwrap().unwrap();
        // clash 38 + critical 30, nothing else fires.
        assert_eq!(signal.risk_score, 68.0);
        assert!(!signal.is_farmer_herder_conflict);
    }
}
