//! Simulation pass
//!
//! Scores every persisted event under what-if economic parameters and
//! renders the result as a GeoJSON FeatureCollection for the map layer.
//! The pass is a pure function of (params, persisted events, reference
//! tables): identical inputs produce identical features modulo the
//! timestamp, so signal and simulation ids are derived deterministically
//! from the parameters rather than drawn at random.

use crate::artifacts::ReferenceData;
use crate::scoring::context::resolve_context;
use crate::scoring::model::{score_event, SimulationParams};
use crate::store::DocumentStore;
use crate::types::{GeoPoint, ParsedEvent, RiskLevel, RiskSignal, SimulationContext};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;

// ============================================================================
// State centroids (fallback geometry)
// ============================================================================

/// Approximate state centroids used when an event carries no coordinates.
/// Lon/lat order.
const STATE_CENTROIDS: &[(&str, f64, f64)] = &[
    ("abia", 7.49, 5.45),
    ("adamawa", 12.40, 9.33),
    ("akwa ibom", 7.85, 4.93),
    ("anambra", 6.93, 6.22),
    ("bauchi", 9.99, 10.78),
    ("bayelsa", 6.08, 4.77),
    ("benue", 8.73, 7.34),
    ("borno", 13.15, 11.88),
    ("cross river", 8.60, 5.87),
    ("delta", 5.68, 5.70),
    ("ebonyi", 8.01, 6.25),
    ("edo", 5.89, 6.34),
    ("ekiti", 5.31, 7.72),
    ("enugu", 7.38, 6.54),
    ("fct", 7.49, 9.06),
    ("gombe", 11.17, 10.36),
    ("imo", 7.03, 5.57),
    ("jigawa", 9.56, 12.23),
    ("kaduna", 7.71, 10.33),
    ("kano", 8.52, 11.89),
    ("katsina", 7.62, 12.38),
    ("kebbi", 4.20, 11.67),
    ("kogi", 6.74, 7.73),
    ("kwara", 4.55, 8.97),
    ("lagos", 3.36, 6.53),
    ("nasarawa", 8.54, 8.54),
    ("niger", 5.47, 9.93),
    ("ogun", 3.35, 6.98),
    ("ondo", 4.83, 7.10),
    ("osun", 4.54, 7.56),
    ("oyo", 3.93, 8.16),
    ("plateau", 9.52, 9.22),
    ("rivers", 6.92, 4.84),
    ("sokoto", 5.24, 13.05),
    ("taraba", 10.77, 7.99),
    ("yobe", 11.74, 12.29),
    ("zamfara", 6.22, 12.12),
];

/// Centroid lookup by state name, case-insensitive.
pub fn state_centroid(state: &str) -> Option<GeoPoint> {
    let needle = state.trim().to_lowercase();
    STATE_CENTROIDS
        .iter()
        .find(|(name, _, _)| *name == needle)
        .map(|(_, lon, lat)| GeoPoint::new(*lon, *lat))
}

// ============================================================================
// Output shapes
// ============================================================================

/// Simulation output: a GeoJSON FeatureCollection plus counters and the
/// echoed parameters.
#[derive(Debug, Serialize)]
pub struct SimulationOutput {
    #[serde(rename = "type")]
    pub collection_type: &'static str,
    pub features: Vec<serde_json::Value>,
    pub metadata: SimulationMetadata,
    pub simulation_params: SimulationParams,
}

#[derive(Debug, Serialize)]
pub struct SimulationMetadata {
    pub total_events: usize,
    pub critical_count: usize,
    pub high_count: usize,
    pub medium_count: usize,
    pub low_count: usize,
    pub timestamp: DateTime<Utc>,
    pub simulation_active: bool,
}

/// Deterministic id for one simulation pass.
fn simulation_id(params: SimulationParams) -> String {
    format!(
        "sim-f{:03.0}-i{:03.0}-c{:03.0}",
        params.fuel_price_index, params.inflation_rate, params.chatter_intensity
    )
}

// ============================================================================
// The pass
// ============================================================================

/// Run a simulation over the given events. Returns the signals (for
/// persistence) and the rendered FeatureCollection.
pub fn run_simulation(
    events: &[ParsedEvent],
    store: &DocumentStore,
    reference: &ReferenceData,
    params: SimulationParams,
    urban_fuel_threshold: f64,
) -> (Vec<RiskSignal>, SimulationOutput) {
    let params = params.clamped();
    let sim_id = simulation_id(params);
    let calculated_at = Utc::now();

    let mut signals = Vec::with_capacity(events.len());
    let mut features = Vec::with_capacity(events.len());
    let (mut critical, mut high, mut medium, mut low) = (0usize, 0usize, 0usize, 0usize);

    for event in events {
        let ctx = resolve_context(event, store, reference);
        let breakdown = score_event(event, &ctx, Some(params), urban_fuel_threshold);

        match breakdown.risk_level {
            RiskLevel::Critical => critical += 1,
            RiskLevel::High => high += 1,
            RiskLevel::Medium => medium += 1,
            RiskLevel::Low => low += 1,
            RiskLevel::Minimal => {}
        }

        let location = event.location.or_else(|| state_centroid(&event.state));
        let geometry = location.map(|p| json!({"type": "Point", "coordinates": [p.lon, p.lat]}));

        features.push(json!({
            "type": "Feature",
            "geometry": geometry,
            "properties": {
                "event_id": event.id,
                "state": event.state,
                "lga": event.lga,
                "event_type": event.event_type,
                "severity": event.severity,
                "risk_score": breakdown.risk_score,
                "risk_level": breakdown.risk_level,
                "status": breakdown.status,
                "trigger_reason": breakdown.trigger_reason,
                "heatmap_weight": breakdown.heatmap_weight,
                "heatmap_radius_km": breakdown.heatmap_radius_km,
                "is_urban": breakdown.is_urban,
            },
        }));

        signals.push(RiskSignal {
            id: format!("{sim_id}-{}", event.id),
            event_id: Some(event.id.clone()),
            state: event.state.clone(),
            lga: event.lga.clone(),
            severity: event.severity,
            event_type: event.event_type,
            risk_score: breakdown.risk_score,
            risk_level: breakdown.risk_level,
            status: breakdown.status,
            trigger_reason: breakdown.trigger_reason,
            calculated_at,
            location,
            economic: ctx.economic,
            dimensions: breakdown.dimensions,
            strategic: breakdown.strategic,
            high_escalation_potential: breakdown.high_escalation_potential,
            is_farmer_herder_conflict: breakdown.is_farmer_herder_conflict,
            surge_detected: false,
            surge_percentage_increase: None,
            simulation: SimulationContext {
                is_simulation: true,
                simulation_id: Some(sim_id.clone()),
                heatmap_weight: breakdown.heatmap_weight,
                heatmap_radius_km: breakdown.heatmap_radius_km,
                is_urban: breakdown.is_urban,
            },
            version: 0,
        });
    }

    let output = SimulationOutput {
        collection_type: "FeatureCollection",
        features,
        metadata: SimulationMetadata {
            total_events: events.len(),
            critical_count: critical,
            high_count: high,
            medium_count: medium,
            low_count: low,
            timestamp: calculated_at,
            simulation_active: true,
        },
        simulation_params: params,
    };

    (signals, output)
}
