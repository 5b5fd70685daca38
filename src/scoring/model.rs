//! The risk model
//!
//! A scoring pass is a pure function of the event, its joined context and
//! the optional simulation parameters. Stages, in order:
//!
//! 1. base points (event type + severity)
//! 2. economic modifiers (inflation bonus, fuel stress)
//! 3. multidimensional multipliers (flood, mining proximity, Sahel border)
//! 4. strategic deep indicators (climate vulnerability, mining density,
//!    farmer-herder dynamics)
//! 5. Economic Igniter (simulation only, urban LGAs)
//! 6. clamp to [0, 100]
//! 7. level and status derivation
//! 8. social trigger (simulation only)
//!
//! Surge detection (stage 9) lives in [`crate::scoring::surge`] because it
//! is stateful; the service stitches its note into the trigger reason.
//!
//! The per-type point values below are the one authoritative table; tests
//! pin the boundary behavior so the numbers cannot drift silently.

use crate::types::{
    BorderZone, ClimateZone, DimensionContext, EconomicSnapshot, EventType, GeoPoint, MiningSite,
    ParsedEvent, RiskLevel, Severity, SignalStatus, StrategicContext, StrategicIndicators,
};
use serde::{Deserialize, Serialize};

// ============================================================================
// Score table
// ============================================================================

/// Base points per event type. The baseline risk of any report is folded
/// into these values; "other" carries the floor.
pub fn event_type_points(event_type: EventType) -> f64 {
    match event_type {
        EventType::Attack => 40.0,
        EventType::Clash => 38.0,
        EventType::Conflict => 36.0,
        EventType::Violence => 35.0,
        EventType::Terrorism => 35.0,
        EventType::Banditry => 32.0,
        EventType::Kidnapping => 28.0,
        EventType::Communal => 25.0,
        EventType::Protest => 10.0,
        EventType::Other => 3.0,
    }
}

/// Severity bonus added on top of the event-type points.
pub fn severity_bonus(severity: Severity) -> f64 {
    match severity {
        Severity::Low => 3.0,
        Severity::Medium => 10.0,
        Severity::High => 20.0,
        Severity::Critical => 30.0,
    }
}

/// Inflation above this rate contributes a capped bonus.
const INFLATION_FLOOR: f64 = 20.0;
const INFLATION_BONUS_CAP: f64 = 20.0;
/// Naira-per-litre fuel price above which the live path adds stress points.
const FUEL_PRICE_BASELINE: f64 = 700.0;
const FUEL_STRESS_BONUS: f64 = 10.0;
/// Flood multiplier gate and factor.
const FLOOD_INDEX_GATE: f64 = 20.0;
const FLOOD_MULTIPLIER: f64 = 1.5;
/// Mining proximity gate (km) and bonus.
const MINING_PROXIMITY_KM: f64 = 10.0;
const MINING_PROXIMITY_BONUS: f64 = 15.0;
/// Sahelian border bonus for confirmed-corridor states.
const BORDER_BONUS: f64 = 20.0;
const BORDER_STATES: &[&str] = &["sokoto", "kebbi"];
/// Strategic indicator gates.
const CLIMATE_VULNERABILITY_GATE: f64 = 0.7;
const CLIMATE_VULNERABILITY_WEIGHT: f64 = 15.0;
const MINING_DENSITY_GATE: f64 = 0.6;
const MINING_DENSITY_WEIGHT: f64 = 20.0;
const MIGRATION_PRESSURE_GATE: f64 = 0.5;
/// Economic Igniter factor (simulation only).
const IGNITER_MULTIPLIER: f64 = 1.5;

/// Keywords marking farmer-herder conflict dynamics.
const FARMER_HERDER_KEYWORDS: &[&str] = &[
    "farmer",
    "herder",
    "herdsmen",
    "fulani",
    "pastoralist",
    "cattle",
    "grazing",
    "farmland",
    "livestock",
];

// ============================================================================
// Inputs and output
// ============================================================================

/// What-if parameters for a simulation pass, each clamped to [0, 100].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SimulationParams {
    pub fuel_price_index: f64,
    pub inflation_rate: f64,
    pub chatter_intensity: f64,
}

impl SimulationParams {
    pub fn clamped(self) -> Self {
        Self {
            fuel_price_index: self.fuel_price_index.clamp(0.0, 100.0),
            inflation_rate: self.inflation_rate.clamp(0.0, 100.0),
            chatter_intensity: self.chatter_intensity.clamp(0.0, 100.0),
        }
    }
}

/// Joined context for one scoring call. Every field is optional: missing
/// reference data skips the corresponding modifier, never aborts.
#[derive(Debug, Default)]
pub struct ScoringContext<'a> {
    pub economic: Option<EconomicSnapshot>,
    pub climate_zone: Option<&'a ClimateZone>,
    pub nearest_mine: Option<(&'a MiningSite, f64)>,
    pub border_zone: Option<&'a BorderZone>,
    pub strategic: Option<&'a StrategicIndicators>,
    /// Event coordinates (from extraction or simulation synthesis).
    pub location: Option<GeoPoint>,
    pub is_urban: bool,
}

/// Everything the model concluded about one event.
#[derive(Debug, Clone)]
pub struct ScoreBreakdown {
    pub risk_score: f64,
    pub risk_level: RiskLevel,
    pub status: SignalStatus,
    pub trigger_reason: String,
    pub dimensions: DimensionContext,
    pub strategic: StrategicContext,
    pub high_escalation_potential: bool,
    pub is_farmer_herder_conflict: bool,
    /// Set when the flood multiplier fired.
    pub conflict_driver: Option<String>,
    /// Social trigger outputs (simulation only).
    pub heatmap_weight: Option<f64>,
    pub heatmap_radius_km: Option<f64>,
    pub is_urban: bool,
}

// ============================================================================
// The scoring pass
// ============================================================================

/// Score one event against its context. Pure: no clocks, no stores.
pub fn score_event(
    event: &ParsedEvent,
    ctx: &ScoringContext<'_>,
    simulation: Option<SimulationParams>,
    urban_fuel_threshold: f64,
) -> ScoreBreakdown {
    let simulation = simulation.map(SimulationParams::clamped);
    let mut reasons: Vec<String> = Vec::new();
    let mut dimensions = DimensionContext::default();
    let mut strategic_ctx = StrategicContext::default();
    let mut high_escalation = false;
    let mut farmer_herder = false;
    let mut conflict_driver = None;

    // Stage 1: base points.
    let mut score = event_type_points(event.event_type) + severity_bonus(event.severity);
    reasons.push(format!(
        "{} event, {} severity",
        event.event_type, event.severity
    ));

    // Stage 2: economic modifiers.
    let inflation = simulation
        .map(|s| s.inflation_rate)
        .or_else(|| ctx.economic.map(|e| e.inflation));
    if let Some(inflation) = inflation {
        if inflation > INFLATION_FLOOR {
            let bonus = ((inflation - INFLATION_FLOOR) * 2.0).min(INFLATION_BONUS_CAP);
            score += bonus;
            reasons.push(format!("Elevated inflation {inflation:.1}% (+{bonus:.0})"));
        }
    }
    match simulation {
        Some(sim) => {
            let bonus = (sim.fuel_price_index / 100.0) * 20.0;
            if bonus > 0.0 {
                score += bonus;
                reasons.push(format!(
                    "Fuel stress index {:.0} (+{bonus:.1})",
                    sim.fuel_price_index
                ));
            }
        }
        None => {
            if let Some(economic) = ctx.economic {
                if economic.fuel_price > FUEL_PRICE_BASELINE {
                    score += FUEL_STRESS_BONUS;
                    reasons.push(format!(
                        "Fuel price {:.0} above baseline (+{FUEL_STRESS_BONUS:.0})",
                        economic.fuel_price
                    ));
                }
            }
        }
    }

    // Stage 3: multidimensional multipliers.
    if let Some(zone) = ctx.climate_zone {
        dimensions.flood_inundation_index = Some(zone.recession_index);
        let flood_sensitive = matches!(
            event.event_type,
            EventType::Clash | EventType::Conflict | EventType::Violence
        );
        if zone.recession_index > FLOOD_INDEX_GATE && flood_sensitive {
            score *= FLOOD_MULTIPLIER;
            conflict_driver = Some("Environmental/Climate".to_string());
            reasons.push(format!(
                "Flood-displacement pressure in {} (x{FLOOD_MULTIPLIER})",
                zone.region
            ));
        }
    }

    if let Some((site, distance_km)) = ctx.nearest_mine {
        dimensions.mining_proximity_km = Some(distance_km);
        if distance_km < MINING_PROXIMITY_KM {
            dimensions.high_funding_potential = true;
            dimensions.mining_site_name = Some(site.name.clone());
            dimensions.informal_taxation_rate = Some(site.informal_taxation_rate);
            score += MINING_PROXIMITY_BONUS;
            reasons.push(format!(
                "High Funding Potential: {:.1}km from {} (+{MINING_PROXIMITY_BONUS:.0})",
                distance_km, site.name
            ));
        }
    }

    if let Some(zone) = ctx.border_zone {
        dimensions.border_activity = Some(zone.border_activity.clone());
        dimensions.border_permeability_score = Some(zone.border_permeability_score);
        dimensions.group_affiliation = zone.group_affiliation.clone();
        dimensions.sophisticated_ied_usage = zone.sophisticated_ied_usage;
        let activity_hot = matches!(zone.border_activity.as_str(), "High" | "Critical");
        let corridor_state = BORDER_STATES.contains(&event.state.to_lowercase().as_str());
        if activity_hot && corridor_state {
            dimensions.lakurawa_presence = true;
            score += BORDER_BONUS;
            reasons.push(format!(
                "Lakurawa Presence: {} border activity (+{BORDER_BONUS:.0})",
                zone.border_activity
            ));
        }
    }

    // Stage 4: strategic deep indicators.
    if let Some(indicators) = ctx.strategic {
        strategic_ctx = StrategicContext {
            climate_vulnerability: Some(indicators.climate_vulnerability),
            mining_density: Some(indicators.mining_density),
            migration_pressure: Some(indicators.migration_pressure),
            poverty_rate: Some(indicators.poverty_rate),
        };

        if indicators.climate_vulnerability > CLIMATE_VULNERABILITY_GATE {
            let bonus = indicators.climate_vulnerability * CLIMATE_VULNERABILITY_WEIGHT;
            score += bonus;
            reasons.push(format!(
                "Severe climate vulnerability {:.2} (+{bonus:.1})",
                indicators.climate_vulnerability
            ));
        }

        if indicators.mining_density > MINING_DENSITY_GATE {
            let bonus = indicators.mining_density * MINING_DENSITY_WEIGHT;
            score += bonus;
            high_escalation = true;
            reasons.push(format!(
                "Dense mining economy {:.2} (+{bonus:.1})",
                indicators.mining_density
            ));
        }

        if matches_farmer_herder(event) && indicators.migration_pressure > MIGRATION_PRESSURE_GATE {
            farmer_herder = true;
            let factor = 1.0 + indicators.migration_pressure;
            score *= factor;
            reasons.push(format!(
                "Farmer-Herder conflict under migration pressure (x{factor:.2})"
            ));
        }
    }

    // Stage 5: Economic Igniter (simulation only, strictly above threshold).
    if let Some(sim) = simulation {
        if sim.fuel_price_index > urban_fuel_threshold && ctx.is_urban {
            score *= IGNITER_MULTIPLIER;
            reasons.push(format!(
                "Economic Igniter: urban fuel shock (x{IGNITER_MULTIPLIER})"
            ));
        }
    }

    // Stage 6: normalize.
    let risk_score = score.clamp(0.0, 100.0);

    // Stage 7: level and status.
    let risk_level = RiskLevel::from_score(risk_score);
    let status = SignalStatus::from_score(risk_score);

    // Stage 8: social trigger (simulation only).
    let (heatmap_weight, heatmap_radius_km) = match simulation {
        Some(sim) => {
            let radius = 5.0 + (sim.chatter_intensity / 100.0) * 45.0;
            let weight =
                ((risk_score / 100.0) * (1.0 + sim.chatter_intensity / 100.0)).min(1.0);
            (Some(weight), Some(radius))
        }
        None => (None, None),
    };

    let mut trigger_reason = reasons.join("; ");
    if high_escalation {
        trigger_reason = format!("[HIGH ESCALATION POTENTIAL] {trigger_reason}");
    }

    ScoreBreakdown {
        risk_score,
        risk_level,
        status,
        trigger_reason,
        dimensions,
        strategic: strategic_ctx,
        high_escalation_potential: high_escalation,
        is_farmer_herder_conflict: farmer_herder,
        conflict_driver,
        heatmap_weight,
        heatmap_radius_km,
        is_urban: ctx.is_urban,
    }
}

/// Keyword match over title, summary, event type and actor.
fn matches_farmer_herder(event: &ParsedEvent) -> bool {
    let haystack = format!(
        "{} {} {} {}",
        event.title,
        event.summary,
        event.event_type,
        event.conflict_actor.as_deref().unwrap_or_default()
    )
    .to_lowercase();
    FARMER_HERDER_KEYWORDS
        .iter()
        .any(|kw| haystack.contains(kw))
}
