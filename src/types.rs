//! Shared data structures for the conflict-monitoring pipeline
//!
//! This module defines the core types flowing between the three services:
//! - Ingestion: Article (scraped news, dedup gate)
//! - Extraction: ParsedEvent (LLM-extracted structured event)
//! - Scoring: RiskSignal (multi-factor risk assessment)
//!
//! Reference entities (EconomicRecord, StrategicIndicators, ClimateZone,
//! MiningSite, BorderZone) are loaded once at startup and read-only after.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

// ============================================================================
// Geography
// ============================================================================

/// A WGS84 point. Longitude first, matching GeoJSON coordinate order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lon: f64,
    pub lat: f64,
}

impl GeoPoint {
    pub const fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }
}

// ============================================================================
// Articles (Ingestion Service)
// ============================================================================

/// Lifecycle status of a scraped article as it moves through extraction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStatus {
    #[default]
    Pending,
    Processed,
    Failed,
}

impl std::fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessingStatus::Pending => write!(f, "pending"),
            ProcessingStatus::Processed => write!(f, "processed"),
            ProcessingStatus::Failed => write!(f, "failed"),
        }
    }
}

/// A normalized news article persisted by the Ingestion Service.
///
/// `url` is unique in the document store; `content_hash` is additionally
/// unique within a 24h rolling window so syndicated copies under different
/// URLs are dropped as duplicates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub id: String,
    pub url: String,
    pub title: String,
    pub content: String,
    pub source: String,
    pub scraped_at: DateTime<Utc>,
    pub content_hash: String,
    #[serde(default)]
    pub processing_status: ProcessingStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_log: Option<String>,
    /// Optional score attached by the fetcher itself. The core never
    /// derives this; it only gates high-risk alerting on it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_risk_score: Option<f64>,
}

/// Stable SHA-256 over title + content, hex-encoded.
pub fn content_hash(title: &str, content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(title.as_bytes());
    hasher.update(content.as_bytes());
    hex_encode(&hasher.finalize())
}

fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{b:02x}");
    }
    out
}

// ============================================================================
// Parsed Events (Extraction Service)
// ============================================================================

/// Conflict event category extracted from an article.
///
/// Unknown values from the LLM are coerced to `Other` at the validation
/// boundary; they never propagate as free-form strings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Attack,
    Protest,
    Clash,
    Kidnapping,
    Banditry,
    Terrorism,
    Communal,
    Violence,
    Conflict,
    Other,
}

impl EventType {
    /// Parse a (possibly messy) LLM-supplied value. Case-insensitive,
    /// unknown inputs map to `Other`.
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "attack" => EventType::Attack,
            "protest" => EventType::Protest,
            "clash" => EventType::Clash,
            "kidnapping" => EventType::Kidnapping,
            "banditry" => EventType::Banditry,
            "terrorism" => EventType::Terrorism,
            "communal" => EventType::Communal,
            "violence" => EventType::Violence,
            "conflict" => EventType::Conflict,
            _ => EventType::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Attack => "attack",
            EventType::Protest => "protest",
            EventType::Clash => "clash",
            EventType::Kidnapping => "kidnapping",
            EventType::Banditry => "banditry",
            EventType::Terrorism => "terrorism",
            EventType::Communal => "communal",
            EventType::Violence => "violence",
            EventType::Conflict => "conflict",
            EventType::Other => "other",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Severity assessed by the extraction model.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Lenient parse for LLM output; unknown values fall back to `Medium`.
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "low" => Severity::Low,
            "medium" | "moderate" => Severity::Medium,
            "high" => Severity::High,
            "critical" | "severe" => Severity::Critical,
            _ => Severity::Medium,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Structured conflict event produced by the Extraction Service. Immutable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedEvent {
    pub id: String,
    pub article_id: String,
    pub event_type: EventType,
    pub state: String,
    pub lga: String,
    pub severity: Severity,
    #[serde(default)]
    pub fatalities: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conflict_actor: Option<String>,
    pub parsed_at: DateTime<Utc>,
    /// Extraction confidence in [0,100], when the model reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoPoint>,
    /// Source article title carried for keyword analysis downstream.
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub summary: String,
}

// ============================================================================
// Risk Signals (Scoring Service)
// ============================================================================

/// Discrete risk band derived from the numeric score.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum RiskLevel {
    Minimal,
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Threshold derivation: >=80 Critical, >=60 High, >=40 Medium,
    /// >=20 Low, else Minimal.
    pub fn from_score(score: f64) -> Self {
        if score >= 80.0 {
            RiskLevel::Critical
        } else if score >= 60.0 {
            RiskLevel::High
        } else if score >= 40.0 {
            RiskLevel::Medium
        } else if score >= 20.0 {
            RiskLevel::Low
        } else {
            RiskLevel::Minimal
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Minimal => "Minimal",
            RiskLevel::Low => "Low",
            RiskLevel::Medium => "Medium",
            RiskLevel::High => "High",
            RiskLevel::Critical => "Critical",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Binary alert status. CRITICAL iff risk_score >= 80.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalStatus {
    Normal,
    Critical,
}

impl SignalStatus {
    pub fn from_score(score: f64) -> Self {
        if score >= 80.0 {
            SignalStatus::Critical
        } else {
            SignalStatus::Normal
        }
    }
}

impl std::fmt::Display for SignalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignalStatus::Normal => write!(f, "NORMAL"),
            SignalStatus::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// Economic context captured on a signal at scoring time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct EconomicSnapshot {
    pub fuel_price: f64,
    pub inflation: f64,
}

/// Multidimensional context captured on a signal (climate, mining, border).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DimensionContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flood_inundation_index: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precipitation_anomaly: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vegetation_health_index: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mining_proximity_km: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mining_site_name: Option<String>,
    #[serde(default)]
    pub high_funding_potential: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub informal_taxation_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub border_activity: Option<String>,
    #[serde(default)]
    pub lakurawa_presence: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub border_permeability_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_affiliation: Option<String>,
    #[serde(default)]
    pub sophisticated_ied_usage: bool,
}

/// State-level strategic context captured on a signal.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct StrategicContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub climate_vulnerability: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mining_density: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub migration_pressure: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poverty_rate: Option<f64>,
}

/// Simulation-only fields carried on a signal for downstream rendering.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SimulationContext {
    #[serde(default)]
    pub is_simulation: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub simulation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heatmap_weight: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heatmap_radius_km: Option<f64>,
    #[serde(default)]
    pub is_urban: bool,
}

/// A fully-scored risk signal. Produced per event (or per simulation pass),
/// never mutated in place; `version` is monotonic per (state, lga).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskSignal {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    pub state: String,
    pub lga: String,
    pub severity: Severity,
    pub event_type: EventType,
    pub risk_score: f64,
    pub risk_level: RiskLevel,
    pub status: SignalStatus,
    pub trigger_reason: String,
    pub calculated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoPoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub economic: Option<EconomicSnapshot>,
    #[serde(default)]
    pub dimensions: DimensionContext,
    #[serde(default)]
    pub strategic: StrategicContext,
    #[serde(default)]
    pub high_escalation_potential: bool,
    #[serde(default)]
    pub is_farmer_herder_conflict: bool,
    #[serde(default)]
    pub surge_detected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub surge_percentage_increase: Option<f64>,
    #[serde(default)]
    pub simulation: SimulationContext,
    pub version: u64,
}

// ============================================================================
// Reference Data (read-only after load)
// ============================================================================

/// Per-location economic record. Unique on (state, lga); an absent lga
/// marks the state-level fallback row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EconomicRecord {
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lga: Option<String>,
    pub inflation_rate: f64,
    pub fuel_price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unemployment_rate: Option<f64>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoPoint>,
}

/// State-level deep indicators, all normalized to [0,1].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategicIndicators {
    pub state: String,
    pub poverty_rate: f64,
    pub inflation_rate: f64,
    pub unemployment: f64,
    pub mining_density: f64,
    pub climate_vulnerability: f64,
    pub migration_pressure: f64,
}

/// A flood/climate polygon with domain attributes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClimateZone {
    pub region: String,
    #[serde(default)]
    pub indicator: String,
    /// Flood inundation index in percent.
    pub recession_index: f64,
    #[serde(default)]
    pub impact_zone: String,
    #[serde(default)]
    pub conflict_correlation: f64,
    /// Polygon exterior ring, lon/lat pairs.
    pub ring: Vec<GeoPoint>,
}

/// A known mining site (point geometry).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MiningSite {
    pub name: String,
    pub state: String,
    pub mineral_type: String,
    #[serde(default)]
    pub informal_taxation_rate: f64,
    #[serde(default)]
    pub activity_level: String,
    #[serde(default)]
    pub security_incidents_last_30_days: u32,
    pub location: GeoPoint,
}

/// A Sahelian border zone with armed-group indicators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BorderZone {
    pub state: String,
    pub border_permeability_score: f64,
    /// "Low" | "Moderate" | "High" | "Critical"
    pub border_activity: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_affiliation: Option<String>,
    #[serde(default)]
    pub lakurawa_presence_confirmed: bool,
    #[serde(default)]
    pub sophisticated_ied_usage: bool,
}

// ============================================================================
// Automation artifacts (Ingestion Service)
// ============================================================================

/// Per-run bookkeeping appended to automation_logs.json (last 100 kept).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationLog {
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub status: String,
    pub details: AutomationDetails,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AutomationDetails {
    pub articles_count: usize,
    pub high_risk_count: usize,
    pub duration_seconds: f64,
    pub db_success: bool,
    pub mq_success: bool,
}

/// Grouped high-risk articles appended to high_risk_alerts.json (last 20 kept).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HighRiskAlert {
    pub timestamp: DateTime<Utc>,
    pub alert_type: String,
    pub count: usize,
    pub articles: Vec<HighRiskArticle>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HighRiskArticle {
    pub title: String,
    pub source: String,
    pub risk_score: f64,
}

// ============================================================================
// Tests
// ============================================================================
