//! Reference table loaders
//!
//! GeoJSON FeatureCollections (climate zones, mining sites, border zones)
//! and CSV tables (strategic indicators, economic indicators) are read from
//! the artifact directory at startup. A missing file puts the service in
//! degraded mode rather than failing startup: the affected risk modifiers
//! are skipped and /health reports the gap.
//!
//! Loaded tables are immutable; refresh swaps the whole [`ReferenceData`]
//! behind an `ArcSwap`.

use crate::error::{PipelineError, Result};
use crate::types::{
    BorderZone, ClimateZone, EconomicRecord, GeoPoint, MiningSite, StrategicIndicators,
};
use chrono::Utc;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

// ============================================================================
// GeoJSON wire shapes
// ============================================================================

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    #[serde(default)]
    properties: serde_json::Map<String, serde_json::Value>,
    geometry: Option<Geometry>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum Geometry {
    Point { coordinates: [f64; 2] },
    Polygon { coordinates: Vec<Vec<[f64; 2]>> },
    #[serde(other)]
    Unsupported,
}

fn prop_str(props: &serde_json::Map<String, serde_json::Value>, key: &str) -> String {
    props
        .get(key)
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string()
}

fn prop_f64(props: &serde_json::Map<String, serde_json::Value>, key: &str) -> f64 {
    props.get(key).and_then(serde_json::Value::as_f64).unwrap_or(0.0)
}

fn prop_bool(props: &serde_json::Map<String, serde_json::Value>, key: &str) -> bool {
    props
        .get(key)
        .and_then(serde_json::Value::as_bool)
        .unwrap_or(false)
}

// ============================================================================
// Loaded reference tables
// ============================================================================

/// Immutable bundle of every reference table, swapped wholesale on refresh.
#[derive(Debug, Default)]
pub struct ReferenceData {
    pub climate_zones: Vec<ClimateZone>,
    pub mining_sites: Vec<MiningSite>,
    pub border_zones: Vec<BorderZone>,
    /// Keyed by lowercase state name.
    pub strategic: HashMap<String, StrategicIndicators>,
    /// Artifact files that could not be loaded (degraded mode).
    pub missing: Vec<String>,
}

impl ReferenceData {
    pub fn strategic_for(&self, state: &str) -> Option<&StrategicIndicators> {
        self.strategic.get(&state.to_lowercase())
    }

    pub fn border_zone_for(&self, state: &str) -> Option<&BorderZone> {
        let state = state.to_lowercase();
        self.border_zones
            .iter()
            .find(|z| z.state.to_lowercase() == state)
    }

    pub fn is_degraded(&self) -> bool {
        !self.missing.is_empty()
    }
}

/// Loads reference tables from the artifact directory.
pub struct ReferenceLoader {
    dir: PathBuf,
}

impl ReferenceLoader {
    pub fn new(dir: &Path) -> Self {
        Self { dir: dir.to_path_buf() }
    }

    /// Load everything, tolerating missing files.
    pub fn load(&self) -> ReferenceData {
        let mut data = ReferenceData::default();

        match self.load_climate_zones() {
            Ok(zones) => data.climate_zones = zones,
            Err(e) => {
                warn!(error = %e, "Climate zones unavailable, flood modifier disabled");
                data.missing.push(super::CLIMATE_ZONES_FILE.to_string());
            }
        }
        match self.load_mining_sites() {
            Ok(sites) => data.mining_sites = sites,
            Err(e) => {
                warn!(error = %e, "Mining sites unavailable, proximity modifier disabled");
                data.missing.push(super::MINING_SITES_FILE.to_string());
            }
        }
        match self.load_border_zones() {
            Ok(zones) => data.border_zones = zones,
            Err(e) => {
                warn!(error = %e, "Border zones unavailable, Sahelian modifier disabled");
                data.missing.push(super::BORDER_ZONES_FILE.to_string());
            }
        }
        match self.load_strategic_indicators() {
            Ok(map) => data.strategic = map,
            Err(e) => {
                warn!(error = %e, "Strategic indicators unavailable, deep modifiers disabled");
                data.missing
                    .push(super::STRATEGIC_INDICATORS_FILE.to_string());
            }
        }

        info!(
            climate_zones = data.climate_zones.len(),
            mining_sites = data.mining_sites.len(),
            border_zones = data.border_zones.len(),
            strategic_states = data.strategic.len(),
            missing = data.missing.len(),
            "Reference data loaded"
        );
        data
    }

    fn read_feature_collection(&self, file: &str) -> Result<FeatureCollection> {
        let path = self.dir.join(file);
        let raw = std::fs::read(&path)
            .map_err(|e| PipelineError::Configuration(format!("{}: {e}", path.display())))?;
        serde_json::from_slice(&raw)
            .map_err(|e| PipelineError::Configuration(format!("{}: {e}", path.display())))
    }

    fn load_climate_zones(&self) -> Result<Vec<ClimateZone>> {
        let fc = self.read_feature_collection(super::CLIMATE_ZONES_FILE)?;
        let mut zones = Vec::with_capacity(fc.features.len());
        for feature in fc.features {
            let Some(Geometry::Polygon { coordinates }) = feature.geometry else {
                continue;
            };
            let Some(exterior) = coordinates.into_iter().next() else {
                continue;
            };
            zones.push(ClimateZone {
                region: prop_str(&feature.properties, "region"),
                indicator: prop_str(&feature.properties, "indicator"),
                recession_index: prop_f64(&feature.properties, "recession_index"),
                impact_zone: prop_str(&feature.properties, "impact_zone"),
                conflict_correlation: prop_f64(&feature.properties, "conflict_correlation"),
                ring: exterior
                    .into_iter()
                    .map(|[lon, lat]| GeoPoint::new(lon, lat))
                    .collect(),
            });
        }
        Ok(zones)
    }

    fn load_mining_sites(&self) -> Result<Vec<MiningSite>> {
        let fc = self.read_feature_collection(super::MINING_SITES_FILE)?;
        let mut sites = Vec::with_capacity(fc.features.len());
        for feature in fc.features {
            let Some(Geometry::Point { coordinates: [lon, lat] }) = feature.geometry else {
                continue;
            };
            sites.push(MiningSite {
                name: prop_str(&feature.properties, "name"),
                state: prop_str(&feature.properties, "state"),
                mineral_type: prop_str(&feature.properties, "mineral_type"),
                informal_taxation_rate: prop_f64(&feature.properties, "informal_taxation_rate"),
                activity_level: prop_str(&feature.properties, "activity_level"),
                security_incidents_last_30_days: prop_f64(
                    &feature.properties,
                    "security_incidents_last_30_days",
                ) as u32,
                location: GeoPoint::new(lon, lat),
            });
        }
        Ok(sites)
    }

    fn load_border_zones(&self) -> Result<Vec<BorderZone>> {
        let fc = self.read_feature_collection(super::BORDER_ZONES_FILE)?;
        Ok(fc
            .features
            .into_iter()
            .map(|feature| BorderZone {
                state: prop_str(&feature.properties, "state"),
                border_permeability_score: prop_f64(
                    &feature.properties,
                    "border_permeability_score",
                ),
                border_activity: prop_str(&feature.properties, "border_activity"),
                group_affiliation: feature
                    .properties
                    .get("group_affiliation")
                    .and_then(|v| v.as_str())
                    .map(str::to_string),
                lakurawa_presence_confirmed: prop_bool(
                    &feature.properties,
                    "lakurawa_presence_confirmed",
                ),
                sophisticated_ied_usage: prop_bool(&feature.properties, "sophisticated_ied_usage"),
            })
            .collect())
    }

    fn load_strategic_indicators(&self) -> Result<HashMap<String, StrategicIndicators>> {
        let path = self.dir.join(super::STRATEGIC_INDICATORS_FILE);
        let mut reader = csv::Reader::from_path(&path)
            .map_err(|e| PipelineError::Configuration(format!("{}: {e}", path.display())))?;
        let mut map = HashMap::new();
        for row in reader.deserialize::<StrategicIndicators>() {
            match row {
                Ok(rec) => {
                    map.insert(rec.state.to_lowercase(), rec);
                }
                Err(e) => warn!(error = %e, "Skipping malformed strategic indicator row"),
            }
        }
        Ok(map)
    }
}

// ============================================================================
// Economic CSV (initialize-economic-data)
// ============================================================================

#[derive(Debug, Deserialize)]
struct EconomicCsvRow {
    state: String,
    #[serde(default)]
    lga: Option<String>,
    inflation_rate: f64,
    fuel_price: f64,
    #[serde(default)]
    unemployment_rate: Option<f64>,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    lon: Option<f64>,
    #[serde(default)]
    lat: Option<f64>,
}

/// Parse the economic indicators CSV into records ready for the document
/// store. Empty `lga` cells mark state-level fallback rows.
pub fn load_economic_csv(path: &Path) -> Result<Vec<EconomicRecord>> {
    let mut reader = csv::Reader::from_path(path)
        .map_err(|e| PipelineError::Configuration(format!("{}: {e}", path.display())))?;
    let mut records = Vec::new();
    for row in reader.deserialize::<EconomicCsvRow>() {
        let row = match row {
            Ok(row) => row,
            Err(e) => {
                warn!(error = %e, "Skipping malformed economic row");
                continue;
            }
        };
        let location = match (row.lon, row.lat) {
            (Some(lon), Some(lat)) => Some(GeoPoint::new(lon, lat)),
            _ => None,
        };
        records.push(EconomicRecord {
            state: row.state,
            lga: row.lga.filter(|s| !s.trim().is_empty()),
            inflation_rate: row.inflation_rate,
            fuel_price: row.fuel_price,
            unemployment_rate: row.unemployment_rate,
            updated_at: Utc::now(),
            source: row.source,
            location,
        });
    }
    Ok(records)
}
