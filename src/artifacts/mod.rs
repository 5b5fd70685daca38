//! Artifact store
//!
//! Shared file area holding the automation log, high-risk alert feed and
//! the reference tables (climate zones, mining sites, border zones,
//! economic and strategic indicators). The two JSON feeds are single-writer
//! (ingestion owns them) and bounded; reference tables are immutable after
//! load and swapped wholesale on out-of-band refresh.

mod automation;
mod reference;

pub use automation::{AutomationLogWriter, HighRiskAlertWriter};
pub use reference::{load_economic_csv, ReferenceData, ReferenceLoader};

pub const AUTOMATION_LOGS_FILE: &str = "automation_logs.json";
pub const HIGH_RISK_ALERTS_FILE: &str = "high_risk_alerts.json";
pub const CLIMATE_ZONES_FILE: &str = "climate_zones.geojson";
pub const MINING_SITES_FILE: &str = "mining_sites.geojson";
pub const BORDER_ZONES_FILE: &str = "border_zones.geojson";
pub const STRATEGIC_INDICATORS_FILE: &str = "strategic_indicators.csv";
pub const ECONOMIC_INDICATORS_FILE: &str = "economic_indicators.csv";
