//! Runtime configuration
//!
//! All options come from the environment with production defaults, so a
//! bare `sentinel` starts a working pipeline against local storage. Call
//! [`Config::from_env`] once at startup and pass the value down explicitly;
//! there is no ambient global.
//!
//! ## Recognized variables
//!
//! | Variable | Default | Meaning |
//! |---|---|---|
//! | `SCHEDULE` | `*/15 * * * *` | scrape cadence (minutes-form cron) |
//! | `POLL_INTERVAL` | — | plain cadence in minutes, overrides SCHEDULE |
//! | `DOC_STORE_URL` | `./data/docstore` | sled path for the document store |
//! | `MSG_BUS_URL` | `./data/msgbus` | sled path for the durable queues |
//! | `ARTIFACT_DIR` | `./data/artifacts` | automation logs, alerts, reference files |
//! | `ALLOWED_ORIGINS` | `*` | comma-separated CORS origins |
//! | `LOG_LEVEL` | `info` | tracing env-filter fallback |
//! | `LLM_URL` | `http://localhost:11434/api/generate` | extraction gateway |
//! | `LLM_TIMEOUT_SECONDS` | `30` | per-LLM-call timeout |
//! | `MAX_CONCURRENT_PROCESSING` | `5` | worker pool + LLM semaphore size |
//! | `CB_FAILURE_THRESHOLD` | `5` | circuit breaker trip count |
//! | `CB_RECOVERY_SECONDS` | `30` | circuit breaker open window |
//! | `HIGH_RISK_THRESHOLD` | `85` | pre-scored article alert gate |
//! | `SURGE_PERCENTAGE` | `20` | surge detection threshold (percent) |
//! | `URBAN_FUEL_THRESHOLD` | `80` | Economic Igniter fuel index gate |
//! | `FETCH_CONCURRENCY` | `10` | fetcher semaphore size |
//! | `SENTINEL_SERVER_ADDR` | `0.0.0.0:8080` | admin API bind address |

mod schedule;

pub use schedule::Schedule;

use crate::error::PipelineError;

/// Process-wide configuration, resolved once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Scrape cadence.
    pub schedule: Schedule,
    /// Document store sled path.
    pub doc_store_url: String,
    /// Message bus sled path.
    pub msg_bus_url: String,
    /// Artifact directory (logs, alerts, reference tables).
    pub artifact_dir: String,
    /// CORS origins; `*` allows any.
    pub allowed_origins: Vec<String>,
    /// Fallback tracing filter when RUST_LOG is unset.
    pub log_level: String,
    /// Extraction LLM endpoint.
    pub llm_url: String,
    /// Per-LLM-call timeout in seconds.
    pub llm_timeout_seconds: u64,
    /// Extraction/scoring worker pool and LLM semaphore size.
    pub max_concurrent_processing: usize,
    /// Consecutive failures before the LLM circuit opens.
    pub cb_failure_threshold: u32,
    /// Seconds the circuit stays open before a half-open probe.
    pub cb_recovery_seconds: u64,
    /// Pre-scored article threshold for high-risk alerts.
    pub high_risk_threshold: f64,
    /// Surge detection threshold (percent increase).
    pub surge_percentage: f64,
    /// Economic Igniter fuel-price-index gate.
    pub urban_fuel_threshold: f64,
    /// Fetcher concurrency semaphore size.
    pub fetch_concurrency: usize,
    /// Admin HTTP bind address.
    pub server_addr: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            schedule: Schedule::every_minutes(15),
            doc_store_url: "./data/docstore".to_string(),
            msg_bus_url: "./data/msgbus".to_string(),
            artifact_dir: "./data/artifacts".to_string(),
            allowed_origins: vec!["*".to_string()],
            log_level: "info".to_string(),
            llm_url: "http://localhost:11434/api/generate".to_string(),
            llm_timeout_seconds: 30,
            max_concurrent_processing: 5,
            cb_failure_threshold: 5,
            cb_recovery_seconds: 30,
            high_risk_threshold: 85.0,
            surge_percentage: 20.0,
            urban_fuel_threshold: 80.0,
            fetch_concurrency: 10,
            server_addr: "0.0.0.0:8080".to_string(),
        }
    }
}

impl Config {
    /// Resolve configuration from the environment, falling back to defaults.
    ///
    /// Fails only on values that are present but unparseable; a missing
    /// variable is never an error.
    pub fn from_env() -> Result<Self, PipelineError> {
        let mut cfg = Config::default();

        // POLL_INTERVAL (plain minutes) takes precedence over SCHEDULE.
        if let Ok(minutes) = std::env::var("POLL_INTERVAL") {
            let minutes: u64 = minutes.trim().parse().map_err(|_| {
                PipelineError::Configuration(format!("POLL_INTERVAL not a number: {minutes}"))
            })?;
            cfg.schedule = Schedule::every_minutes(minutes);
        } else if let Ok(spec) = std::env::var("SCHEDULE") {
            cfg.schedule = Schedule::parse(&spec)?;
        }

        if let Ok(v) = std::env::var("DOC_STORE_URL") {
            cfg.doc_store_url = v;
        }
        if let Ok(v) = std::env::var("MSG_BUS_URL") {
            cfg.msg_bus_url = v;
        }
        if let Ok(v) = std::env::var("ARTIFACT_DIR") {
            cfg.artifact_dir = v;
        }
        if let Ok(v) = std::env::var("ALLOWED_ORIGINS") {
            cfg.allowed_origins = v.split(',').map(|s| s.trim().to_string()).collect();
        }
        if let Ok(v) = std::env::var("LOG_LEVEL") {
            cfg.log_level = v;
        }
        if let Ok(v) = std::env::var("LLM_URL") {
            cfg.llm_url = v;
        }
        if let Ok(v) = std::env::var("SENTINEL_SERVER_ADDR") {
            cfg.server_addr = v;
        }

        cfg.llm_timeout_seconds = parse_env("LLM_TIMEOUT_SECONDS", cfg.llm_timeout_seconds)?;
        cfg.max_concurrent_processing =
            parse_env("MAX_CONCURRENT_PROCESSING", cfg.max_concurrent_processing)?;
        cfg.cb_failure_threshold = parse_env("CB_FAILURE_THRESHOLD", cfg.cb_failure_threshold)?;
        cfg.cb_recovery_seconds = parse_env("CB_RECOVERY_SECONDS", cfg.cb_recovery_seconds)?;
        cfg.high_risk_threshold = parse_env("HIGH_RISK_THRESHOLD", cfg.high_risk_threshold)?;
        cfg.surge_percentage = parse_env("SURGE_PERCENTAGE", cfg.surge_percentage)?;
        cfg.urban_fuel_threshold = parse_env("URBAN_FUEL_THRESHOLD", cfg.urban_fuel_threshold)?;
        cfg.fetch_concurrency = parse_env("FETCH_CONCURRENCY", cfg.fetch_concurrency)?;

        cfg.validate()?;
        Ok(cfg)
    }

    /// Sanity-check the resolved configuration. Called from `from_env` and
    /// from tests that build configs by hand.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.max_concurrent_processing == 0 {
            return Err(PipelineError::Configuration(
                "MAX_CONCURRENT_PROCESSING must be >= 1".to_string(),
            ));
        }
        if self.fetch_concurrency == 0 {
            return Err(PipelineError::Configuration(
                "FETCH_CONCURRENCY must be >= 1".to_string(),
            ));
        }
        if self.cb_failure_threshold == 0 {
            return Err(PipelineError::Configuration(
                "CB_FAILURE_THRESHOLD must be >= 1".to_string(),
            ));
        }
        if !(0.0..=100.0).contains(&self.high_risk_threshold) {
            return Err(PipelineError::Configuration(format!(
                "HIGH_RISK_THRESHOLD out of range: {}",
                self.high_risk_threshold
            )));
        }
        if self.surge_percentage <= 0.0 {
            return Err(PipelineError::Configuration(
                "SURGE_PERCENTAGE must be positive".to_string(),
            ));
        }
        if !(0.0..=100.0).contains(&self.urban_fuel_threshold) {
            return Err(PipelineError::Configuration(format!(
                "URBAN_FUEL_THRESHOLD out of range: {}",
                self.urban_fuel_threshold
            )));
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> Result<T, PipelineError> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| PipelineError::Configuration(format!("{name} unparseable: {raw}"))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let cfg = Config::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.schedule.cadence_minutes(), 15);
        assert_eq!(cfg.high_risk_threshold, 85.0);
        assert_eq!(cfg.surge_percentage, 20.0);
        assert_eq!(cfg.urban_fuel_threshold, 80.0);
    }

    #[test]
    fn test_validate_rejects_zero_workers() {
        let cfg = Config {
            max_concurrent_processing: 0,
            ..Config::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(PipelineError::Configuration(_))
        ));
    }

    #[test]
    fn test_validate_rejects_out_of_range_threshold() {
        let cfg = Config {
            high_risk_threshold: 185.0,
            ..Config::default()
        };
        assert!(cfg.validate().is_err());
    }
}
