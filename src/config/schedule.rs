//! Scrape cadence parsing
//!
//! The contract is a fixed cadence, so only the `*/N * * * *` cron family
//! (plus the degenerate `* * * * *` = every minute) is accepted. Anything
//! requiring a real cron evaluator fails startup validation instead of
//! silently misfiring.

use crate::error::PipelineError;
use std::time::Duration;

/// Fixed scrape cadence resolved from `SCHEDULE` / `POLL_INTERVAL`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    minutes: u64,
    /// Original spec string, echoed by scheduler_status.
    display: String,
}

impl Schedule {
    /// Plain minutes cadence (POLL_INTERVAL form).
    pub fn every_minutes(minutes: u64) -> Self {
        let minutes = minutes.max(1);
        Self {
            minutes,
            display: format!("*/{minutes} * * * *"),
        }
    }

    /// Parse the `*/N * * * *` cron family.
    pub fn parse(spec: &str) -> Result<Self, PipelineError> {
        let fields: Vec<&str> = spec.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(PipelineError::Configuration(format!(
                "SCHEDULE must have 5 cron fields, got {}: {spec:?}",
                fields.len()
            )));
        }
        if fields[1..].iter().any(|f| *f != "*") {
            return Err(PipelineError::Configuration(format!(
                "SCHEDULE supports only minute cadences (*/N * * * *): {spec:?}"
            )));
        }

        let minutes = match fields[0] {
            "*" => 1,
            m if m.starts_with("*/") => m[2..].parse::<u64>().map_err(|_| {
                PipelineError::Configuration(format!("bad minute step in SCHEDULE: {spec:?}"))
            })?,
            _ => {
                return Err(PipelineError::Configuration(format!(
                    "SCHEDULE minute field must be * or */N: {spec:?}"
                )))
            }
        };
        if minutes == 0 || minutes > 1440 {
            return Err(PipelineError::Configuration(format!(
                "SCHEDULE cadence out of range (1..=1440 minutes): {spec:?}"
            )));
        }

        Ok(Self {
            minutes,
            display: spec.trim().to_string(),
        })
    }

    pub fn cadence_minutes(&self) -> u64 {
        self.minutes
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.minutes * 60)
    }

    /// The cron string shown in scheduler status.
    pub fn as_cron(&self) -> &str {
        &self.display
    }
}

impl std::fmt::Display for Schedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_default_cadence() {
        let s = Schedule::parse("*/15 * * * *").unwrap();
        assert_eq!(s.cadence_minutes(), 15);
        assert_eq!(s.interval(), Duration::from_secs(900));
        assert_eq!(s.as_cron(), "*/15 * * * *");
    }

    #[test]
    fn test_parse_every_minute() {
        let s = Schedule::parse("* * * * *").unwrap();
        assert_eq!(s.cadence_minutes(), 1);
    }

    #[test]
    fn test_rejects_hour_fields() {
        assert!(Schedule::parse("0 9 * * *").is_err());
        assert!(Schedule::parse("*/15 */2 * * *").is_err());
    }

    #[test]
    fn test_rejects_malformed() {
        assert!(Schedule::parse("*/0 * * * *").is_err());
        assert!(Schedule::parse("*/abc * * * *").is_err());
        assert!(Schedule::parse("*/15 * *").is_err());
    }

    #[test]
    fn test_every_minutes_clamps_zero() {
        assert_eq!(Schedule::every_minutes(0).cadence_minutes(), 1);
    }
}
