//! Surge detection
//!
//! Tracks the last live risk score per (state, lga) and flags transitions
//! where the relative increase exceeds the configured percentage. The map
//! is service-local, mutex-guarded and deliberately ephemeral: a restart
//! re-baselines rather than alerting on stale history. Simulation passes
//! never touch it.

use std::collections::HashMap;
use std::sync::Mutex;

/// Result of observing one new score for a location.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurgeObservation {
    pub surge_detected: bool,
    pub percentage_increase: Option<f64>,
}

pub struct SurgeTracker {
    threshold_pct: f64,
    last_scores: Mutex<HashMap<(String, String), f64>>,
}

impl SurgeTracker {
    pub fn new(threshold_pct: f64) -> Self {
        Self {
            threshold_pct,
            last_scores: Mutex::new(HashMap::new()),
        }
    }

    /// Record `current` for the location and compare against the previous
    /// score. The map always updates, surge or not.
    pub fn observe(&self, state: &str, lga: &str, current: f64) -> SurgeObservation {
        let key = (state.to_lowercase(), lga.to_lowercase());
        let Ok(mut scores) = self.last_scores.lock() else {
            return SurgeObservation {
                surge_detected: false,
                percentage_increase: None,
            };
        };
        let previous = scores.insert(key, current);

        match previous {
            Some(prev) if prev > 0.0 => {
                let increase_pct = (current - prev) / prev * 100.0;
                if increase_pct > self.threshold_pct {
                    SurgeObservation {
                        surge_detected: true,
                        percentage_increase: Some(increase_pct),
                    }
                } else {
                    SurgeObservation {
                        surge_detected: false,
                        percentage_increase: None,
                    }
                }
            }
            _ => SurgeObservation {
                surge_detected: false,
                percentage_increase: None,
            },
        }
    }

    pub fn tracked_locations(&self) -> usize {
        self.last_scores.lock().map(|m| m.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_observation_never_surges() {
        let tracker = SurgeTracker::new(20.0);
        let obs = tracker.observe("Kaduna", "Zaria", 45.0);
        assert!(!obs.surge_detected);
        assert!(obs.percentage_increase.is_none());
    }

    #[test]
    fn test_seed_sequence_45_to_60_surges() {
        let tracker = SurgeTracker::new(20.0);
        tracker.observe("Kaduna", "Zaria", 45.0);
        let obs = tracker.observe("Kaduna", "Zaria", 60.0);
        assert!(obs.surge_detected);
        let pct = obs.percentage_increase.unwrap();
        assert!((pct - 33.333).abs() < 0.01, "got {pct}");
    }

    #[test]
    fn test_exact_threshold_does_not_surge() {
        let tracker = SurgeTracker::new(20.0);
        tracker.observe("Kano", "Dala", 50.0);
        // +20% exactly is not a surge; strictly greater is required.
        let obs = tracker.observe("Kano", "Dala", 60.0);
        assert!(!obs.surge_detected);
        // The baseline still advanced to 60.
        let obs = tracker.observe("Kano", "Dala", 73.0);
        assert!(obs.surge_detected);
    }

    #[test]
    fn test_decrease_never_surges() {
        let tracker = SurgeTracker::new(20.0);
        tracker.observe("Borno", "Jere", 80.0);
        let obs = tracker.observe("Borno", "Jere", 40.0);
        assert!(!obs.surge_detected);
    }

    #[test]
    fn test_locations_are_independent() {
        let tracker = SurgeTracker::new(20.0);
        tracker.observe("Kaduna", "Zaria", 40.0);
        tracker.observe("Kaduna", "Chikun", 40.0);
        let obs = tracker.observe("Kaduna", "Zaria", 60.0);
        assert!(obs.surge_detected);
        let obs = tracker.observe("Kaduna", "Chikun", 44.0);
        assert!(!obs.surge_detected);
        assert_eq!(tracker.tracked_locations(), 2);
    }

    #[test]
    fn test_zero_previous_score_is_skipped() {
        let tracker = SurgeTracker::new(20.0);
        tracker.observe("Kano", "Dala", 0.0);
        let obs = tracker.observe("Kano", "Dala", 50.0);
        assert!(!obs.surge_detected);
    }
}
