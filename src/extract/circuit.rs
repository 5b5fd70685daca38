//! Circuit breaker for the extraction LLM
//!
//! Closed → Open after N consecutive failures; Open → HalfOpen once the
//! recovery window elapses; a HalfOpen success closes the circuit, a
//! failure reopens it. Process-wide: one breaker guards all workers.

use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Observable breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half-open"),
        }
    }
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
}

pub struct CircuitBreaker {
    inner: Mutex<Inner>,
    failure_threshold: u32,
    recovery: Duration,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, recovery: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                opened_at: None,
            }),
            failure_threshold,
            recovery,
        }
    }

    /// Whether a call may proceed. An elapsed recovery window flips
    /// Open → HalfOpen and admits one probe.
    pub fn allow_request(&self) -> bool {
        let Ok(mut inner) = self.inner.lock() else {
            return false;
        };
        match inner.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let elapsed = inner.opened_at.map(|t| t.elapsed()).unwrap_or_default();
                if elapsed >= self.recovery {
                    inner.state = CircuitState::HalfOpen;
                    info!("LLM circuit half-open, probing");
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Seconds until the next probe is admitted (0 when not open).
    pub fn retry_after_secs(&self) -> u64 {
        let Ok(inner) = self.inner.lock() else {
            return self.recovery.as_secs();
        };
        match inner.state {
            CircuitState::Open => {
                let elapsed = inner.opened_at.map(|t| t.elapsed()).unwrap_or_default();
                self.recovery.saturating_sub(elapsed).as_secs().max(1)
            }
            _ => 0,
        }
    }

    pub fn record_success(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            if inner.state != CircuitState::Closed {
                info!("LLM circuit closed");
            }
            inner.state = CircuitState::Closed;
            inner.consecutive_failures = 0;
            inner.opened_at = None;
        }
    }

    pub fn record_failure(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.consecutive_failures += 1;
            let trip = match inner.state {
                // A failed half-open probe reopens immediately.
                CircuitState::HalfOpen => true,
                CircuitState::Closed => inner.consecutive_failures >= self.failure_threshold,
                CircuitState::Open => false,
            };
            if trip {
                warn!(
                    failures = inner.consecutive_failures,
                    recovery_secs = self.recovery.as_secs(),
                    "LLM circuit opened"
                );
                inner.state = CircuitState::Open;
                inner.opened_at = Some(Instant::now());
            }
        }
    }

    pub fn state(&self) -> CircuitState {
        self.inner
            .lock()
            .map(|inner| inner.state)
            .unwrap_or(CircuitState::Open)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opens_after_threshold_failures() {
        let cb = CircuitBreaker::new(5, Duration::from_secs(30));
        for _ in 0..4 {
            cb.record_failure();
            assert_eq!(cb.state(), CircuitState::Closed);
        }
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(!cb.allow_request());
        assert!(cb.retry_after_secs() > 0);
    }

    #[test]
    fn test_success_resets_failure_streak() {
        let cb = CircuitBreaker::new(3, Duration::from_secs(30));
        cb.record_failure();
        cb.record_failure();
        cb.record_success();
        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn test_half_open_probe_after_recovery() {
        let cb = CircuitBreaker::new(1, Duration::from_millis(0));
        cb.record_failure();
        // Recovery window of zero: the next check admits a probe.
        assert!(cb.allow_request());
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        cb.record_success();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn test_failed_probe_reopens() {
        let cb = CircuitBreaker::new(1, Duration::from_millis(0));
        cb.record_failure();
        assert!(cb.allow_request());
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
    }
}
