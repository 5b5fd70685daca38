//! Scrape scheduler
//!
//! One long-lived loop ticks on the configured cadence and launches one
//! scrape job per tick. A try-lock on the job guarantees non-overlap: a
//! tick that fires while the previous job is still running is dropped and
//! logged, never queued.
//!
//! State machine: `idle` after start(), `running` during a job,
//! `stopped` after stop(). stop() prevents future ticks; start() resets.

use crate::config::Schedule;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Scheduler lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerState {
    Idle,
    Running,
    Stopped,
}

impl std::fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchedulerState::Idle => write!(f, "idle"),
            SchedulerState::Running => write!(f, "running"),
            SchedulerState::Stopped => write!(f, "stopped"),
        }
    }
}

/// Introspection payload for `/api/v1/scheduler/status`. Always built
/// without blocking on the job itself.
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    /// "active" while the scheduler loop is alive and not stopped.
    pub status: String,
    pub scheduler_running: bool,
    pub job_running: bool,
    pub last_run: Option<DateTime<Utc>>,
    pub next_run: Option<DateTime<Utc>>,
    pub schedule: String,
}

#[derive(Debug)]
struct Inner {
    state: SchedulerState,
    last_run: Option<DateTime<Utc>>,
    next_run: Option<DateTime<Utc>>,
}

/// Shared scheduler bookkeeping. The tick loop itself lives in main's
/// supervisor; this struct owns the state the loop and the API both see.
#[derive(Clone)]
pub struct ScrapeScheduler {
    schedule: Schedule,
    inner: Arc<Mutex<Inner>>,
    /// True while the scheduler loop task is alive.
    loop_alive: Arc<AtomicBool>,
}

impl ScrapeScheduler {
    pub fn new(schedule: Schedule) -> Self {
        Self {
            schedule,
            inner: Arc::new(Mutex::new(Inner {
                state: SchedulerState::Idle,
                last_run: None,
                next_run: None,
            })),
            loop_alive: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    /// Mark the scheduler loop alive and reset to idle.
    pub fn start(&self) {
        self.loop_alive.store(true, Ordering::SeqCst);
        if let Ok(mut inner) = self.inner.lock() {
            inner.state = SchedulerState::Idle;
            inner.next_run = Some(Utc::now() + self.schedule.interval());
        }
    }

    /// Stop: no future ticks run until start() is called again.
    pub fn stop(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.state = SchedulerState::Stopped;
            inner.next_run = None;
        }
    }

    /// Called by the loop when it exits (shutdown or death).
    pub fn mark_loop_dead(&self) {
        self.loop_alive.store(false, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.inner
            .lock()
            .map(|inner| inner.state == SchedulerState::Stopped)
            .unwrap_or(true)
    }

    /// Transition idle → running at the start of a job. Returns false if a
    /// job is already running or the scheduler is stopped (the caller
    /// drops the tick).
    pub fn begin_job(&self) -> bool {
        let Ok(mut inner) = self.inner.lock() else {
            return false;
        };
        if inner.state != SchedulerState::Idle {
            return false;
        }
        inner.state = SchedulerState::Running;
        true
    }

    /// Transition running → idle when a job completes.
    pub fn finish_job(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            if inner.state == SchedulerState::Running {
                inner.state = SchedulerState::Idle;
            }
            inner.last_run = Some(Utc::now());
            inner.next_run = Some(Utc::now() + self.schedule.interval());
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.inner
            .lock()
            .map(|inner| inner.state)
            .unwrap_or(SchedulerState::Stopped)
    }

    /// Non-blocking status snapshot.
    pub fn status(&self) -> SchedulerStatus {
        let (state, last_run, next_run) = match self.inner.lock() {
            Ok(inner) => (inner.state, inner.last_run, inner.next_run),
            Err(_) => (SchedulerState::Stopped, None, None),
        };
        let scheduler_running = self.loop_alive.load(Ordering::SeqCst);
        let active = scheduler_running && state != SchedulerState::Stopped;
        SchedulerStatus {
            status: if active { "active" } else { "inactive" }.to_string(),
            scheduler_running,
            job_running: state == SchedulerState::Running,
            last_run,
            next_run,
            schedule: self.schedule.as_cron().to_string(),
        }
    }
}
