//! Bounded append-only JSON feeds
//!
//! `automation_logs.json` (last 100 runs) and `high_risk_alerts.json`
//! (last 20 alerts) are JSON arrays, newest-last, rewritten atomically via
//! a temp file + rename in the same directory. An in-process mutex keeps
//! the read-trim-write cycle single-writer.

use crate::error::{PipelineError, Result};
use crate::types::{AutomationLog, HighRiskAlert};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

/// Maximum automation log entries retained.
pub const MAX_AUTOMATION_LOGS: usize = 100;
/// Maximum high-risk alert entries retained.
pub const MAX_HIGH_RISK_ALERTS: usize = 20;

fn read_array<T: DeserializeOwned>(path: &Path) -> Vec<T> {
    match std::fs::read(path) {
        Ok(raw) => serde_json::from_slice(&raw).unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "Corrupt artifact feed, starting fresh");
            Vec::new()
        }),
        Err(_) => Vec::new(),
    }
}

/// Serialize to a sibling temp file, then rename over the target. Rename
/// within one directory is atomic on POSIX filesystems.
fn write_array_atomic<T: Serialize>(path: &Path, entries: &[T]) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| PipelineError::Storage(format!("no parent dir for {}", path.display())))?;
    std::fs::create_dir_all(parent)
        .map_err(|e| PipelineError::Storage(format!("mkdir {}: {e}", parent.display())))?;

    let tmp = path.with_extension("json.tmp");
    let body = serde_json::to_vec_pretty(entries)?;
    std::fs::write(&tmp, body)
        .map_err(|e| PipelineError::Storage(format!("write {}: {e}", tmp.display())))?;
    std::fs::rename(&tmp, path)
        .map_err(|e| PipelineError::Storage(format!("rename {}: {e}", path.display())))?;
    Ok(())
}

/// Single-writer automation log feed.
pub struct AutomationLogWriter {
    path: PathBuf,
    lock: Mutex<()>,
}

impl AutomationLogWriter {
    pub fn new(dir: &Path) -> Self {
        Self {
            path: dir.join(super::AUTOMATION_LOGS_FILE),
            lock: Mutex::new(()),
        }
    }

    /// Append one run record, trimming to the newest 100.
    pub fn append(&self, entry: AutomationLog) -> Result<()> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| PipelineError::Storage("automation log lock poisoned".to_string()))?;
        let mut entries: Vec<AutomationLog> = read_array(&self.path);
        entries.push(entry);
        if entries.len() > MAX_AUTOMATION_LOGS {
            let excess = entries.len() - MAX_AUTOMATION_LOGS;
            entries.drain(..excess);
        }
        write_array_atomic(&self.path, &entries)
    }

    /// Newest-first listing up to `limit`.
    pub fn recent(&self, limit: usize) -> Vec<AutomationLog> {
        let mut entries: Vec<AutomationLog> = read_array(&self.path);
        entries.reverse();
        entries.truncate(limit);
        entries
    }

    pub fn total_count(&self) -> usize {
        read_array::<AutomationLog>(&self.path).len()
    }
}

/// Single-writer high-risk alert feed.
pub struct HighRiskAlertWriter {
    path: PathBuf,
    lock: Mutex<()>,
}

impl HighRiskAlertWriter {
    pub fn new(dir: &Path) -> Self {
        Self {
            path: dir.join(super::HIGH_RISK_ALERTS_FILE),
            lock: Mutex::new(()),
        }
    }

    /// Append one alert, trimming to the newest 20.
    pub fn append(&self, alert: HighRiskAlert) -> Result<()> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| PipelineError::Storage("alert feed lock poisoned".to_string()))?;
        let mut entries: Vec<HighRiskAlert> = read_array(&self.path);
        entries.push(alert);
        if entries.len() > MAX_HIGH_RISK_ALERTS {
            let excess = entries.len() - MAX_HIGH_RISK_ALERTS;
            entries.drain(..excess);
        }
        write_array_atomic(&self.path, &entries)
    }

    pub fn recent(&self, limit: usize) -> Vec<HighRiskAlert> {
        let mut entries: Vec<HighRiskAlert> = read_array(&self.path);
        entries.reverse();
        entries.truncate(limit);
        entries
    }
}
