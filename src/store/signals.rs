//! Risk signal persistence and versioning
//!
//! Signals are append-only. Each (state, lga) pair carries a monotonic
//! version counter so out-of-order processing can be tolerated: only the
//! highest version for a location is authoritative. The `signals_event`
//! tree makes event redelivery idempotent: one live-scoring signal per
//! event id. Simulation signals bypass that gate.

use crate::error::Result;
use crate::types::RiskSignal;
use tracing::warn;

#[derive(Clone)]
pub struct SignalStore {
    by_id: sled::Tree,
    by_event: sled::Tree,
    versions: sled::Tree,
}

impl SignalStore {
    pub(super) fn new(db: &sled::Db) -> Result<Self> {
        Ok(Self {
            by_id: db.open_tree("signals")?,
            by_event: db.open_tree("signals_event")?,
            versions: db.open_tree("signals_version")?,
        })
    }

    /// Allocate the next version for a location. Atomic fetch-and-increment.
    pub fn next_version(&self, state: &str, lga: &str) -> Result<u64> {
        let key = location_key(state, lga);
        let updated = self.versions.update_and_fetch(key, |old| {
            let next = old
                .and_then(|raw| raw.try_into().ok())
                .map(u64::from_be_bytes)
                .unwrap_or(0)
                + 1;
            Some(next.to_be_bytes().to_vec())
        })?;
        Ok(updated
            .and_then(|raw| raw.as_ref().try_into().ok())
            .map(u64::from_be_bytes)
            .unwrap_or(1))
    }

    /// Persist a live signal. Returns false when a signal for the same
    /// event id already exists (redelivered event message).
    pub fn insert_for_event(&self, signal: &RiskSignal) -> Result<bool> {
        if let Some(event_id) = &signal.event_id {
            let reserved = self
                .by_event
                .compare_and_swap(
                    event_id.as_bytes(),
                    None::<&[u8]>,
                    Some(signal.id.as_bytes()),
                )?
                .is_ok();
            if !reserved {
                return Ok(false);
            }
        }
        self.by_id
            .insert(signal.id.as_bytes(), serde_json::to_vec(signal)?)?;
        Ok(true)
    }

    /// Persist a simulation signal (no event-id idempotence gate).
    pub fn insert_simulation(&self, signal: &RiskSignal) -> Result<()> {
        self.by_id
            .insert(signal.id.as_bytes(), serde_json::to_vec(signal)?)?;
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<Option<RiskSignal>> {
        match self.by_id.get(id.as_bytes())? {
            Some(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn get_by_event(&self, event_id: &str) -> Result<Option<RiskSignal>> {
        match self.by_event.get(event_id.as_bytes())? {
            Some(id) => self.get(&String::from_utf8_lossy(&id)),
            None => Ok(None),
        }
    }

    /// Newest-first listing with optional state filter. For a given
    /// location only the highest-version signal is authoritative; callers
    /// that need exactly one row per location use [`Self::latest_per_location`].
    pub fn list(&self, state: Option<&str>, limit: usize) -> Result<Vec<RiskSignal>> {
        let state_lower = state.map(str::to_lowercase);
        let mut out: Vec<RiskSignal> = Vec::new();
        for item in self.by_id.iter() {
            let (_, raw) = item?;
            match serde_json::from_slice::<RiskSignal>(&raw) {
                Ok(signal) => {
                    if state_lower
                        .as_deref()
                        .map_or(true, |s| signal.state.to_lowercase() == s)
                    {
                        out.push(signal);
                    }
                }
                Err(e) => warn!(error = %e, "Skipping undecodable signal record"),
            }
        }
        out.sort_by(|a, b| b.calculated_at.cmp(&a.calculated_at));
        out.truncate(limit);
        Ok(out)
    }

    /// Highest-version live signal per (state, lga).
    pub fn latest_per_location(&self) -> Result<Vec<RiskSignal>> {
        use std::collections::HashMap;
        let mut best: HashMap<Vec<u8>, RiskSignal> = HashMap::new();
        for item in self.by_id.iter() {
            let (_, raw) = item?;
            let Ok(signal) = serde_json::from_slice::<RiskSignal>(&raw) else {
                continue;
            };
            if signal.simulation.is_simulation {
                continue;
            }
            let key = location_key(&signal.state, &signal.lga);
            match best.get(&key) {
                Some(existing) if existing.version >= signal.version => {}
                _ => {
                    best.insert(key, signal);
                }
            }
        }
        Ok(best.into_values().collect())
    }

    pub fn count(&self) -> usize {
        self.by_id.len()
    }
}

fn location_key(state: &str, lga: &str) -> Vec<u8> {
    let mut key = state.to_lowercase().into_bytes();
    key.push(0x1f);
    key.extend_from_slice(lga.to_lowercase().as_bytes());
    key
}
