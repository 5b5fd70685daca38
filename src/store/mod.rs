//! Document store
//!
//! Sled-backed persistence for articles, parsed events, risk signals and
//! economic records. Each entity family lives in its own tree; uniqueness
//! constraints (article URL, 24h content-hash window, per-(state,lga)
//! signal versions) are enforced with document-level atomic
//! `compare_and_swap` operations; no multi-document transactions.

mod articles;
mod events;
mod signals;

pub use articles::{ArticleStore, InsertOutcome};
pub use events::EventStore;
pub use signals::SignalStore;

use crate::error::{PipelineError, Result};
use crate::types::EconomicRecord;
use std::path::Path;
use std::sync::Arc;

/// Handle to every tree the pipeline persists into.
#[derive(Clone)]
pub struct DocumentStore {
    db: Arc<sled::Db>,
    pub articles: ArticleStore,
    pub events: EventStore,
    pub signals: SignalStore,
    economic: sled::Tree,
}

impl DocumentStore {
    /// Open (or create) the document store at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = Arc::new(sled::open(path)?);
        let articles = ArticleStore::new(&db)?;
        let events = EventStore::new(&db)?;
        let signals = SignalStore::new(&db)?;
        let economic = db.open_tree("economic")?;
        Ok(Self {
            db,
            articles,
            events,
            signals,
            economic,
        })
    }

    /// Cheap liveness probe for /health.
    pub fn is_healthy(&self) -> bool {
        // A name read exercises the underlying tree without writing.
        self.db.size_on_disk().is_ok()
    }

    /// Upsert an economic record keyed by (state, lga).
    pub fn put_economic(&self, record: &EconomicRecord) -> Result<()> {
        let key = economic_key(&record.state, record.lga.as_deref());
        let value = serde_json::to_vec(record)?;
        self.economic.insert(key, value)?;
        Ok(())
    }

    /// Exact (state, lga) lookup with state-level fallback.
    pub fn economic_for(&self, state: &str, lga: &str) -> Result<Option<EconomicRecord>> {
        if let Some(raw) = self.economic.get(economic_key(state, Some(lga)))? {
            return Ok(Some(serde_json::from_slice(&raw)?));
        }
        match self.economic.get(economic_key(state, None))? {
            Some(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            None => Ok(None),
        }
    }

    /// Number of stored economic records.
    pub fn economic_count(&self) -> usize {
        self.economic.len()
    }

    /// Flush all trees. Called on shutdown.
    pub fn flush(&self) -> Result<()> {
        self.db
            .flush()
            .map_err(|e| PipelineError::Storage(e.to_string()))?;
        Ok(())
    }
}

fn economic_key(state: &str, lga: Option<&str>) -> Vec<u8> {
    let mut key = state.to_lowercase().into_bytes();
    key.push(0x1f);
    if let Some(lga) = lga {
        key.extend_from_slice(lga.to_lowercase().as_bytes());
    }
    key
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn open_store() -> (DocumentStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::open(dir.path().join("docstore")).unwrap();
        (store, dir)
    }

    fn record(state: &str, lga: Option<&str>, fuel: f64) -> EconomicRecord {
        EconomicRecord {
            state: state.to_string(),
            lga: lga.map(str::to_string),
            inflation_rate: 22.5,
            fuel_price: fuel,
            unemployment_rate: None,
            updated_at: Utc::now(),
            source: None,
            location: None,
        }
    }

    #[test]
    fn test_economic_lga_match_beats_state_fallback() {
        let (store, _dir) = open_store();
        store.put_economic(&record("Lagos", None, 650.0)).unwrap();
        store
            .put_economic(&record("Lagos", Some("Ikeja"), 720.0))
            .unwrap();

        let hit = store.economic_for("Lagos", "Ikeja").unwrap().unwrap();
        assert_eq!(hit.fuel_price, 720.0);

        // Unknown LGA falls back to the state-level row.
        let fallback = store.economic_for("Lagos", "Epe").unwrap().unwrap();
        assert_eq!(fallback.fuel_price, 650.0);
    }

    #[test]
    fn test_economic_lookup_is_case_insensitive() {
        let (store, _dir) = open_store();
        store
            .put_economic(&record("Benue", Some("Guma"), 680.0))
            .unwrap();
        assert!(store.economic_for("BENUE", "guma").unwrap().is_some());
    }

    #[test]
    fn test_economic_missing_state_is_none() {
        let (store, _dir) = open_store();
        assert!(store.economic_for("Kwara", "Ilorin").unwrap().is_none());
    }
}
