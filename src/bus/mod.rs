//! Durable message bus
//!
//! Three named queues (`articles`, `events`, `signals`) with at-least-once
//! delivery and explicit acknowledgment. Consumers must be idempotent;
//! the document store supplies the dedup keys (url / article_id /
//! event_id+version).

mod queue;

pub use queue::{Delivery, DurableQueue};

use crate::error::Result;
use std::path::Path;
use std::sync::Arc;

pub const QUEUE_ARTICLES: &str = "articles";
pub const QUEUE_EVENTS: &str = "events";
pub const QUEUE_SIGNALS: &str = "signals";

/// Handle bundling the three pipeline queues.
#[derive(Clone)]
pub struct MessageBus {
    db: Arc<sled::Db>,
    pub articles: DurableQueue,
    pub events: DurableQueue,
    pub signals: DurableQueue,
}

impl MessageBus {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = Arc::new(sled::open(path)?);
        let articles = DurableQueue::open(&db, QUEUE_ARTICLES)?;
        let events = DurableQueue::open(&db, QUEUE_EVENTS)?;
        let signals = DurableQueue::open(&db, QUEUE_SIGNALS)?;
        Ok(Self {
            db,
            articles,
            events,
            signals,
        })
    }

    /// Cheap liveness probe for /health.
    pub fn is_healthy(&self) -> bool {
        self.db.size_on_disk().is_ok()
    }

    pub fn flush(&self) -> Result<()> {
        self.db.flush().map_err(crate::error::PipelineError::from)?;
        Ok(())
    }
}
