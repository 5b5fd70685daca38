//! API handlers, grouped by owning service.

pub mod extract;
pub mod health;
pub mod ingest;
pub mod scoring;

use crate::app::App;
use std::sync::Arc;

/// Shared handler state: the whole application container.
pub type AppState = Arc<App>;
