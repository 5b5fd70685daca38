//! Process-wide application container
//!
//! Everything the three services share is constructed here once at
//! startup and passed down explicitly: configuration, document store,
//! message bus, reference tables, and the services themselves. No ambient
//! singletons; lifecycle is start() → serve → shutdown().

use crate::artifacts::{ReferenceData, ReferenceLoader};
use crate::bus::MessageBus;
use crate::config::Config;
use crate::error::Result;
use crate::extract::{ExtractionService, LlmExtractor};
use crate::ingest::{ArticleFetcher, IngestionService};
use crate::scoring::ScoringService;
use crate::store::DocumentStore;
use arc_swap::ArcSwap;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// The assembled application.
pub struct App {
    pub config: Config,
    pub store: DocumentStore,
    pub bus: MessageBus,
    pub reference: Arc<ArcSwap<ReferenceData>>,
    pub ingestion: Arc<IngestionService>,
    pub extraction: Arc<ExtractionService>,
    pub scoring: Arc<ScoringService>,
}

impl App {
    /// Open storage, load reference tables and wire the services.
    /// Missing reference files degrade the deployment (reported via
    /// /health) but never block startup.
    pub fn start(
        config: Config,
        fetchers: Vec<Arc<dyn ArticleFetcher>>,
        llm: Arc<dyn LlmExtractor>,
    ) -> Result<Arc<Self>> {
        let store = DocumentStore::open(&config.doc_store_url)?;
        let bus = MessageBus::open(&config.msg_bus_url)?;

        let loader = ReferenceLoader::new(Path::new(&config.artifact_dir));
        let reference_data = loader.load();
        if reference_data.is_degraded() {
            warn!(
                missing = ?reference_data.missing,
                "Starting in degraded mode: affected risk modifiers are disabled"
            );
        }
        let reference = Arc::new(ArcSwap::from_pointee(reference_data));

        let ingestion = Arc::new(IngestionService::new(
            config.clone(),
            store.clone(),
            bus.clone(),
            fetchers,
        ));
        let extraction = Arc::new(ExtractionService::new(
            &config,
            store.clone(),
            bus.clone(),
            llm,
        ));
        let scoring = Arc::new(ScoringService::new(
            config.clone(),
            store.clone(),
            bus.clone(),
            Arc::clone(&reference),
        ));

        ingestion.scheduler.start();
        extraction.start_processor();
        scoring.start_processor();

        info!(
            schedule = %config.schedule,
            doc_store = %config.doc_store_url,
            msg_bus = %config.msg_bus_url,
            "Application started"
        );

        Ok(Arc::new(Self {
            config,
            store,
            bus,
            reference,
            ingestion,
            extraction,
            scoring,
        }))
    }

    /// Re-read reference tables from the artifact directory and swap them
    /// in. Readers pick up the new tables on their next load().
    pub fn refresh_reference(&self) {
        let loader = ReferenceLoader::new(Path::new(&self.config.artifact_dir));
        self.reference.store(Arc::new(loader.load()));
        info!("Reference tables refreshed");
    }

    /// Flush storage. Called at the end of shutdown.
    pub fn shutdown(&self) {
        self.ingestion.scheduler.stop();
        self.extraction.stop_processor();
        self.scoring.stop_processor();
        if let Err(e) = self.store.flush() {
            warn!(error = %e, "Document store flush failed on shutdown");
        }
        if let Err(e) = self.bus.flush() {
            warn!(error = %e, "Message bus flush failed on shutdown");
        }
        info!("Application shutdown complete");
    }
}
