//! Ingestion run pipeline
//!
//! One scrape run: fetchers (concurrent behind a semaphore, retried with
//! backoff) → normalize → dedup gate → persist pending → publish to the
//! `articles` queue → high-risk alert grouping → automation log entry.
//!
//! Failure semantics: a failing fetcher is a partial success, not a run
//! failure. Store unavailability marks the run failed but future cadences
//! proceed. A failed publish leaves the article persisted; the periodic
//! reconciliation pass republishes stale pending articles.

use crate::artifacts::{AutomationLogWriter, HighRiskAlertWriter};
use crate::bus::MessageBus;
use crate::config::Config;
use crate::error::{PipelineError, Result};
use crate::ingest::fetcher::{fetch_with_retry, ArticleFetcher, RawArticle};
use crate::ingest::scheduler::ScrapeScheduler;
use crate::store::{DocumentStore, InsertOutcome};
use crate::types::{
    content_hash, Article, AutomationDetails, AutomationLog, HighRiskAlert, HighRiskArticle,
    ProcessingStatus,
};
use chrono::{Duration as ChronoDuration, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

/// Counters returned by an on-demand or scheduled scrape.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScrapeSummary {
    pub articles_scraped: usize,
    pub new_articles: usize,
    pub duplicates_dropped: usize,
    pub high_risk_count: usize,
    pub duration_seconds: f64,
}

/// The Ingestion Service. Exclusively owns articles, automation logs and
/// the high-risk alert feed.
pub struct IngestionService {
    config: Config,
    store: DocumentStore,
    bus: MessageBus,
    fetchers: Vec<Arc<dyn ArticleFetcher>>,
    fetch_semaphore: Arc<Semaphore>,
    pub scheduler: ScrapeScheduler,
    automation: AutomationLogWriter,
    alerts: HighRiskAlertWriter,
}

impl IngestionService {
    pub fn new(
        config: Config,
        store: DocumentStore,
        bus: MessageBus,
        fetchers: Vec<Arc<dyn ArticleFetcher>>,
    ) -> Self {
        let artifact_dir = std::path::Path::new(&config.artifact_dir);
        let automation = AutomationLogWriter::new(artifact_dir);
        let alerts = HighRiskAlertWriter::new(artifact_dir);
        let scheduler = ScrapeScheduler::new(config.schedule.clone());
        let fetch_semaphore = Arc::new(Semaphore::new(config.fetch_concurrency));
        Self {
            config,
            store,
            bus,
            fetchers,
            fetch_semaphore,
            scheduler,
            automation,
            alerts,
        }
    }

    /// On-demand trigger. Fails with SchedulerBusy while a run is active.
    pub async fn trigger_scrape(&self) -> Result<ScrapeSummary> {
        if !self.scheduler.begin_job() {
            return Err(PipelineError::SchedulerBusy);
        }
        let summary = self.run_job("manual_scrape").await;
        self.scheduler.finish_job();
        summary
    }

    /// Cadence-path entry. Overlap drops the tick silently (logged).
    pub async fn tick(&self) {
        if !self.scheduler.begin_job() {
            warn!("Scrape tick dropped: previous run still in progress");
            return;
        }
        if let Err(e) = self.run_job("scheduled_scrape").await {
            error!(error = %e, "Scheduled scrape failed");
        }
        self.scheduler.finish_job();
    }

    /// Execute one full scrape run and append the automation record.
    async fn run_job(&self, event_type: &str) -> Result<ScrapeSummary> {
        let started = Instant::now();
        let raw_articles = self.collect_from_fetchers().await;

        let mut summary = ScrapeSummary {
            articles_scraped: raw_articles.len(),
            ..ScrapeSummary::default()
        };
        let mut db_success = true;
        let mut mq_success = true;
        let mut high_risk: Vec<HighRiskArticle> = Vec::new();

        for raw in raw_articles {
            let article = normalize(raw);

            match self.store.articles.insert_new(&article) {
                Ok(InsertOutcome::Inserted) => {
                    summary.new_articles += 1;
                    if let Err(e) = self.publish_article(&article).await {
                        warn!(
                            article_id = %article.id,
                            error = %e,
                            "Publish failed, article left for reconciliation"
                        );
                        mq_success = false;
                    }
                    if let Some(score) = article.pre_risk_score {
                        if score > self.config.high_risk_threshold {
                            high_risk.push(HighRiskArticle {
                                title: article.title.clone(),
                                source: article.source.clone(),
                                risk_score: score,
                            });
                        }
                    }
                }
                Ok(InsertOutcome::DuplicateUrl | InsertOutcome::DuplicateContent) => {
                    summary.duplicates_dropped += 1;
                }
                Err(e) => {
                    error!(url = %article.url, error = %e, "Article persistence failed");
                    db_success = false;
                }
            }
        }

        summary.high_risk_count = high_risk.len();
        if !high_risk.is_empty() {
            let alert = HighRiskAlert {
                timestamp: Utc::now(),
                alert_type: "high_risk_articles".to_string(),
                count: high_risk.len(),
                articles: high_risk,
            };
            if let Err(e) = self.alerts.append(alert) {
                error!(error = %e, "High-risk alert write failed");
            }
        }

        summary.duration_seconds = started.elapsed().as_secs_f64();

        let log_entry = AutomationLog {
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            status: if db_success { "success" } else { "failure" }.to_string(),
            details: AutomationDetails {
                articles_count: summary.new_articles,
                high_risk_count: summary.high_risk_count,
                duration_seconds: summary.duration_seconds,
                db_success,
                mq_success,
            },
        };
        if let Err(e) = self.automation.append(log_entry) {
            error!(error = %e, "Automation log write failed");
        }

        info!(
            scraped = summary.articles_scraped,
            new = summary.new_articles,
            duplicates = summary.duplicates_dropped,
            high_risk = summary.high_risk_count,
            duration_secs = format!("{:.2}", summary.duration_seconds),
            "Scrape run complete"
        );

        if db_success {
            Ok(summary)
        } else {
            Err(PipelineError::Storage("article persistence failed".into()))
        }
    }

    /// Run every fetcher concurrently behind the semaphore; a failing
    /// fetcher contributes nothing but never aborts the run.
    async fn collect_from_fetchers(&self) -> Vec<RawArticle> {
        let tasks = self.fetchers.iter().map(|fetcher| {
            let fetcher = Arc::clone(fetcher);
            let semaphore = Arc::clone(&self.fetch_semaphore);
            async move {
                let Ok(_permit) = semaphore.acquire().await else {
                    return Vec::new();
                };
                match fetch_with_retry(fetcher.as_ref()).await {
                    Ok(articles) => articles,
                    Err(e) => {
                        error!(fetcher = fetcher.name(), error = %e, "Fetcher failed after retries");
                        Vec::new()
                    }
                }
            }
        });

        futures::future::join_all(tasks)
            .await
            .into_iter()
            .flatten()
            .collect()
    }

    /// Publish with a single immediate retry; the reconciliation pass
    /// covers anything that still fails.
    async fn publish_article(&self, article: &Article) -> Result<()> {
        match self.bus.articles.publish_json(article) {
            Ok(_) => Ok(()),
            Err(first) => {
                warn!(article_id = %article.id, error = %first, "Publish failed, retrying once");
                self.bus.articles.publish_json(article).map(|_| ())
            }
        }
    }

    /// Republish pending articles that have been sitting longer than the
    /// republish window. Safe under at-least-once delivery because the
    /// extraction side dedups on article_id.
    pub async fn reconcile_pending(&self) -> Result<usize> {
        let window = ChronoDuration::minutes(10);
        let cutoff = Utc::now() - window;
        let pending = self.store.articles.list_pending(200)?;
        let mut republished = 0;
        for article in pending {
            if article.scraped_at > cutoff {
                continue;
            }
            match self.bus.articles.publish_json(&article) {
                Ok(_) => republished += 1,
                Err(e) => warn!(article_id = %article.id, error = %e, "Reconcile publish failed"),
            }
        }
        if republished > 0 {
            info!(republished, "Reconciliation republished stale pending articles");
        }
        // Reclaim deliveries whose consumers died mid-flight as well.
        let _ = self.bus.articles.reclaim_expired();
        Ok(republished)
    }

    // === Introspection ===

    pub fn automation_logs(&self, limit: usize) -> (Vec<AutomationLog>, usize) {
        let total = self.automation.total_count();
        (self.automation.recent(limit), total)
    }

    pub fn recent_alerts(&self, limit: usize) -> Vec<HighRiskAlert> {
        self.alerts.recent(limit)
    }

    pub fn list_articles(
        &self,
        since: Option<chrono::DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<Article>> {
        self.store.articles.list(since, limit)
    }
}

/// Normalize a fetcher article into the persisted shape.
fn normalize(raw: RawArticle) -> Article {
    let hash = content_hash(&raw.title, &raw.content);
    Article {
        id: uuid::Uuid::new_v4().to_string(),
        url: raw.url,
        title: raw.title,
        content: raw.content,
        source: raw.source,
        scraped_at: Utc::now(),
        content_hash: hash,
        processing_status: ProcessingStatus::Pending,
        error_log: None,
        pre_risk_score: raw.risk_score,
    }
}
