//! Sentinel - Conflict Monitoring Signal Engine
//!
//! Scheduled news ingestion, LLM event extraction and multi-factor risk
//! scoring for Nigeria, served behind one admin API.
//!
//! # Usage
//!
//! ```bash
//! # Run with defaults (sled storage under ./data)
//! cargo run --release
//!
//! # Point at an upstream scraper feed and LLM gateway
//! FEED_URLS=https://scraper.internal/feed.json \
//! LLM_URL=http://llm.internal/api/generate \
//! cargo run --release
//! ```
//!
//! # Environment Variables
//!
//! See `config` module docs for the full table: `SCHEDULE`,
//! `DOC_STORE_URL`, `MSG_BUS_URL`, `ARTIFACT_DIR`, `LLM_URL`,
//! `HIGH_RISK_THRESHOLD`, `SURGE_PERCENTAGE`, `URBAN_FUEL_THRESHOLD`, ...

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use sentinel_core::api::create_app;
use sentinel_core::app::App;
use sentinel_core::config::Config;
use sentinel_core::extract::{LlmClient, LlmExtractor};
use sentinel_core::ingest::{ArticleFetcher, HttpFeedFetcher};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "sentinel")]
#[command(about = "Conflict monitoring signal engine for Nigeria")]
#[command(version)]
struct CliArgs {
    /// Override the admin server address (default: "0.0.0.0:8080")
    #[arg(short, long)]
    addr: Option<String>,

    /// Comma-separated upstream feed URLs (also via FEED_URLS env var)
    #[arg(long, env = "FEED_URLS")]
    feeds: Option<String>,

    /// Wipe all persistent data (document store, queues) on startup.
    /// WARNING: destructive and cannot be undone!
    #[arg(long)]
    reset_db: bool,
}

// ============================================================================
// Database Reset
// ============================================================================

/// Check if a reset is requested via CLI flag or RESET_DB env var.
fn should_reset_db(cli_flag: bool) -> bool {
    if cli_flag {
        return true;
    }
    if let Ok(val) = std::env::var("RESET_DB") {
        let val = val.to_lowercase();
        return val == "true" || val == "1" || val == "yes";
    }
    false
}

/// Remove persistent stores before anything opens them.
fn reset_data_directories(config: &Config) {
    for path in [&config.doc_store_url, &config.msg_bus_url] {
        let path = std::path::Path::new(path);
        if path.exists() {
            warn!("🗑️  RESET_DB: removing {}", path.display());
            if let Err(e) = std::fs::remove_dir_all(path) {
                error!(path = %path.display(), error = %e, "Reset failed");
            }
        }
    }
}

// ============================================================================
// Task supervision
// ============================================================================

/// Task identification for supervisor logging
#[derive(Debug, Clone, Copy)]
enum TaskName {
    HttpServer,
    ScrapeScheduler,
    ExtractionConsumer,
    ScoringConsumer,
    Reconciliation,
}

impl std::fmt::Display for TaskName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskName::HttpServer => write!(f, "HttpServer"),
            TaskName::ScrapeScheduler => write!(f, "ScrapeScheduler"),
            TaskName::ExtractionConsumer => write!(f, "ExtractionConsumer"),
            TaskName::ScoringConsumer => write!(f, "ScoringConsumer"),
            TaskName::Reconciliation => write!(f, "Reconciliation"),
        }
    }
}

/// Spawn every long-lived task and supervise until shutdown.
async fn run(app: Arc<App>, server_addr: String, cancel_token: CancellationToken) -> Result<()> {
    info!("🚀 Starting conflict monitoring pipeline");

    let mut task_set: JoinSet<Result<TaskName>> = JoinSet::new();

    // Task 1: HTTP server
    info!("🌐 Starting admin API on {}...", server_addr);
    let router = create_app(Arc::clone(&app));
    let listener = tokio::net::TcpListener::bind(&server_addr)
        .await
        .with_context(|| format!("Failed to bind to {server_addr}"))?;
    info!("✓ Admin API listening on {}", server_addr);

    let http_cancel = cancel_token.clone();
    task_set.spawn(async move {
        info!("[HttpServer] Task starting");
        let result = axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                http_cancel.cancelled().await;
                info!("[HttpServer] Received shutdown signal");
            })
            .await;
        match result {
            Ok(()) => Ok(TaskName::HttpServer),
            Err(e) => Err(anyhow::anyhow!("HTTP server error: {e}")),
        }
    });

    // Task 2: scrape scheduler loop
    let scheduler_cancel = cancel_token.clone();
    let scheduler_app = Arc::clone(&app);
    task_set.spawn(async move {
        info!(
            "[ScrapeScheduler] Task starting with cadence {}",
            scheduler_app.config.schedule
        );
        let mut interval = tokio::time::interval(scheduler_app.config.schedule.interval());
        // First tick fires immediately; skip it so the cadence starts one
        // interval from boot.
        interval.tick().await;
        loop {
            tokio::select! {
                _ = scheduler_cancel.cancelled() => {
                    scheduler_app.ingestion.scheduler.mark_loop_dead();
                    info!("[ScrapeScheduler] Received shutdown signal");
                    return Ok(TaskName::ScrapeScheduler);
                }
                _ = interval.tick() => {
                    if scheduler_app.ingestion.scheduler.is_stopped() {
                        continue;
                    }
                    scheduler_app.ingestion.tick().await;
                }
            }
        }
    });

    // Task 3: extraction consumer
    let extraction = Arc::clone(&app.extraction);
    let extraction_cancel = cancel_token.clone();
    task_set.spawn(async move {
        extraction.run_consumer(extraction_cancel).await;
        Ok(TaskName::ExtractionConsumer)
    });

    // Task 4: scoring consumer
    let scoring = Arc::clone(&app.scoring);
    let scoring_cancel = cancel_token.clone();
    task_set.spawn(async move {
        scoring.run_consumer(scoring_cancel).await;
        Ok(TaskName::ScoringConsumer)
    });

    // Task 5: reconciliation pass (stale pending articles, lost deliveries)
    let reconcile_cancel = cancel_token.clone();
    let reconcile_app = Arc::clone(&app);
    task_set.spawn(async move {
        info!("[Reconciliation] Task starting (5 minute interval)");
        let mut interval = tokio::time::interval(Duration::from_secs(300));
        interval.tick().await;
        loop {
            tokio::select! {
                _ = reconcile_cancel.cancelled() => {
                    info!("[Reconciliation] Received shutdown signal");
                    return Ok(TaskName::Reconciliation);
                }
                _ = interval.tick() => {
                    if let Err(e) = reconcile_app.ingestion.reconcile_pending().await {
                        warn!(error = %e, "[Reconciliation] Pass failed");
                    }
                    let _ = reconcile_app.bus.events.reclaim_expired();
                    let _ = reconcile_app.bus.signals.reclaim_expired();
                }
            }
        }
    });

    // Supervisor loop
    info!("🔒 Supervisor: all tasks spawned, monitoring");
    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => {
                info!("🛑 Supervisor: shutdown signal received");
                break;
            }
            result = task_set.join_next() => {
                match result {
                    Some(Ok(Ok(task_name))) => {
                        info!("🔒 Supervisor: task {} completed normally", task_name);
                    }
                    Some(Ok(Err(e))) => {
                        error!("🔒 Supervisor: task failed: {e}");
                        cancel_token.cancel();
                        return Err(e);
                    }
                    Some(Err(e)) => {
                        error!("🔒 Supervisor: task panicked: {e}");
                        cancel_token.cancel();
                        return Err(anyhow::anyhow!("Task panicked: {e}"));
                    }
                    None => {
                        info!("🔒 Supervisor: all tasks completed");
                        break;
                    }
                }
            }
        }
    }

    // Drain workers briefly before forcing exit.
    let drain = tokio::time::timeout(Duration::from_secs(30), async {
        while task_set.join_next().await.is_some() {}
    });
    if drain.await.is_err() {
        warn!("⚠️  Shutdown drain timed out after 30s, forcing exit");
        task_set.abort_all();
    }

    Ok(())
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();

    // Configuration must resolve before logging so LOG_LEVEL applies.
    let config = Config::from_env().map_err(|e| anyhow::anyhow!(e.to_string()))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.log_level.clone())),
        )
        .with_target(false)
        .init();

    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("  Sentinel - Conflict Monitoring Signal Engine");
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    if should_reset_db(args.reset_db) {
        reset_data_directories(&config);
    }

    let server_addr = args.addr.clone().unwrap_or_else(|| config.server_addr.clone());

    // Fetcher plug-ins from FEED_URLS / --feeds.
    let mut fetchers: Vec<Arc<dyn ArticleFetcher>> = Vec::new();
    if let Some(feeds) = args.feeds {
        for (idx, url) in feeds.split(',').map(str::trim).filter(|u| !u.is_empty()).enumerate() {
            let fetcher = HttpFeedFetcher::new(
                &format!("feed-{idx}"),
                url,
                Duration::from_secs(15),
            )
            .map_err(|e| anyhow::anyhow!(e.to_string()))?;
            fetchers.push(Arc::new(fetcher));
            info!("📥 Feed fetcher registered: {}", url);
        }
    }
    if fetchers.is_empty() {
        warn!("⚠️  No feed URLs configured; scrape runs will collect nothing");
    }

    let llm: Arc<dyn LlmExtractor> = Arc::new(
        LlmClient::new(
            &config.llm_url,
            Duration::from_secs(config.llm_timeout_seconds),
        )
        .map_err(|e| anyhow::anyhow!(e.to_string()))?,
    );

    let app = App::start(config, fetchers, llm).map_err(|e| anyhow::anyhow!(e.to_string()))?;

    // Graceful shutdown on Ctrl+C.
    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("🛑 Received Ctrl+C, initiating shutdown...");
        shutdown_token.cancel();
    });

    let result = run(Arc::clone(&app), server_addr, cancel_token).await;
    app.shutdown();

    info!("✓ Sentinel shutdown complete");
    result
}
