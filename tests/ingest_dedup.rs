//! Ingestion dedup gate regression
//!
//! The two uniqueness invariants across scrape runs: no two persisted
//! articles share a URL, and no two share a content hash within 24 hours
//! even under different URLs.

use sentinel_core::app::App;
use sentinel_core::error::{PipelineError, Result};
use sentinel_core::extract::LlmExtractor;
use sentinel_core::ingest::{ArticleFetcher, RawArticle, StaticFetcher};
use sentinel_core::Config;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;

struct NoLlm;

#[async_trait]
impl LlmExtractor for NoLlm {
    async fn extract(&self, _prompt: &str) -> Result<String> {
        Err(PipelineError::TransientExternal("unused".into()))
    }
}

fn test_app(fetchers: Vec<Arc<dyn ArticleFetcher>>) -> (Arc<App>, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let config = Config {
        doc_store_url: dir.path().join("doc").display().to_string(),
        msg_bus_url: dir.path().join("bus").display().to_string(),
        artifact_dir: dir.path().join("artifacts").display().to_string(),
        ..Config::default()
    };
    let app = App::start(config, fetchers, Arc::new(NoLlm)).unwrap();
    (app, dir)
}

fn raw(url: &str, title: &str, content: &str) -> RawArticle {
    RawArticle {
        url: url.to_string(),
        title: title.to_string(),
        content: content.to_string(),
        source: "test-wire".to_string(),
        risk_score: None,
    }
}

#[tokio::test]
async fn no_two_articles_share_a_url() {
    // Two fetchers both return the same URL in one run.
    let f1: Arc<dyn ArticleFetcher> = Arc::new(StaticFetcher::new(
        "wire-a",
        vec![raw("https://x/story", "Attack in Jos", "details")],
    ));
    let f2: Arc<dyn ArticleFetcher> = Arc::new(StaticFetcher::new(
        "wire-b",
        vec![raw("https://x/story", "Attack in Jos (syndicated)", "other details")],
    ));
    let (app, _dir) = test_app(vec![f1, f2]);

    let summary = app.ingestion.trigger_scrape().await.unwrap();
    assert_eq!(summary.articles_scraped, 2);
    assert_eq!(summary.new_articles, 1);
    assert_eq!(summary.duplicates_dropped, 1);

    let articles = app.store.articles.list(None, 100).unwrap();
    let urls: HashSet<&str> = articles.iter().map(|a| a.url.as_str()).collect();
    assert_eq!(urls.len(), articles.len());
}

#[tokio::test]
async fn syndicated_copy_under_different_url_is_dropped() {
    let f1: Arc<dyn ArticleFetcher> = Arc::new(StaticFetcher::new(
        "wire-a",
        vec![raw("https://a/1", "Attack in Jos", "identical body text")],
    ));
    let f2: Arc<dyn ArticleFetcher> = Arc::new(StaticFetcher::new(
        "wire-b",
        vec![raw("https://b/99", "Attack in Jos", "identical body text")],
    ));
    let (app, _dir) = test_app(vec![f1, f2]);

    let summary = app.ingestion.trigger_scrape().await.unwrap();
    assert_eq!(summary.new_articles, 1);
    assert_eq!(summary.duplicates_dropped, 1);

    let articles = app.store.articles.list(None, 100).unwrap();
    let hashes: HashSet<&str> = articles.iter().map(|a| a.content_hash.as_str()).collect();
    assert_eq!(hashes.len(), articles.len());
}

#[tokio::test]
async fn distinct_content_same_run_both_persist() {
    let fetcher: Arc<dyn ArticleFetcher> = Arc::new(StaticFetcher::new(
        "wire",
        vec![
            raw("https://x/1", "Attack in Jos", "first body"),
            raw("https://x/2", "Protest in Kano", "second body"),
        ],
    ));
    let (app, _dir) = test_app(vec![fetcher]);

    let summary = app.ingestion.trigger_scrape().await.unwrap();
    assert_eq!(summary.new_articles, 2);
    assert_eq!(summary.duplicates_dropped, 0);
    assert_eq!(app.bus.articles.pending_count(), 2);
}

#[tokio::test]
async fn dedup_holds_across_consecutive_runs() {
    let fetcher: Arc<dyn ArticleFetcher> = Arc::new(StaticFetcher::new(
        "wire",
        vec![
            raw("https://x/1", "Attack in Jos", "first body"),
            raw("https://x/2", "Protest in Kano", "second body"),
        ],
    ));
    let (app, _dir) = test_app(vec![fetcher]);

    for _ in 0..3 {
        app.ingestion.trigger_scrape().await.unwrap();
    }

    assert_eq!(app.store.articles.count(), 2);
    // Only the first run published anything.
    assert_eq!(app.bus.articles.pending_count(), 2);

    let (logs, total) = app.ingestion.automation_logs(10);
    assert_eq!(total, 3);
    assert_eq!(logs[0].details.articles_count, 0);
    assert_eq!(logs[2].details.articles_count, 2);
}
