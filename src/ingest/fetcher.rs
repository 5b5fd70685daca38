//! Fetcher plug-ins
//!
//! A fetcher returns normalized articles from one upstream source. The
//! HTML-parsing of any particular news site lives outside the core; the
//! pipeline only sees the [`RawArticle`] shape. Transient fetch failures
//! are retried with exponential backoff (2s initial, factor 2, 10s cap,
//! 3 attempts) plus jitter.

use crate::error::{PipelineError, Result};
use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Normalized article as returned by a fetcher, before persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawArticle {
    pub url: String,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub source: String,
    /// Optional score already attached by the upstream tier. The core
    /// never computes this; it only gates high-risk alerting on it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_score: Option<f64>,
}

/// A pluggable article source.
#[async_trait]
pub trait ArticleFetcher: Send + Sync {
    /// Stable name used in logs and automation records.
    fn name(&self) -> &str;

    /// Fetch the current batch of articles.
    async fn fetch(&self) -> Result<Vec<RawArticle>>;
}

// ============================================================================
// Retry policy
// ============================================================================

const RETRY_INITIAL: Duration = Duration::from_secs(2);
const RETRY_CAP: Duration = Duration::from_secs(10);
const RETRY_ATTEMPTS: u32 = 3;

/// Run a fetcher with the standard backoff policy. Validation-class errors
/// are surfaced immediately; only retriable kinds consume attempts.
pub(super) async fn fetch_with_retry(fetcher: &dyn ArticleFetcher) -> Result<Vec<RawArticle>> {
    let mut delay = RETRY_INITIAL;
    let mut last_err = None;

    for attempt in 1..=RETRY_ATTEMPTS {
        match fetcher.fetch().await {
            Ok(articles) => {
                debug!(
                    fetcher = fetcher.name(),
                    count = articles.len(),
                    attempt,
                    "Fetch succeeded"
                );
                return Ok(articles);
            }
            Err(e) if e.is_retriable() && attempt < RETRY_ATTEMPTS => {
                let jitter_ms = rand::thread_rng().gen_range(0..250);
                warn!(
                    fetcher = fetcher.name(),
                    attempt,
                    delay_secs = delay.as_secs(),
                    error = %e,
                    "Fetch failed, backing off"
                );
                tokio::time::sleep(delay + Duration::from_millis(jitter_ms)).await;
                delay = (delay * 2).min(RETRY_CAP);
                last_err = Some(e);
            }
            Err(e) => return Err(e),
        }
    }

    Err(last_err
        .unwrap_or_else(|| PipelineError::TransientExternal("fetch retries exhausted".into())))
}

// ============================================================================
// HTTP JSON-feed fetcher
// ============================================================================

/// Fetches a JSON array of [`RawArticle`] from an HTTP endpoint. This is
/// the production plug-in shape: an upstream scraper tier exposes its
/// normalized output as a feed and the core pulls it on cadence.
pub struct HttpFeedFetcher {
    name: String,
    url: String,
    client: reqwest::Client,
}

impl HttpFeedFetcher {
    /// Per-request timeout default mirrors the ingestion contract (15s).
    pub fn new(name: &str, url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(20)
            .build()
            .map_err(|e| PipelineError::Configuration(format!("http client: {e}")))?;
        Ok(Self {
            name: name.to_string(),
            url: url.to_string(),
            client,
        })
    }
}

#[async_trait]
impl ArticleFetcher for HttpFeedFetcher {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self) -> Result<Vec<RawArticle>> {
        let resp = self.client.get(&self.url).send().await?;
        if !resp.status().is_success() {
            return Err(PipelineError::TransientExternal(format!(
                "{} returned {}",
                self.url,
                resp.status()
            )));
        }
        let mut articles: Vec<RawArticle> = resp.json().await?;
        for article in &mut articles {
            if article.source.is_empty() {
                article.source = self.name.clone();
            }
        }
        Ok(articles)
    }
}

// ============================================================================
// Static fetcher (tests, demos, replay)
// ============================================================================

/// Returns a fixed batch on every call.
pub struct StaticFetcher {
    name: String,
    articles: Vec<RawArticle>,
}

impl StaticFetcher {
    pub fn new(name: &str, articles: Vec<RawArticle>) -> Self {
        Self {
            name: name.to_string(),
            articles,
        }
    }
}

#[async_trait]
impl ArticleFetcher for StaticFetcher {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self) -> Result<Vec<RawArticle>> {
        Ok(self.articles.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FlakyFetcher {
        calls: AtomicU32,
        fail_first: u32,
    }

    #[async_trait]
    impl ArticleFetcher for FlakyFetcher {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn fetch(&self) -> Result<Vec<RawArticle>> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_first {
                Err(PipelineError::TransientExternal("connection reset".into()))
            } else {
                Ok(vec![RawArticle {
                    url: "https://x/1".into(),
                    title: "t".into(),
                    content: "c".into(),
                    source: "flaky".into(),
                    risk_score: None,
                }])
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_recovers_from_transient_failures() {
        let fetcher = FlakyFetcher {
            calls: AtomicU32::new(0),
            fail_first: 2,
        };
        let articles = fetch_with_retry(&fetcher).await.unwrap();
        assert_eq!(articles.len(), 1);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_gives_up_after_three_attempts() {
        let fetcher = FlakyFetcher {
            calls: AtomicU32::new(0),
            fail_first: 99,
        };
        let err = fetch_with_retry(&fetcher).await.unwrap_err();
        assert!(err.is_retriable());
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_validation_error_is_not_retried() {
        struct BadFeed;

        #[async_trait]
        impl ArticleFetcher for BadFeed {
            fn name(&self) -> &str {
                "bad"
            }
            async fn fetch(&self) -> Result<Vec<RawArticle>> {
                Err(PipelineError::ValidationFailure("not an array".into()))
            }
        }

        let err = fetch_with_retry(&BadFeed).await.unwrap_err();
        assert!(matches!(err, PipelineError::ValidationFailure(_)));
    }

    #[tokio::test]
    async fn test_static_fetcher_returns_batch() {
        let fetcher = StaticFetcher::new(
            "fixture",
            vec![RawArticle {
                url: "https://x/1".into(),
                title: "t".into(),
                content: "c".into(),
                source: String::new(),
                risk_score: Some(91.0),
            }],
        );
        assert_eq!(fetcher.fetch().await.unwrap().len(), 1);
    }
}
