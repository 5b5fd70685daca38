//! Article persistence and the dedup gate
//!
//! Three trees cooperate:
//! - `articles`        id → Article JSON
//! - `articles_url`    url → id (uniqueness gate, insert-if-absent)
//! - `articles_hash`   content_hash → (id, scraped_at millis)
//!
//! The URL gate is authoritative; the hash tree implements the 24h rolling
//! duplicate window across different URLs. Articles are never deleted by
//! the pipeline.

use crate::error::{PipelineError, Result};
use crate::types::{Article, ProcessingStatus};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Outcome of offering one scraped article to the dedup gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    /// First observation; the article was persisted as pending.
    Inserted,
    /// URL already stored.
    DuplicateUrl,
    /// Same content hash seen under a different URL inside the window.
    DuplicateContent,
}

#[derive(Debug, Serialize, Deserialize)]
struct HashEntry {
    article_id: String,
    scraped_at_ms: i64,
}

#[derive(Clone)]
pub struct ArticleStore {
    by_id: sled::Tree,
    by_url: sled::Tree,
    by_hash: sled::Tree,
}

impl ArticleStore {
    pub(super) fn new(db: &sled::Db) -> Result<Self> {
        Ok(Self {
            by_id: db.open_tree("articles")?,
            by_url: db.open_tree("articles_url")?,
            by_hash: db.open_tree("articles_hash")?,
        })
    }

    /// Insert-if-absent on `url`, then the 24h content-hash window check.
    ///
    /// At-least-once ingestion makes re-offers of the same article common;
    /// both duplicate outcomes are normal flow, not errors.
    pub fn insert_new(&self, article: &Article) -> Result<InsertOutcome> {
        // URL gate first: reserve the url → id slot atomically.
        let reserved = self
            .by_url
            .compare_and_swap(
                article.url.as_bytes(),
                None::<&[u8]>,
                Some(article.id.as_bytes()),
            )?
            .is_ok();
        if !reserved {
            return Ok(InsertOutcome::DuplicateUrl);
        }

        // Hash window: a collision under a different URL within 24h drops
        // the article; the url reservation is rolled back.
        if let Some(raw) = self.by_hash.get(article.content_hash.as_bytes())? {
            if let Ok(entry) = serde_json::from_slice::<HashEntry>(&raw) {
                let seen_at = DateTime::from_timestamp_millis(entry.scraped_at_ms)
                    .unwrap_or_else(Utc::now);
                if article.scraped_at - seen_at < Duration::hours(24) {
                    self.by_url.remove(article.url.as_bytes())?;
                    return Ok(InsertOutcome::DuplicateContent);
                }
            }
        }

        let hash_entry = serde_json::to_vec(&HashEntry {
            article_id: article.id.clone(),
            scraped_at_ms: article.scraped_at.timestamp_millis(),
        })?;
        self.by_hash
            .insert(article.content_hash.as_bytes(), hash_entry)?;
        self.by_id
            .insert(article.id.as_bytes(), serde_json::to_vec(article)?)?;
        Ok(InsertOutcome::Inserted)
    }

    pub fn get(&self, id: &str) -> Result<Option<Article>> {
        match self.by_id.get(id.as_bytes())? {
            Some(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn get_by_url(&self, url: &str) -> Result<Option<Article>> {
        match self.by_url.get(url.as_bytes())? {
            Some(id) => self.get(&String::from_utf8_lossy(&id)),
            None => Ok(None),
        }
    }

    /// Flip processing status. The only mutation articles ever receive.
    pub fn set_status(
        &self,
        id: &str,
        status: ProcessingStatus,
        error_log: Option<String>,
    ) -> Result<()> {
        let mut article = self
            .get(id)?
            .ok_or_else(|| PipelineError::Storage(format!("article not found: {id}")))?;
        article.processing_status = status;
        article.error_log = error_log;
        self.by_id
            .insert(id.as_bytes(), serde_json::to_vec(&article)?)?;
        Ok(())
    }

    /// Newest-first listing. `since` filters on scraped_at.
    pub fn list(&self, since: Option<DateTime<Utc>>, limit: usize) -> Result<Vec<Article>> {
        let mut out: Vec<Article> = Vec::new();
        for item in self.by_id.iter() {
            let (_, raw) = item?;
            match serde_json::from_slice::<Article>(&raw) {
                Ok(article) => {
                    if since.map_or(true, |s| article.scraped_at >= s) {
                        out.push(article);
                    }
                }
                Err(e) => warn!(error = %e, "Skipping undecodable article record"),
            }
        }
        out.sort_by(|a, b| b.scraped_at.cmp(&a.scraped_at));
        out.truncate(limit);
        Ok(out)
    }

    /// Articles still pending extraction, oldest first (reconciliation scan).
    pub fn list_pending(&self, limit: usize) -> Result<Vec<Article>> {
        let mut out: Vec<Article> = Vec::new();
        for item in self.by_id.iter() {
            let (_, raw) = item?;
            if let Ok(article) = serde_json::from_slice::<Article>(&raw) {
                if article.processing_status == ProcessingStatus::Pending {
                    out.push(article);
                }
            }
        }
        out.sort_by(|a, b| a.scraped_at.cmp(&b.scraped_at));
        out.truncate(limit);
        Ok(out)
    }

    pub fn count(&self) -> usize {
        self.by_id.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::content_hash;

    fn store() -> (ArticleStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = sled::open(dir.path().join("db")).unwrap();
        (ArticleStore::new(&db).unwrap(), dir)
    }

    fn article(id: &str, url: &str, title: &str, body: &str) -> Article {
        Article {
            id: id.to_string(),
            url: url.to_string(),
            title: title.to_string(),
            content: body.to_string(),
            source: "test-wire".to_string(),
            scraped_at: Utc::now(),
            content_hash: content_hash(title, body),
            processing_status: ProcessingStatus::Pending,
            error_log: None,
            pre_risk_score: None,
        }
    }

    #[test]
    fn test_url_dedup() {
        let (store, _dir) = store();
        let a = article("a1", "https://x/1", "Attack in Jos", "details one");
        assert_eq!(store.insert_new(&a).unwrap(), InsertOutcome::Inserted);

        let again = article("a2", "https://x/1", "Attack in Jos", "changed body");
        assert_eq!(store.insert_new(&again).unwrap(), InsertOutcome::DuplicateUrl);
        assert_eq!(store.count(), 1);
    }

    #[test]
    fn test_content_hash_dedup_across_urls() {
        let (store, _dir) = store();
        let a = article("a1", "https://x/1", "Attack in Jos", "same body");
        assert_eq!(store.insert_new(&a).unwrap(), InsertOutcome::Inserted);

        // Syndicated copy: different URL, identical content.
        let copy = article("a2", "https://y/77", "Attack in Jos", "same body");
        assert_eq!(
            store.insert_new(&copy).unwrap(),
            InsertOutcome::DuplicateContent
        );
        assert_eq!(store.count(), 1);
        // The rejected URL slot must be released so a later distinct
        // article can use it.
        assert!(store.get_by_url("https://y/77").unwrap().is_none());
    }

    #[test]
    fn test_hash_collision_outside_window_is_allowed() {
        let (store, _dir) = store();
        let mut old = article("a1", "https://x/1", "Attack in Jos", "same body");
        old.scraped_at = Utc::now() - Duration::hours(30);
        assert_eq!(store.insert_new(&old).unwrap(), InsertOutcome::Inserted);

        let fresh = article("a2", "https://y/2", "Attack in Jos", "same body");
        assert_eq!(store.insert_new(&fresh).unwrap(), InsertOutcome::Inserted);
        assert_eq!(store.count(), 2);
    }

    #[test]
    fn test_status_flip_and_pending_scan() {
        let (store, _dir) = store();
        store
            .insert_new(&article("a1", "https://x/1", "t1", "b1"))
            .unwrap();
        store
            .insert_new(&article("a2", "https://x/2", "t2", "b2"))
            .unwrap();

        store
            .set_status("a1", ProcessingStatus::Processed, None)
            .unwrap();

        let pending = store.list_pending(10).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, "a2");

        store
            .set_status("a2", ProcessingStatus::Failed, Some("bad llm".into()))
            .unwrap();
        let failed = store.get("a2").unwrap().unwrap();
        assert_eq!(failed.processing_status, ProcessingStatus::Failed);
        assert_eq!(failed.error_log.as_deref(), Some("bad llm"));
    }

    #[test]
    fn test_list_newest_first_with_limit() {
        let (store, _dir) = store();
        for i in 0..5 {
            let mut a = article(
                &format!("a{i}"),
                &format!("https://x/{i}"),
                &format!("t{i}"),
                &format!("b{i}"),
            );
            a.scraped_at = Utc::now() - Duration::minutes(10 - i);
            store.insert_new(&a).unwrap();
        }
        let listed = store.list(None, 3).unwrap();
        assert_eq!(listed.len(), 3);
        assert_eq!(listed[0].id, "a4");
    }
}
