//! LRU cache for LLM responses
//!
//! Keyed by article content hash so re-offered or redelivered articles
//! never spend a second LLM call. Capacity-bounded with
//! least-recently-used eviction; hits refresh recency.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

pub struct ResponseCache {
    inner: Mutex<CacheInner>,
    capacity: usize,
}

struct CacheInner {
    map: HashMap<String, String>,
    // Recency order, most recent at the back. Stale duplicates from
    // refreshes are tolerated and skipped at eviction time.
    order: VecDeque<String>,
}

impl ResponseCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                map: HashMap::with_capacity(capacity),
                order: VecDeque::with_capacity(capacity),
            }),
            capacity: capacity.max(1),
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        let Ok(mut inner) = self.inner.lock() else {
            return None;
        };
        let value = inner.map.get(key).cloned()?;
        inner.order.push_back(key.to_string());
        Some(value)
    }

    pub fn put(&self, key: &str, value: &str) {
        let Ok(mut inner) = self.inner.lock() else {
            return;
        };
        inner.map.insert(key.to_string(), value.to_string());
        inner.order.push_back(key.to_string());

        // Hit-heavy workloads grow the recency queue with duplicates;
        // compact before it dwarfs the map.
        if inner.order.len() > self.capacity * 8 {
            let mut seen = std::collections::HashSet::new();
            let mut compacted = VecDeque::with_capacity(inner.map.len());
            while let Some(key) = inner.order.pop_back() {
                if seen.insert(key.clone()) {
                    compacted.push_front(key);
                }
            }
            inner.order = compacted;
        }

        while inner.map.len() > self.capacity {
            let Some(candidate) = inner.order.pop_front() else {
                break;
            };
            // Only evict if this is the oldest reference to the key.
            if inner.order.contains(&candidate) {
                continue;
            }
            inner.map.remove(&candidate);
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|inner| inner.map.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_and_miss() {
        let cache = ResponseCache::new(4);
        assert!(cache.get("h1").is_none());
        cache.put("h1", "{\"Event_Type\":\"attack\"}");
        assert_eq!(cache.get("h1").unwrap(), "{\"Event_Type\":\"attack\"}");
    }

    #[test]
    fn test_evicts_least_recently_used() {
        let cache = ResponseCache::new(2);
        cache.put("a", "1");
        cache.put("b", "2");
        // Touch "a" so "b" becomes the LRU entry.
        assert!(cache.get("a").is_some());
        cache.put("c", "3");

        assert_eq!(cache.len(), 2);
        assert!(cache.get("b").is_none());
        assert!(cache.get("a").is_some());
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn test_overwrite_same_key_keeps_one_entry() {
        let cache = ResponseCache::new(2);
        cache.put("a", "1");
        cache.put("a", "2");
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("a").unwrap(), "2");
    }
}
