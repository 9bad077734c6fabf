//! Query-result cache for pagination.
//!
//! A logical query (prompt + extracted filters) is answered by the LLM at
//! most once; later pages reuse the cached answer and matched set under the
//! same `query_id`. Entries expire after a TTL and are swept lazily on
//! access. A cached match list is only valid against the exact store build
//! it was computed from, so entries carry the store's `updated_at` stamp.

use std::hash::{Hash, Hasher};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use finsight_observability::debug;

use crate::models::{QueryMode, Statistics};
use crate::nlp::FilterSpec;

#[derive(Debug, Clone)]
pub struct CachedQuery {
    pub answer: String,
    pub mode: QueryMode,
    pub filters_applied: Vec<String>,
    pub statistics: Option<Statistics>,
    /// Matches satisfying the filter, before any display limit.
    pub matching_count: usize,
    /// Ordinals into the store's document list, in display order.
    pub matched: Vec<usize>,
    /// `updated_at` of the store build the ordinals refer to.
    pub store_stamp: DateTime<Utc>,
}

struct Entry {
    data: CachedQuery,
    created_at: Instant,
}

pub struct QueryCache {
    entries: DashMap<String, Entry>,
    ttl: Duration,
}

impl QueryCache {
    pub fn new(ttl_seconds: u64) -> Self {
        Self {
            entries: DashMap::new(),
            ttl: Duration::from_secs(ttl_seconds),
        }
    }

    /// Deterministic id for a logical query: same prompt and same extracted
    /// filters hash to the same id.
    pub fn query_id(prompt: &str, filters: &FilterSpec) -> String {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        prompt.hash(&mut hasher);
        for desc in filters.descriptions() {
            desc.hash(&mut hasher);
        }
        format!("{:016x}", hasher.finish())
    }

    pub fn get(&self, query_id: &str) -> Option<CachedQuery> {
        let entry = self.entries.get(query_id)?;
        if entry.created_at.elapsed() > self.ttl {
            drop(entry);
            self.entries.remove(query_id);
            debug!(query_id, "query cache entry expired");
            return None;
        }
        debug!(query_id, "query cache hit");
        Some(entry.data.clone())
    }

    pub fn put(&self, query_id: String, data: CachedQuery) {
        self.sweep_expired();
        self.entries.insert(query_id, Entry { data, created_at: Instant::now() });
    }

    fn sweep_expired(&self) {
        let ttl = self.ttl;
        self.entries.retain(|_, entry| entry.created_at.elapsed() <= ttl);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nlp::extract_filters;

    fn cached(answer: &str) -> CachedQuery {
        CachedQuery {
            answer: answer.to_string(),
            mode: QueryMode::SmartFull,
            filters_applied: vec![],
            statistics: None,
            matching_count: 3,
            matched: vec![0, 2, 4],
            store_stamp: Utc::now(),
        }
    }

    #[test]
    fn query_id_is_deterministic_and_filter_sensitive() {
        let prompt = "UPI above 500";
        let filters = extract_filters(prompt);
        assert_eq!(
            QueryCache::query_id(prompt, &filters),
            QueryCache::query_id(prompt, &filters)
        );

        let other = extract_filters("NEFT below 200");
        assert_ne!(
            QueryCache::query_id(prompt, &filters),
            QueryCache::query_id(prompt, &other)
        );
    }

    #[test]
    fn entries_round_trip_until_ttl() {
        let cache = QueryCache::new(3600);
        cache.put("q1".to_string(), cached("hello"));
        assert_eq!(cache.get("q1").unwrap().answer, "hello");

        let expiring = QueryCache::new(0);
        expiring.put("q2".to_string(), cached("bye"));
        std::thread::sleep(Duration::from_millis(5));
        assert!(expiring.get("q2").is_none());
    }
}
