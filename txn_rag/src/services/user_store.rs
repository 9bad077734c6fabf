//! Per-user corpus registry.
//!
//! The registry is the only shared mutable structure in the service. Reads
//! are lock-free snapshots; `replace` swaps in a freshly built store as one
//! `Arc`, so a concurrent reader observes either the old corpus or the new
//! one in full, never a mix.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use finsight_observability::info;

use super::vector_index::VectorIndex;
use crate::models::Document;

/// A user's in-memory corpus: documents and the index derived from them.
/// Both are built together and never mutated after publication.
#[derive(Debug)]
pub struct UserStore {
    pub documents: Vec<Document>,
    pub index: VectorIndex,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

struct StoreEntry {
    store: Arc<UserStore>,
    last_used: Instant,
}

pub struct UserStores {
    entries: DashMap<String, StoreEntry>,
    ttl: Duration,
}

impl UserStores {
    pub fn new(ttl_seconds: u64) -> Self {
        Self {
            entries: DashMap::new(),
            ttl: Duration::from_secs(ttl_seconds),
        }
    }

    /// Snapshot a user's store, touching its idle clock. An entry past its
    /// TTL is dropped as if it were never there; the user must re-ingest.
    pub fn get(&self, user_id: &str) -> Option<Arc<UserStore>> {
        {
            let mut entry = self.entries.get_mut(user_id)?;
            if entry.last_used.elapsed() <= self.ttl {
                entry.last_used = Instant::now();
                return Some(entry.store.clone());
            }
        }
        self.entries.remove(user_id);
        info!(user_id, "evicted idle user store");
        None
    }

    /// Atomically publish a freshly built corpus for the user. Last writer
    /// wins; `created_at` survives across replacements.
    pub fn replace(
        &self,
        user_id: &str,
        documents: Vec<Document>,
        index: VectorIndex,
    ) -> Arc<UserStore> {
        let now = Utc::now();
        let created_at = self
            .entries
            .get(user_id)
            .map(|e| e.store.created_at)
            .unwrap_or(now);

        let store = Arc::new(UserStore {
            documents,
            index,
            created_at,
            updated_at: now,
        });

        self.entries.insert(
            user_id.to_string(),
            StoreEntry { store: store.clone(), last_used: Instant::now() },
        );
        store
    }

    /// `(count, updated_at)` for the status endpoint, without touching the
    /// idle clock.
    pub fn status(&self, user_id: &str) -> Option<(usize, DateTime<Utc>)> {
        let entry = self.entries.get(user_id)?;
        if entry.last_used.elapsed() > self.ttl {
            return None;
        }
        Some((entry.store.documents.len(), entry.store.updated_at))
    }

    /// Drop stores idle past the TTL. Safe because stores are rebuildable
    /// from an upstream re-ingest.
    pub fn sweep_idle(&self) -> usize {
        let before = self.entries.len();
        let ttl = self.ttl;
        self.entries.retain(|_, entry| entry.last_used.elapsed() <= ttl);
        let evicted = before - self.entries.len();
        if evicted > 0 {
            info!(evicted, "swept idle user stores");
        }
        evicted
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
    use crate::models::Transaction;

    fn docs(n: usize, tag: &str) -> Vec<Document> {
        (0..n)
            .map(|i| {
                Document::from_transaction(Transaction {
                    txn_id: Some(format!("{tag}-{i}")),
                    amount: 100.0,
                    ..Transaction::default()
                })
            })
            .collect()
    }

    fn index_for(docs: &[Document]) -> VectorIndex {
        VectorIndex::from_embeddings(vec![vec![1.0, 0.0]; docs.len()], 2).unwrap()
    }

    #[test]
    fn stores_are_isolated_per_user() {
        let stores = UserStores::new(3600);
        let a = docs(10, "u1");
        let b = docs(5, "u2");
        let (ia, ib) = (index_for(&a), index_for(&b));
        stores.replace("u1", a, ia);
        stores.replace("u2", b, ib);

        let u1 = stores.get("u1").unwrap();
        let u2 = stores.get("u2").unwrap();
        assert_eq!(u1.documents.len(), 10);
        assert_eq!(u2.documents.len(), 5);
        assert!(u1.documents.iter().all(|d| d.txn.txn_id.as_deref().unwrap().starts_with("u1")));
        assert!(u2.documents.iter().all(|d| d.txn.txn_id.as_deref().unwrap().starts_with("u2")));
    }

    #[test]
    fn replace_preserves_created_at_and_bumps_updated_at() {
        let stores = UserStores::new(3600);
        let first = docs(2, "a");
        let idx = index_for(&first);
        let v1 = stores.replace("u", first, idx);

        let second = docs(3, "b");
        let idx = index_for(&second);
        let v2 = stores.replace("u", second, idx);

        assert_eq!(v1.created_at, v2.created_at);
        assert!(v2.updated_at >= v1.updated_at);
        assert_eq!(stores.get("u").unwrap().documents.len(), 3);
    }

    #[test]
    fn reader_snapshot_survives_replace() {
        let stores = UserStores::new(3600);
        let first = docs(2, "a");
        let idx = index_for(&first);
        stores.replace("u", first, idx);

        let snapshot = stores.get("u").unwrap();
        let second = docs(7, "b");
        let idx = index_for(&second);
        stores.replace("u", second, idx);

        // The old snapshot is still complete and consistent.
        assert_eq!(snapshot.documents.len(), 2);
        assert_eq!(snapshot.index.len(), 2);
        assert_eq!(stores.get("u").unwrap().documents.len(), 7);
    }

    #[test]
    fn concurrent_snapshots_see_whole_stores() {
        let stores = Arc::new(UserStores::new(3600));
        let a = docs(4, "a");
        let idx = index_for(&a);
        stores.replace("u", a, idx);

        let writer = {
            let stores = stores.clone();
            std::thread::spawn(move || {
                for _ in 0..200 {
                    let b = docs(9, "b");
                    let idx = index_for(&b);
                    stores.replace("u", b, idx);
                }
            })
        };

        for _ in 0..200 {
            let snap = stores.get("u").unwrap();
            // A snapshot is always one of the two complete corpora; the
            // index is always positionally aligned with the documents.
            assert!(snap.documents.len() == 4 || snap.documents.len() == 9);
            assert_eq!(snap.documents.len(), snap.index.len());
        }

        writer.join().unwrap();
    }

    #[test]
    fn idle_entries_are_evicted() {
        let stores = UserStores::new(0);
        let d = docs(1, "a");
        let idx = index_for(&d);
        stores.replace("u", d, idx);

        std::thread::sleep(Duration::from_millis(5));
        assert!(stores.get("u").is_none());
        assert!(stores.is_empty() || stores.sweep_idle() > 0);
    }
}
