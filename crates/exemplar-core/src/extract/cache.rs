//! Compute-once embedding cache.
//!
//! Keyed by (image id, content fingerprint). Each key owns a `OnceCell`: the
//! first caller computes, concurrent callers for the same key wait on the cell
//! and receive the same `Arc`. A failed computation leaves the cell empty.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::OnceCell;

use crate::error::ExtractionError;
use crate::types::Embedding;

/// Cache key: where the image came from and what its bytes were.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub image_id: String,
    pub fingerprint: String,
}

/// Counters for logging cache effectiveness.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub computed: usize,
    pub hits: usize,
}

/// Shared embedding cache.
#[derive(Default)]
pub struct EmbeddingCache {
    slots: Mutex<HashMap<CacheKey, Arc<OnceCell<Embedding>>>>,
    computed: AtomicUsize,
    hits: AtomicUsize,
}

impl EmbeddingCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached embedding for `key`, computing it at most once.
    pub async fn get_or_compute<F, Fut>(
        &self,
        key: CacheKey,
        compute: F,
    ) -> Result<Embedding, ExtractionError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Embedding, ExtractionError>>,
    {
        // The map lock is only held to find the slot, never across the computation.
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
            Arc::clone(slots.entry(key).or_default())
        };

        let mut ran = false;
        let value = slot
            .get_or_try_init(|| {
                ran = true;
                compute()
            })
            .await?;

        if ran {
            self.computed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.hits.fetch_add(1, Ordering::Relaxed);
        }
        Ok(Arc::clone(value))
    }

    pub fn stats(&self) -> CacheStats {
        let entries = self
            .slots
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .filter(|slot| slot.initialized())
            .count();
        CacheStats {
            entries,
            computed: self.computed.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
        }
    }

    /// Drop every cached embedding and reset counters.
    pub fn clear(&self) {
        self.slots.lock().unwrap_or_else(|e| e.into_inner()).clear();
        self.computed.store(0, Ordering::Relaxed);
        self.hits.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn key(id: &str) -> CacheKey {
        CacheKey {
            image_id: id.to_string(),
            fingerprint: "abc".to_string(),
        }
    }

    #[tokio::test]
    async fn test_second_lookup_is_a_hit() {
        let cache = EmbeddingCache::new();
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let v = cache
                .get_or_compute(key("a"), || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<Embedding, ExtractionError>(Arc::from(vec![1.0f32, 0.0]))
                })
                .await
                .unwrap();
            assert_eq!(&v[..], &[1.0, 0.0]);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let stats = cache.stats();
        assert_eq!(stats.computed, 1);
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.entries, 1);
    }

    #[tokio::test]
    async fn test_concurrent_requests_compute_once() {
        let cache = Arc::new(EmbeddingCache::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = Arc::clone(&cache);
            let calls = Arc::clone(&calls);
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_compute(key("shared"), || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        Ok::<Embedding, ExtractionError>(Arc::from(vec![0.6f32, 0.8]))
                    })
                    .await
                    .unwrap()
            }));
        }

        let mut results = Vec::new();
        for h in handles {
            results.push(h.await.unwrap());
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(results.iter().all(|r| Arc::ptr_eq(r, &results[0])));
    }

    #[tokio::test]
    async fn test_failure_is_not_cached() {
        let cache = EmbeddingCache::new();
        let err = cache
            .get_or_compute(key("bad"), || async {
                Err::<Embedding, _>(ExtractionError::BackboneUnavailable("offline".into()))
            })
            .await;
        assert!(err.is_err());

        let ok = cache
            .get_or_compute(key("bad"), || async {
                Ok::<Embedding, ExtractionError>(Arc::from(vec![1.0f32]))
            })
            .await;
        assert!(ok.is_ok());
        assert_eq!(cache.stats().computed, 1);
    }

    #[tokio::test]
    async fn test_clear_resets() {
        let cache = EmbeddingCache::new();
        cache
            .get_or_compute(key("a"), || async {
                Ok::<Embedding, ExtractionError>(Arc::from(vec![1.0f32]))
            })
            .await
            .unwrap();
        cache.clear();
        assert_eq!(cache.stats(), CacheStats::default());
    }
}
