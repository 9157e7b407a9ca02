//! Feature extraction: image file → unit-length embedding.
//!
//! Each call reads the file, fingerprints its bytes with BLAKE3 and looks the
//! (image id, fingerprint) pair up in the [`EmbeddingCache`]. Only a miss
//! decodes the image and runs the backbone, inside `spawn_blocking` and under
//! the configured timeout. [`FeatureExtractor::embed_all`] runs a bounded pool
//! of such calls and returns results in input order.

pub mod cache;
pub mod decode;

use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tokio::sync::Semaphore;

use crate::config::{Config, LimitsConfig};
use crate::embedding::EmbeddingProvider;
use crate::error::ExtractionError;
use crate::math::l2_normalize_in_place;
use crate::types::Embedding;

pub use cache::{CacheKey, CacheStats, EmbeddingCache};

/// Cache-aware embedding extractor. Cloning shares the backbone and cache.
#[derive(Clone)]
pub struct FeatureExtractor {
    provider: Arc<dyn EmbeddingProvider>,
    cache: Arc<EmbeddingCache>,
    limits: LimitsConfig,
    workers: usize,
    dimension: Arc<OnceLock<usize>>,
}

impl FeatureExtractor {
    /// Create an extractor around a backbone.
    pub fn new(provider: Arc<dyn EmbeddingProvider>, config: &Config) -> Self {
        Self {
            provider,
            cache: Arc::new(EmbeddingCache::new()),
            limits: config.limits.clone(),
            workers: config.processing.parallel_workers.max(1),
            dimension: Arc::new(OnceLock::new()),
        }
    }

    pub fn model_id(&self) -> &str {
        self.provider.model_id()
    }

    /// Embedding dimension, once the first embedding has been produced.
    pub fn dimension(&self) -> Option<usize> {
        self.dimension.get().copied()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Embed one image file.
    pub async fn embed(&self, image_id: &str, path: &Path) -> Result<Embedding, ExtractionError> {
        let bytes = decode::read_image(path, &self.limits).await?;
        let key = CacheKey {
            image_id: image_id.to_string(),
            fingerprint: decode::fingerprint(&bytes),
        };
        self.cache
            .get_or_compute(key, || self.compute(bytes, path))
            .await
    }

    /// Embed many images with at most `parallel_workers` in flight.
    ///
    /// The output has one entry per input, in input order.
    pub async fn embed_all(
        &self,
        items: Vec<(String, PathBuf)>,
    ) -> Vec<Result<Embedding, ExtractionError>> {
        let semaphore = Arc::new(Semaphore::new(self.workers));
        let mut handles = Vec::with_capacity(items.len());

        for (image_id, path) in items {
            let permit = Arc::clone(&semaphore).acquire_owned().await;
            let extractor = self.clone();
            let task_path = path.clone();
            let handle = tokio::spawn(async move {
                let _permit = permit;
                extractor.embed(&image_id, &task_path).await
            });
            handles.push((path, handle));
        }

        let mut results = Vec::with_capacity(handles.len());
        for (path, handle) in handles {
            results.push(match handle.await {
                Ok(result) => result,
                Err(e) => {
                    tracing::error!("Embedding worker for {:?} panicked: {e}", path);
                    Err(ExtractionError::Backbone {
                        path,
                        message: format!("worker task failed: {e}"),
                    })
                }
            });
        }
        results
    }

    /// Decode and run the backbone on a cache miss.
    async fn compute(&self, bytes: Vec<u8>, path: &Path) -> Result<Embedding, ExtractionError> {
        let provider = Arc::clone(&self.provider);
        let max_dim = self.limits.max_image_dimension;
        let owned_path = path.to_path_buf();

        let task = tokio::task::spawn_blocking(move || {
            let image = decode::decode(&bytes, &owned_path, max_dim)?;
            let mut vector = provider.embed(&image, &owned_path)?;
            l2_normalize_in_place(&mut vector);
            Ok::<Vec<f32>, ExtractionError>(vector)
        });

        let timeout_ms = self.limits.embed_timeout_ms;
        let vector = match tokio::time::timeout(Duration::from_millis(timeout_ms), task).await {
            Ok(Ok(result)) => result?,
            Ok(Err(e)) => {
                return Err(ExtractionError::Backbone {
                    path: path.to_path_buf(),
                    message: format!("task join error: {e}"),
                })
            }
            Err(_) => {
                return Err(ExtractionError::Timeout {
                    path: path.to_path_buf(),
                    timeout_ms,
                })
            }
        };

        if !crate::math::is_unit(&vector) {
            return Err(ExtractionError::Backbone {
                path: path.to_path_buf(),
                message: "backbone returned a zero or non-finite vector".to_string(),
            });
        }

        let expected = *self.dimension.get_or_init(|| vector.len());
        if vector.len() != expected {
            return Err(ExtractionError::Backbone {
                path: path.to_path_buf(),
                message: format!(
                    "embedding dimension {} differs from {} seen earlier",
                    vector.len(),
                    expected
                ),
            });
        }

        tracing::debug!("Embedded {:?} ({} dims)", path, vector.len());
        Ok(Arc::from(vector))
    }
}
