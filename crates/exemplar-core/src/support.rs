//! Deterministic support set sampling.
//!
//! For every class the pool images are listed in sorted order, shuffled with an
//! RNG seeded from the grid seed and the class name, and the first *k* are
//! embedded. The same (pool, class list, k, seed) always yields the same
//! exemplars, and a class's draw does not depend on which other classes exist.

use std::path::PathBuf;

use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::dataset::discovery::relative_id;
use crate::dataset::{CategoryLayout, ImageLister};
use crate::extract::FeatureExtractor;
use crate::types::{is_open_set, SupportExample, SupportSet};

/// Per-class RNG seed: the grid seed mixed with a hash of the class name.
pub fn class_seed(seed: u64, class: &str) -> u64 {
    let hash = blake3::hash(class.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&hash.as_bytes()[..8]);
    seed ^ u64::from_le_bytes(bytes)
}

/// Seeded permutation of an already-sorted pool.
pub fn shuffled<T: Clone>(pool: &[T], seed: u64, class: &str) -> Vec<T> {
    let mut order = pool.to_vec();
    let mut rng = rand::rngs::StdRng::seed_from_u64(class_seed(seed, class));
    order.shuffle(&mut rng);
    order
}

/// Builds support sets for one category.
pub struct SupportSetBuilder {
    layout: CategoryLayout,
    lister: ImageLister,
    extractor: FeatureExtractor,
}

impl SupportSetBuilder {
    pub fn new(layout: CategoryLayout, lister: ImageLister, extractor: FeatureExtractor) -> Self {
        Self {
            layout,
            lister,
            extractor,
        }
    }

    /// Sample and embed `k` exemplars for each class in `class_list`.
    ///
    /// Never fails: short pools are used whole (degraded), empty pools omit the
    /// class, and exemplars that fail extraction are replaced by the next image
    /// in the shuffled order. Every such event is recorded as a warning.
    pub async fn build(&self, class_list: &[String], k: usize, seed: u64) -> SupportSet {
        let mut set = SupportSet::new(k, seed);

        let Some((pool_n, pool_dir)) = self.layout.resolve_pool(k) else {
            set.warn(format!(
                "No shot_<N> pool under {:?}; support set for shot={k} is empty",
                self.layout.support_root()
            ));
            return set;
        };
        if pool_n != k {
            tracing::info!("shot={k}: sampling from pool shot_{pool_n}");
        }

        for class in class_list {
            if is_open_set(class) {
                tracing::debug!("Skipping open-set class {:?} as a match target", class);
                continue;
            }

            let pool = self.lister.list(&pool_dir.join(class));
            if pool.is_empty() {
                set.warn(format!(
                    "Class {class:?} has no images in shot_{pool_n}; omitted from shot={k}"
                ));
                continue;
            }
            if pool.len() < k {
                set.warn(format!(
                    "Class {class:?} has {} of {k} requested images in shot_{pool_n}; using all",
                    pool.len()
                ));
            }

            let order = shuffled(&pool, seed, class);
            let exemplars = self.embed_exemplars(class, order, k, &mut set).await;
            if exemplars.is_empty() {
                set.warn(format!(
                    "Class {class:?}: no exemplar could be embedded; omitted from shot={k}"
                ));
            }
            set.insert(class.clone(), exemplars);
        }

        tracing::info!(
            "Support set shot={k}: {} class(es), {} exemplar(s)",
            set.class_count(),
            set.exemplar_count()
        );
        set
    }

    /// Embed the first `k` of `order`, drawing replacements for failures.
    async fn embed_exemplars(
        &self,
        class: &str,
        order: Vec<PathBuf>,
        k: usize,
        set: &mut SupportSet,
    ) -> Vec<SupportExample> {
        let root = self.layout.root();
        let mut exemplars = Vec::with_capacity(k);
        let mut remaining = order.into_iter();

        while exemplars.len() < k {
            let batch: Vec<(String, PathBuf)> = remaining
                .by_ref()
                .take(k - exemplars.len())
                .map(|p| (relative_id(root, &p), p))
                .collect();
            if batch.is_empty() {
                break;
            }

            let ids: Vec<String> = batch.iter().map(|(id, _)| id.clone()).collect();
            let results = self.extractor.embed_all(batch).await;
            for (image_id, result) in ids.into_iter().zip(results) {
                match result {
                    Ok(embedding) => exemplars.push(SupportExample {
                        image_id,
                        class: class.to_string(),
                        embedding,
                    }),
                    Err(e) => set.warn(format!("Exemplar {image_id} skipped: {e}")),
                }
            }
        }
        exemplars
    }
}
