//! Explicit owner of the backbone handle and the embedding cache.

use std::sync::Arc;

use crate::config::Config;
use crate::dataset::{CategoryLayout, ImageLister};
use crate::embedding::EmbeddingProvider;
use crate::error::ConfigError;
use crate::extract::{CacheStats, FeatureExtractor};
use crate::grid::ExperimentGrid;
use crate::results::ResultAggregator;

/// One experiment session: validated config, backbone and cache.
///
/// Nothing here is global. Grids created from the same context share the
/// embedding cache, so re-running a category embeds nothing twice.
pub struct ExperimentContext {
    config: Config,
    extractor: FeatureExtractor,
}

impl ExperimentContext {
    /// Validate `config` and wire the backbone into a fresh extractor.
    pub fn initialize(
        config: Config,
        provider: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        tracing::debug!(
            "Initializing Exemplar v{} with backbone {:?}",
            crate::VERSION,
            provider.model_id()
        );
        let extractor = FeatureExtractor::new(provider, &config);
        Ok(Self { config, extractor })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn extractor(&self) -> &FeatureExtractor {
        &self.extractor
    }

    /// A grid over `category`, configured from `[experiment]` and `[output]`.
    pub fn grid(&self, category: CategoryLayout) -> ExperimentGrid {
        let model = self.config.model_label();
        let aggregator = ResultAggregator::new(category.clone(), model.clone())
            .with_visualize(self.config.experiment.visualize)
            .with_json_summary(self.config.output.write_json_summary);
        ExperimentGrid::new(
            category,
            ImageLister::new(&self.config.processing),
            self.extractor.clone(),
            aggregator,
            model,
            &self.config.experiment,
        )
    }

    /// Release the cache, returning its final statistics.
    pub fn dispose(self) -> CacheStats {
        let stats = self.extractor.cache_stats();
        tracing::info!(
            "Embedding cache: {} entries, {} computed, {} hit(s)",
            stats.entries,
            stats.computed,
            stats.hits
        );
        self.extractor.clear_cache();
        stats
    }
}
