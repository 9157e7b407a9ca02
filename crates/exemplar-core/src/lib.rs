//! Exemplar Core - few-shot open-set image classification.
//!
//! Exemplar classifies query images by nearest-exemplar cosine similarity
//! against a small support set per class, rejecting low-confidence queries as
//! `"unknown"`. It sweeps a grid of shot-counts and rejection thresholds and
//! writes reproducible prediction tables and summary metrics.
//!
//! # Architecture
//!
//! ```text
//! Query corpus ─→ FeatureExtractor ─┐
//!                                   ├→ SimilarityClassifier → ResultAggregator
//! Support pool → SupportSetBuilder ─┘        (per shot × threshold cell)
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use exemplar_core::{CategoryLayout, Config, EmbeddingEngine, ExperimentContext};
//!
//! #[tokio::main]
//! async fn main() -> exemplar_core::Result<()> {
//!     let config = Config::load()?;
//!     let engine = EmbeddingEngine::load(&config.embedding, &config.model_dir())?;
//!     let context = ExperimentContext::initialize(config, Arc::new(engine))?;
//!
//!     let mut grid = context.grid(CategoryLayout::new("./data/birds"));
//!     let corpus = grid.query_corpus()?;
//!     let result = grid.run(&[1, 5, 10], &[0.5, 0.7, 0.9], &corpus).await?;
//!     grid.aggregator().finalize(&result)?;
//!     context.dispose();
//!     Ok(())
//! }
//! ```

pub mod classify;
pub mod config;
pub mod context;
pub mod dataset;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod grid;
pub mod math;
pub mod results;
pub mod support;
pub mod types;

pub use classify::{ClassScores, SimilarityClassifier};
pub use config::Config;
pub use context::ExperimentContext;
pub use dataset::{CategoryLayout, ClassLabel, ClassRegistry, ImageLister, QueryCorpus};
pub use embedding::{EmbeddingEngine, EmbeddingProvider};
pub use error::{
    ClassifierError, ConfigError, ExemplarError, ExtractionError, PersistenceError, Result,
};
pub use extract::{CacheStats, FeatureExtractor};
pub use grid::{CancellationFlag, ExperimentCell, ExperimentGrid, ExperimentGridResult, GridState};
pub use results::{
    CellMetrics, CellReport, CellStatus, ResultAggregator, Summary, PREDICTIONS_FILE,
};
pub use support::SupportSetBuilder;
pub use types::{
    Embedding, PredictionRecord, QueryImage, SupportExample, SupportSet, UNKNOWN_LABEL,
};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
