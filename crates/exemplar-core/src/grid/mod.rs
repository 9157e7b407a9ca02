//! The shot × threshold experiment grid.
//!
//! Query embeddings are computed once, up front, on the extractor's worker
//! pool. Each shot row then builds one support set and scores every query
//! against it once; each threshold of the row only re-applies the decision and
//! persists the cell before moving on.

pub mod cell;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;

use crate::config::{validate_shot_counts, validate_thresholds, ExperimentConfig};
use crate::dataset::{CategoryLayout, ClassLabel, ClassRegistry, ImageLister, QueryCorpus};
use crate::error::{ConfigError, ExemplarError};
use crate::extract::FeatureExtractor;
use crate::results::{CellReport, ResultAggregator};
use crate::support::SupportSetBuilder;

pub use cell::{score_queries, ExperimentCell, QueryScores};

/// Where the grid is in its run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum GridState {
    Idle,
    BuildingSupport { shot_count: usize },
    Evaluating { shot_count: usize, threshold: f32 },
    Persisting { shot_count: usize, threshold: f32 },
    Completed,
    Cancelled,
    Failed { reason: String },
}

/// Shared cooperative cancellation flag, checked between cells.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Everything the grid produced, minus the predictions already on disk.
#[derive(Debug, Clone, Serialize)]
pub struct ExperimentGridResult {
    pub category: String,
    pub model: String,
    pub seed: u64,
    pub group_unknown: bool,
    pub query_count: usize,
    /// Registered classes with their display names
    pub classes: Vec<ClassLabel>,
    pub state: GridState,
    pub cells: Vec<CellReport>,
}

impl ExperimentGridResult {
    pub fn completed_cells(&self) -> usize {
        self.cells.iter().filter(|c| c.is_ok()).count()
    }
}

type CellCallback = Box<dyn Fn(&CellReport) + Send + Sync>;

/// Runs every (shot, threshold) cell for one category.
pub struct ExperimentGrid {
    layout: CategoryLayout,
    lister: ImageLister,
    extractor: FeatureExtractor,
    aggregator: ResultAggregator,
    model: String,
    seed: u64,
    group_unknown: bool,
    registry: Option<ClassRegistry>,
    cancel: CancellationFlag,
    state: GridState,
    on_cell: Option<CellCallback>,
}

impl ExperimentGrid {
    pub fn new(
        layout: CategoryLayout,
        lister: ImageLister,
        extractor: FeatureExtractor,
        aggregator: ResultAggregator,
        model: impl Into<String>,
        experiment: &ExperimentConfig,
    ) -> Self {
        Self {
            layout,
            lister,
            extractor,
            aggregator,
            model: model.into(),
            seed: experiment.seed,
            group_unknown: experiment.group_unknown,
            registry: None,
            cancel: CancellationFlag::new(),
            state: GridState::Idle,
            on_cell: None,
        }
    }

    /// Use an externally owned cancellation flag.
    pub fn with_cancellation(mut self, cancel: CancellationFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Call `callback` after each cell is reported.
    pub fn on_cell(mut self, callback: impl Fn(&CellReport) + Send + Sync + 'static) -> Self {
        self.on_cell = Some(Box::new(callback));
        self
    }

    pub fn cancellation_flag(&self) -> CancellationFlag {
        self.cancel.clone()
    }

    pub fn state(&self) -> &GridState {
        &self.state
    }

    pub fn layout(&self) -> &CategoryLayout {
        &self.layout
    }

    pub fn aggregator(&self) -> &ResultAggregator {
        &self.aggregator
    }

    /// Validate the category and load its class registry, once.
    pub fn registry(&mut self) -> Result<&ClassRegistry, ConfigError> {
        let registry = match self.registry.take() {
            Some(registry) => registry,
            None => {
                self.layout.validate()?;
                ClassRegistry::load(&self.layout)?
            }
        };
        Ok(self.registry.insert(registry))
    }

    /// Discover the query corpus against the registry.
    pub fn query_corpus(&mut self) -> Result<QueryCorpus, ConfigError> {
        let lister = self.lister.clone();
        let layout = self.layout.clone();
        let registry = self.registry()?;
        Ok(QueryCorpus::discover(&layout, registry, &lister))
    }

    /// Run every cell in shot-major order.
    ///
    /// Configuration problems fail the grid before any cell runs. A classifier
    /// error aborts only the affected cells, and cancellation stops between
    /// cells. Persistence errors stop the grid; cells already written stay on
    /// disk and are summarized before the error is returned.
    pub async fn run(
        &mut self,
        shot_counts: &[usize],
        thresholds: &[f32],
        corpus: &QueryCorpus,
    ) -> Result<ExperimentGridResult, ExemplarError> {
        self.state = GridState::Idle;

        let class_list = match self.prepare(shot_counts, thresholds) {
            Ok(classes) => classes,
            Err(e) => {
                tracing::error!("Grid failed before start: {e}");
                self.state = GridState::Failed {
                    reason: e.to_string(),
                };
                return Err(e.into());
            }
        };

        tracing::info!(
            "Grid {:?}: {} shot(s) × {} threshold(s), {} class(es), {} query image(s)",
            self.layout.name(),
            shot_counts.len(),
            thresholds.len(),
            class_list.len(),
            corpus.len()
        );
        if corpus.is_empty() {
            tracing::warn!("Query corpus is empty; cells will have no predictions");
        }

        let queries = corpus.images();
        let embeddings = self
            .extractor
            .embed_all(
                queries
                    .iter()
                    .map(|q| (q.image_id.clone(), q.path.clone()))
                    .collect(),
            )
            .await;
        let failed = embeddings.iter().filter(|e| e.is_err()).count();
        if failed > 0 {
            tracing::warn!("{failed} of {} query image(s) could not be embedded", queries.len());
        }

        let builder = SupportSetBuilder::new(
            self.layout.clone(),
            self.lister.clone(),
            self.extractor.clone(),
        );
        let mut cells = Vec::with_capacity(shot_counts.len() * thresholds.len());
        let mut cancelled = false;

        'rows: for &shot_count in shot_counts {
            if self.cancel.is_cancelled() {
                cancelled = true;
                break 'rows;
            }
            self.state = GridState::BuildingSupport { shot_count };
            let support = builder.build(&class_list, shot_count, self.seed).await;
            let scored = score_queries(&embeddings, &support);

            for &threshold in thresholds {
                if self.cancel.is_cancelled() {
                    cancelled = true;
                    break 'rows;
                }
                self.state = GridState::Evaluating {
                    shot_count,
                    threshold,
                };

                let report = match &scored {
                    Ok(scores) => {
                        let cell = ExperimentCell::evaluate(
                            &support,
                            threshold,
                            queries,
                            scores,
                            self.group_unknown,
                        );
                        self.state = GridState::Persisting {
                            shot_count,
                            threshold,
                        };
                        match self.aggregator.persist_cell(&cell, queries) {
                            Ok(report) => report,
                            Err(e) => {
                                tracing::error!("Persisting shot={shot_count} threshold={threshold} failed: {e}");
                                self.state = GridState::Failed {
                                    reason: e.to_string(),
                                };
                                self.summarize_partial(cells, queries.len());
                                return Err(e.into());
                            }
                        }
                    }
                    Err(e) => {
                        tracing::error!("Cell shot={shot_count} threshold={threshold} aborted: {e}");
                        CellReport::aborted(shot_count, threshold, &support, e.to_string())
                    }
                };

                tracing::info!(
                    "Cell shot={} threshold={}: {} accuracy={} unknown_rate={}",
                    shot_count,
                    threshold,
                    report.status,
                    fmt_metric(report.metrics.accuracy),
                    fmt_metric(report.metrics.unknown_rate)
                );
                if let Some(callback) = &self.on_cell {
                    callback(&report);
                }
                cells.push(report);
            }
        }

        if cancelled {
            let done = cells.len();
            for (i, (shot_count, threshold)) in grid_order(shot_counts, thresholds).enumerate() {
                if i >= done {
                    cells.push(CellReport::cancelled(shot_count, threshold));
                }
            }
            tracing::warn!("Grid cancelled after {done} cell(s)");
            self.state = GridState::Cancelled;
        } else {
            self.state = GridState::Completed;
        }

        Ok(self.result(cells, queries.len()))
    }

    fn result(&self, cells: Vec<CellReport>, query_count: usize) -> ExperimentGridResult {
        ExperimentGridResult {
            category: self.layout.name(),
            model: self.model.clone(),
            seed: self.seed,
            group_unknown: self.group_unknown,
            query_count,
            classes: self
                .registry
                .as_ref()
                .map(|r| r.labels().cloned().collect())
                .unwrap_or_default(),
            state: self.state.clone(),
            cells,
        }
    }

    /// Best-effort summary of the cells persisted before a fatal write error.
    fn summarize_partial(&self, cells: Vec<CellReport>, query_count: usize) {
        if cells.is_empty() {
            return;
        }
        let partial = self.result(cells, query_count);
        match self.aggregator.finalize(&partial) {
            Ok(summary) => tracing::warn!(
                "Summary of {} completed cell(s) written to {:?}",
                summary.rows,
                summary.csv_path
            ),
            Err(e) => tracing::error!("Could not write partial summary: {e}"),
        }
    }

    /// Check the axes and inputs; returns the classes to sample.
    fn prepare(&mut self, shot_counts: &[usize], thresholds: &[f32]) -> Result<Vec<String>, ConfigError> {
        validate_shot_counts(shot_counts)?;
        validate_thresholds(thresholds)?;
        let registry = self.registry()?;
        Ok(registry.known_classes())
    }
}

/// Every (shot, threshold) pair in run order.
pub fn grid_order<'a>(
    shot_counts: &'a [usize],
    thresholds: &'a [f32],
) -> impl Iterator<Item = (usize, f32)> + 'a {
    shot_counts
        .iter()
        .flat_map(move |&s| thresholds.iter().map(move |&t| (s, t)))
}

fn fmt_metric(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.3}")).unwrap_or_else(|| "-".to_string())
}
