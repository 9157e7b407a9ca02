//! Writes cell artifacts and rolls finished cells into the cross-cell summary.

use std::collections::BTreeSet;
use std::fs::File;
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::metrics::MetricsAccumulator;
use super::report::{CellReport, CellStatus};
use super::writer::{format_ratio, PredictionWriter};
use crate::dataset::{CategoryLayout, ClassLabel};
use crate::error::PersistenceError;
use crate::grid::{ExperimentCell, ExperimentGridResult};
use crate::types::QueryImage;

const SUMMARY_COLUMNS: [&str; 14] = [
    "shot_count",
    "threshold",
    "status",
    "support_classes",
    "support_exemplars",
    "degraded_warnings",
    "total",
    "valid",
    "failed",
    "failed_fraction",
    "accuracy",
    "known_accuracy",
    "unknown_rate",
    "error_count",
];

/// Where the summary landed.
#[derive(Debug, Clone)]
pub struct Summary {
    pub csv_path: PathBuf,
    pub json_path: Option<PathBuf>,
    pub rows: usize,
    /// Labels with precision/recall columns, sorted
    pub labels: Vec<String>,
}

/// `summary.json` document.
#[derive(Serialize)]
struct SummaryDocument<'a> {
    version: &'static str,
    category: &'a str,
    model: &'a str,
    seed: u64,
    group_unknown: bool,
    query_count: usize,
    classes: &'a [ClassLabel],
    state: &'a crate::grid::GridState,
    cells: &'a [CellReport],
}

/// Persists per-cell predictions and the final summary for one category and model.
#[derive(Debug, Clone)]
pub struct ResultAggregator {
    layout: CategoryLayout,
    model: String,
    visualize: bool,
    write_json: bool,
}

impl ResultAggregator {
    pub fn new(layout: CategoryLayout, model: impl Into<String>) -> Self {
        Self {
            layout,
            model: model.into(),
            visualize: false,
            write_json: true,
        }
    }

    /// Copy each query image under `vis/<predicted_class>/`.
    pub fn with_visualize(mut self, visualize: bool) -> Self {
        self.visualize = visualize;
        self
    }

    /// Write `summary.json` next to `summary.csv`.
    pub fn with_json_summary(mut self, write_json: bool) -> Self {
        self.write_json = write_json;
        self
    }

    pub fn results_root(&self) -> PathBuf {
        self.layout.results_root(&self.model)
    }

    /// Write one cell's `predictions.csv` and compute its metrics.
    ///
    /// `queries` must be in the same order as `cell.records`.
    pub fn persist_cell(
        &self,
        cell: &ExperimentCell<'_>,
        queries: &[QueryImage],
    ) -> Result<CellReport, PersistenceError> {
        let dir = self
            .layout
            .cell_dir(&self.model, cell.shot_count, cell.threshold);
        let mut writer = PredictionWriter::create(&dir, self.visualize)?;
        let mut metrics = MetricsAccumulator::default();

        for (query, record) in queries.iter().zip(&cell.records) {
            writer.write(query, record)?;
            metrics.add(record);
        }
        let path = writer.finish()?;

        Ok(CellReport {
            shot_count: cell.shot_count,
            threshold: cell.threshold,
            status: CellStatus::Ok,
            support_classes: cell.support.class_count(),
            support_exemplars: cell.support.exemplar_count(),
            support_warnings: cell.support.warnings().len(),
            metrics: metrics.finish(),
            errors: cell.errors(),
            predictions_path: Some(path),
        })
    }

    /// Write `summary.csv` (and `summary.json`) for a finished grid.
    pub fn finalize(&self, result: &ExperimentGridResult) -> Result<Summary, PersistenceError> {
        let root = self.results_root();
        std::fs::create_dir_all(&root).map_err(|source| PersistenceError::Write {
            path: root.clone(),
            source,
        })?;

        let labels: Vec<String> = result
            .cells
            .iter()
            .flat_map(|c| c.metrics.per_class.keys().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let csv_path = self.layout.summary_csv(&self.model);
        write_summary_csv(&csv_path, &result.cells, &labels)?;

        let json_path = if self.write_json {
            let path = self.layout.summary_json(&self.model);
            let doc = SummaryDocument {
                version: crate::VERSION,
                category: &result.category,
                model: &result.model,
                seed: result.seed,
                group_unknown: result.group_unknown,
                query_count: result.query_count,
                classes: &result.classes,
                state: &result.state,
                cells: &result.cells,
            };
            write_json(&path, &doc)?;
            Some(path)
        } else {
            None
        };

        tracing::info!(
            "Summary: {} cell(s) written to {:?}",
            result.cells.len(),
            csv_path
        );
        Ok(Summary {
            csv_path,
            json_path,
            rows: result.cells.len(),
            labels,
        })
    }
}

fn write_summary_csv(
    path: &Path,
    cells: &[CellReport],
    labels: &[String],
) -> Result<(), PersistenceError> {
    let csv_err = |source: csv::Error| PersistenceError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut writer = csv::Writer::from_path(path).map_err(csv_err)?;

    let mut header: Vec<String> = SUMMARY_COLUMNS.iter().map(|c| c.to_string()).collect();
    for label in labels {
        header.push(format!("precision_{label}"));
        header.push(format!("recall_{label}"));
    }
    writer.write_record(&header).map_err(csv_err)?;

    for cell in cells {
        let m = &cell.metrics;
        let mut row = vec![
            cell.shot_count.to_string(),
            crate::dataset::layout::threshold_label(cell.threshold),
            cell.status.to_string(),
            cell.support_classes.to_string(),
            cell.support_exemplars.to_string(),
            cell.support_warnings.to_string(),
            m.total.to_string(),
            m.valid.to_string(),
            m.failed.to_string(),
            format!("{:.6}", m.failed_fraction),
            format_ratio(m.accuracy),
            format_ratio(m.known_accuracy),
            format_ratio(m.unknown_rate),
            cell.errors.len().to_string(),
        ];
        for label in labels {
            let class = m.per_class.get(label);
            row.push(format_ratio(class.and_then(|c| c.precision)));
            row.push(format_ratio(class.and_then(|c| c.recall)));
        }
        writer.write_record(&row).map_err(csv_err)?;
    }

    writer.flush().map_err(|source| PersistenceError::Write {
        path: path.to_path_buf(),
        source,
    })
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), PersistenceError> {
    let file = File::create(path).map_err(|source| PersistenceError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::to_writer_pretty(file, value).map_err(|source| PersistenceError::Json {
        path: path.to_path_buf(),
        source,
    })
}
