//! Result persistence and metrics.
//!
//! Each cell streams its predictions to `predictions.csv` as soon as it is
//! evaluated; only the [`CellReport`] is kept. [`ResultAggregator::finalize`]
//! turns the reports into `summary.csv` and `summary.json`.

pub mod aggregate;
pub mod metrics;
pub mod report;
pub mod writer;

pub use aggregate::{ResultAggregator, Summary};
pub use metrics::{CellMetrics, ClassMetrics, MetricsAccumulator};
pub use report::{CellReport, CellStatus};
pub use writer::{PredictionWriter, PREDICTIONS_FILE};
