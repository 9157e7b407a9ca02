//! What the grid keeps about each cell once its predictions are on disk.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::metrics::CellMetrics;
use crate::types::SupportSet;

/// How a cell ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellStatus {
    /// Evaluated and persisted
    Ok,
    /// A classifier error stopped the cell
    Aborted,
    /// Not run because the grid was cancelled first
    Cancelled,
}

impl CellStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Aborted => "aborted",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for CellStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Summary of one (shot, threshold) cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellReport {
    pub shot_count: usize,
    pub threshold: f32,
    pub status: CellStatus,

    /// Classes with at least one exemplar
    pub support_classes: usize,
    pub support_exemplars: usize,

    /// Degraded-sample and omitted-class warnings from the support build
    pub support_warnings: usize,

    pub metrics: CellMetrics,

    /// Every non-fatal error seen in the cell, support warnings first
    pub errors: Vec<String>,

    /// `predictions.csv`, when the cell was persisted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub predictions_path: Option<PathBuf>,
}

impl CellReport {
    /// Report for a cell stopped by a classifier error.
    pub fn aborted(shot_count: usize, threshold: f32, support: &SupportSet, reason: String) -> Self {
        let mut errors = support.warnings().to_vec();
        errors.push(reason);
        Self {
            shot_count,
            threshold,
            status: CellStatus::Aborted,
            support_classes: support.class_count(),
            support_exemplars: support.exemplar_count(),
            support_warnings: support.warnings().len(),
            metrics: CellMetrics::default(),
            errors,
            predictions_path: None,
        }
    }

    /// Report for a cell never reached because of cancellation.
    pub fn cancelled(shot_count: usize, threshold: f32) -> Self {
        Self {
            shot_count,
            threshold,
            status: CellStatus::Cancelled,
            support_classes: 0,
            support_exemplars: 0,
            support_warnings: 0,
            metrics: CellMetrics::default(),
            errors: Vec::new(),
            predictions_path: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == CellStatus::Ok
    }
}
