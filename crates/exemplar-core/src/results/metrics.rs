//! Per-cell evaluation metrics.
//!
//! Metrics are accumulated one record at a time so a cell never needs to keep
//! its predictions after they are written.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::PredictionRecord;

/// Precision and recall for one label.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    /// Records predicted as this label
    pub predicted: usize,

    /// Records whose reporting bucket is this label
    pub actual: usize,

    /// Correct records predicted as this label
    pub correct_predicted: usize,

    /// Correct records whose reporting bucket is this label
    pub correct_actual: usize,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub precision: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub recall: Option<f64>,
}

/// Derived metrics for one (shot, threshold) cell.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CellMetrics {
    /// Queries in the cell, failed ones included
    pub total: usize,

    /// Queries that produced a classification
    pub valid: usize,

    /// Queries whose embedding failed
    pub failed: usize,

    pub failed_fraction: f64,

    /// Correct over valid records with ground truth
    pub accuracy: Option<f64>,

    /// Correct over valid, non-rejected records with ground truth
    pub known_accuracy: Option<f64>,

    /// Rejected over valid records
    pub unknown_rate: Option<f64>,

    /// Keyed by predicted label and reporting bucket
    pub per_class: BTreeMap<String, ClassMetrics>,

    /// Reporting bucket → predicted label → count
    pub confusion: BTreeMap<String, BTreeMap<String, usize>>,
}

impl CellMetrics {
    /// Compute metrics over a finished list of records.
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a PredictionRecord>) -> Self {
        let mut acc = MetricsAccumulator::default();
        for record in records {
            acc.add(record);
        }
        acc.finish()
    }
}

/// Streaming metrics builder.
#[derive(Debug, Default)]
pub struct MetricsAccumulator {
    total: usize,
    valid: usize,
    failed: usize,
    rejected: usize,
    labelled: usize,
    correct: usize,
    accepted_labelled: usize,
    accepted_correct: usize,
    per_class: BTreeMap<String, ClassMetrics>,
    confusion: BTreeMap<String, BTreeMap<String, usize>>,
}

impl MetricsAccumulator {
    pub fn add(&mut self, record: &PredictionRecord) {
        self.total += 1;
        if !record.is_valid() {
            self.failed += 1;
            return;
        }
        self.valid += 1;
        if record.is_unknown {
            self.rejected += 1;
        }

        let (Some(correct), Some(bucket)) = (record.is_correct(), record.reported_class.as_deref())
        else {
            return;
        };

        self.labelled += 1;
        if correct {
            self.correct += 1;
        }
        if !record.is_unknown {
            self.accepted_labelled += 1;
            if correct {
                self.accepted_correct += 1;
            }
        }

        let predicted = self
            .per_class
            .entry(record.predicted_class.clone())
            .or_default();
        predicted.predicted += 1;
        if correct {
            predicted.correct_predicted += 1;
        }

        let actual = self.per_class.entry(bucket.to_string()).or_default();
        actual.actual += 1;
        if correct {
            actual.correct_actual += 1;
        }

        *self
            .confusion
            .entry(bucket.to_string())
            .or_default()
            .entry(record.predicted_class.clone())
            .or_default() += 1;
    }

    pub fn finish(self) -> CellMetrics {
        let per_class = self
            .per_class
            .into_iter()
            .map(|(label, mut m)| {
                m.precision = ratio(m.correct_predicted, m.predicted);
                m.recall = ratio(m.correct_actual, m.actual);
                (label, m)
            })
            .collect();

        CellMetrics {
            total: self.total,
            valid: self.valid,
            failed: self.failed,
            failed_fraction: ratio(self.failed, self.total).unwrap_or(0.0),
            accuracy: ratio(self.correct, self.labelled),
            known_accuracy: ratio(self.accepted_correct, self.accepted_labelled),
            unknown_rate: ratio(self.rejected, self.valid),
            per_class,
            confusion: self.confusion,
        }
    }
}

fn ratio(numerator: usize, denominator: usize) -> Option<f64> {
    (denominator > 0).then(|| numerator as f64 / denominator as f64)
}
