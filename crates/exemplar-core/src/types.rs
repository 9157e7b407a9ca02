//! Core data types shared by the extractor, classifier and grid.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

/// An L2-normalized embedding, shared between the cache and every support set using it.
pub type Embedding = Arc<[f32]>;

/// Predicted label for threshold-rejected queries, and the grouped reporting bucket.
pub const UNKNOWN_LABEL: &str = "unknown";

/// Folder prefix marking open-set negative classes.
pub const OPEN_SET_PREFIX: &str = "unknown_";

/// Whether a class name denotes an open-set negative.
pub fn is_open_set(class: &str) -> bool {
    class.starts_with(OPEN_SET_PREFIX)
}

/// Reporting bucket for a ground-truth class.
///
/// With `group_unknown`, every `unknown_*` subtype reports as `"unknown"`.
/// This is independent of whether the prediction itself was rejected.
pub fn reporting_bucket(true_class: &str, group_unknown: bool) -> String {
    if group_unknown && is_open_set(true_class) {
        UNKNOWN_LABEL.to_string()
    } else {
        true_class.to_string()
    }
}

/// An image to classify.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryImage {
    /// Path relative to the query corpus root, `/`-separated
    pub image_id: String,

    /// Absolute or caller-relative path on disk
    pub path: PathBuf,

    /// Containing folder name, if the image sits in a class folder
    #[serde(skip_serializing_if = "Option::is_none")]
    pub true_class: Option<String>,
}

/// One embedded reference sample of a class.
#[derive(Debug, Clone)]
pub struct SupportExample {
    /// Path relative to the category root, `/`-separated
    pub image_id: String,

    /// Class folder name
    pub class: String,

    /// Unit-length embedding
    pub embedding: Embedding,
}

/// Sampled exemplars for one shot-count, keyed by class name.
#[derive(Debug, Clone, Default)]
pub struct SupportSet {
    classes: BTreeMap<String, Vec<SupportExample>>,
    shot_count: usize,
    seed: u64,
    warnings: Vec<String>,
}

impl SupportSet {
    /// Create an empty support set for `shot_count` built from `seed`.
    pub fn new(shot_count: usize, seed: u64) -> Self {
        Self {
            classes: BTreeMap::new(),
            shot_count,
            seed,
            warnings: Vec::new(),
        }
    }

    /// Add a class with its exemplars. Empty lists are ignored.
    pub fn insert(&mut self, class: impl Into<String>, exemplars: Vec<SupportExample>) {
        if !exemplars.is_empty() {
            self.classes.insert(class.into(), exemplars);
        }
    }

    /// Record a non-fatal build warning.
    pub fn warn(&mut self, message: String) {
        tracing::warn!("{message}");
        self.warnings.push(message);
    }

    /// Classes in lexicographic order, each with at least one exemplar.
    pub fn classes(&self) -> impl Iterator<Item = (&str, &[SupportExample])> {
        self.classes.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn class_names(&self) -> Vec<&str> {
        self.classes.keys().map(String::as_str).collect()
    }

    pub fn exemplars(&self, class: &str) -> Option<&[SupportExample]> {
        self.classes.get(class).map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    pub fn exemplar_count(&self) -> usize {
        self.classes.values().map(Vec::len).sum()
    }

    pub fn shot_count(&self) -> usize {
        self.shot_count
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Selected image ids per class, for comparing two builds.
    pub fn image_ids(&self) -> BTreeMap<String, Vec<String>> {
        self.classes
            .iter()
            .map(|(class, ex)| {
                (
                    class.clone(),
                    ex.iter().map(|e| e.image_id.clone()).collect(),
                )
            })
            .collect()
    }
}

/// Outcome of classifying one query in one cell.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionRecord {
    /// Query image id
    pub image_id: String,

    /// Ground-truth class folder
    pub true_class: Option<String>,

    /// Ground truth as reported in metrics (grouped when `group_unknown`)
    pub reported_class: Option<String>,

    /// Predicted class, or `"unknown"` when rejected or failed
    pub predicted_class: String,

    /// Arg-max class before threshold rejection
    pub best_class: Option<String>,

    /// Highest per-class similarity, in [-1, 1]
    pub best_score: f32,

    /// Nearest-exemplar similarity per support class
    pub scores: BTreeMap<String, f32>,

    /// True iff `best_score < threshold`
    pub is_unknown: bool,

    /// Extraction failure, if the query could not be embedded
    pub error: Option<String>,
}

impl PredictionRecord {
    /// Record for a query whose embedding could not be computed.
    pub fn failed(query: &QueryImage, error: String, group_unknown: bool) -> Self {
        Self {
            image_id: query.image_id.clone(),
            true_class: query.true_class.clone(),
            reported_class: query
                .true_class
                .as_deref()
                .map(|c| reporting_bucket(c, group_unknown)),
            predicted_class: UNKNOWN_LABEL.to_string(),
            best_class: None,
            best_score: f32::NAN,
            scores: BTreeMap::new(),
            is_unknown: false,
            error: Some(error),
        }
    }

    /// Whether this record holds a successful classification.
    pub fn is_valid(&self) -> bool {
        self.error.is_none()
    }

    /// Whether the decision matches the ground truth.
    ///
    /// Open-set ground truth is correct when rejected; known ground truth is correct
    /// when predicted exactly. `None` without ground truth or for failed records.
    pub fn is_correct(&self) -> Option<bool> {
        if !self.is_valid() {
            return None;
        }
        let truth = self.true_class.as_deref()?;
        Some(if is_open_set(truth) {
            self.is_unknown
        } else {
            !self.is_unknown && self.predicted_class == truth
        })
    }
}
