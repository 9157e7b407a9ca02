//! One (shot, threshold) evaluation.

use crate::classify::{ClassScores, SimilarityClassifier};
use crate::error::{ClassifierError, ExtractionError};
use crate::types::{Embedding, PredictionRecord, QueryImage, SupportSet};

/// Scores of one query for a shot row, or the reason it has none.
pub type QueryScores = Result<ClassScores, ExtractionError>;

/// Score every query embedding against a support set once.
///
/// Failed embeddings pass through as errors. Any classifier error fails the
/// whole row, since every cell of the row shares this support set.
pub fn score_queries(
    embeddings: &[Result<Embedding, ExtractionError>],
    support: &SupportSet,
) -> Result<Vec<QueryScores>, ClassifierError> {
    if support.is_empty() {
        return Err(ClassifierError::EmptySupportSet {
            shot_count: support.shot_count(),
        });
    }
    embeddings
        .iter()
        .map(|embedding| match embedding {
            Ok(e) => SimilarityClassifier::score(e, support).map(Ok),
            Err(e) => Ok(Err(e.clone())),
        })
        .collect()
}

/// A cell and its predictions, alive only until persisted.
pub struct ExperimentCell<'a> {
    pub shot_count: usize,
    pub threshold: f32,
    pub support: &'a SupportSet,
    pub records: Vec<PredictionRecord>,
}

impl<'a> ExperimentCell<'a> {
    /// Apply `threshold` to precomputed scores, one record per query.
    pub fn evaluate(
        support: &'a SupportSet,
        threshold: f32,
        queries: &[QueryImage],
        scores: &[QueryScores],
        group_unknown: bool,
    ) -> Self {
        let records = queries
            .iter()
            .zip(scores)
            .map(|(query, scored)| match scored {
                Ok(s) => SimilarityClassifier::decide(query, s, threshold, group_unknown),
                Err(e) => PredictionRecord::failed(query, e.to_string(), group_unknown),
            })
            .collect();

        Self {
            shot_count: support.shot_count(),
            threshold,
            support,
            records,
        }
    }

    /// Support warnings followed by per-image failures.
    pub fn errors(&self) -> Vec<String> {
        let mut errors = self.support.warnings().to_vec();
        errors.extend(self.records.iter().filter_map(|r| {
            r.error
                .as_ref()
                .map(|message| format!("{}: {message}", r.image_id))
        }));
        errors
    }

    pub fn failed_count(&self) -> usize {
        self.records.iter().filter(|r| !r.is_valid()).count()
    }
}
