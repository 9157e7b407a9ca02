//! Nearest-exemplar similarity classification with open-set rejection.
//!
//! Scoring and deciding are separate steps. [`SimilarityClassifier::score`]
//! depends only on the query and the support set, so a grid row scores every
//! query once and [`SimilarityClassifier::decide`] applies each threshold to
//! the same scores.

use std::collections::BTreeMap;

use crate::error::ClassifierError;
use crate::math::cosine;
use crate::types::{reporting_bucket, PredictionRecord, QueryImage, SupportSet, UNKNOWN_LABEL};

/// Threshold-independent scores of one query against one support set.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassScores {
    scores: BTreeMap<String, f32>,
    best_class: String,
    best_score: f32,
}

impl ClassScores {
    /// Nearest-exemplar similarity per class.
    pub fn scores(&self) -> &BTreeMap<String, f32> {
        &self.scores
    }

    /// Arg-max class; ties resolve to the lexicographically smallest name.
    pub fn best_class(&self) -> &str {
        &self.best_class
    }

    pub fn best_score(&self) -> f32 {
        self.best_score
    }

    /// Whether the query is rejected as unknown at `threshold`.
    pub fn is_rejected(&self, threshold: f32) -> bool {
        self.best_score < threshold
    }
}

/// Stateless similarity classifier.
pub struct SimilarityClassifier;

impl SimilarityClassifier {
    /// Score a unit query embedding against every class of the support set.
    ///
    /// A class scores the maximum cosine similarity over its exemplars.
    pub fn score(query: &[f32], support: &SupportSet) -> Result<ClassScores, ClassifierError> {
        if support.is_empty() {
            return Err(ClassifierError::EmptySupportSet {
                shot_count: support.shot_count(),
            });
        }

        let mut scores = BTreeMap::new();
        let mut best: Option<(&str, f32)> = None;

        // `classes()` iterates in ascending name order, so a strict `>` keeps
        // the smallest name on ties.
        for (class, exemplars) in support.classes() {
            let mut class_best = f32::NEG_INFINITY;
            for exemplar in exemplars {
                if exemplar.embedding.len() != query.len() {
                    return Err(ClassifierError::DimensionMismatch {
                        query: query.len(),
                        exemplar: exemplar.embedding.len(),
                    });
                }
                class_best = class_best.max(cosine(query, &exemplar.embedding));
            }
            scores.insert(class.to_string(), class_best);
            if best.map_or(true, |(_, s)| class_best > s) {
                best = Some((class, class_best));
            }
        }

        let (best_class, best_score) = best.ok_or(ClassifierError::EmptySupportSet {
            shot_count: support.shot_count(),
        })?;
        Ok(ClassScores {
            best_class: best_class.to_string(),
            best_score,
            scores,
        })
    }

    /// Apply the open-set threshold to precomputed scores.
    pub fn decide(
        query: &QueryImage,
        scores: &ClassScores,
        threshold: f32,
        group_unknown: bool,
    ) -> PredictionRecord {
        let is_unknown = scores.is_rejected(threshold);
        let predicted_class = if is_unknown {
            UNKNOWN_LABEL.to_string()
        } else {
            scores.best_class.clone()
        };

        PredictionRecord {
            image_id: query.image_id.clone(),
            true_class: query.true_class.clone(),
            reported_class: query
                .true_class
                .as_deref()
                .map(|c| reporting_bucket(c, group_unknown)),
            predicted_class,
            best_class: Some(scores.best_class.clone()),
            best_score: scores.best_score,
            scores: scores.scores.clone(),
            is_unknown,
            error: None,
        }
    }

    /// Score and decide in one step.
    pub fn classify(
        query: &QueryImage,
        query_embedding: &[f32],
        support: &SupportSet,
        threshold: f32,
        group_unknown: bool,
    ) -> Result<PredictionRecord, ClassifierError> {
        let scores = Self::score(query_embedding, support)?;
        Ok(Self::decide(query, &scores, threshold, group_unknown))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::l2_normalize_in_place;
    use crate::types::SupportExample;
    use std::path::PathBuf;
    use std::sync::Arc;

    fn unit(v: &[f32]) -> Vec<f32> {
        let mut v = v.to_vec();
        l2_normalize_in_place(&mut v);
        v
    }

    fn support(classes: &[(&str, &[&[f32]])]) -> SupportSet {
        let mut set = SupportSet::new(2, 0);
        for (class, vectors) in classes {
            let exemplars = vectors
                .iter()
                .enumerate()
                .map(|(i, v)| SupportExample {
                    image_id: format!("{class}/{i}.png"),
                    class: class.to_string(),
                    embedding: Arc::from(unit(v)),
                })
                .collect();
            set.insert(*class, exemplars);
        }
        set
    }

    fn query(true_class: &str) -> QueryImage {
        QueryImage {
            image_id: format!("{true_class}/q.png"),
            path: PathBuf::from("q.png"),
            true_class: Some(true_class.to_string()),
        }
    }

    #[test]
    fn test_identical_exemplar_scores_one() {
        let set = support(&[("finch", &[&[0.3, 0.5, -0.2]]), ("wren", &[&[-1.0, 0.2, 0.0]])]);
        let q = unit(&[0.3, 0.5, -0.2]);
        let record = SimilarityClassifier::classify(&query("finch"), &q, &set, 0.5, true).unwrap();
        assert!((record.best_score - 1.0).abs() < 1e-6);
        assert_eq!(record.predicted_class, "finch");
        assert!(!record.is_unknown);
    }

    #[test]
    fn test_nearest_exemplar_not_centroid() {
        // The finch centroid is the zero vector; the nearest exemplar still matches.
        let set = support(&[("finch", &[&[1.0, 0.0], &[-1.0, 0.0]]), ("wren", &[&[0.8, 0.6]])]);
        let scores = SimilarityClassifier::score(&[1.0, 0.0], &set).unwrap();
        assert_eq!(scores.best_class(), "finch");
        assert!((scores.scores()["finch"] - 1.0).abs() < 1e-6);
        assert!((scores.scores()["wren"] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_tie_breaks_to_smallest_name() {
        let set = support(&[("wren", &[&[1.0, 0.0]]), ("finch", &[&[1.0, 0.0]])]);
        let scores = SimilarityClassifier::score(&[1.0, 0.0], &set).unwrap();
        assert_eq!(scores.best_class(), "finch");
    }

    #[test]
    fn test_threshold_rejection_keeps_best_class() {
        let set = support(&[("finch", &[&[1.0, 0.0]])]);
        let q = unit(&[1.0, 1.0]);
        let record = SimilarityClassifier::classify(&query("finch"), &q, &set, 0.9, false).unwrap();
        assert!(record.is_unknown);
        assert_eq!(record.predicted_class, UNKNOWN_LABEL);
        assert_eq!(record.best_class.as_deref(), Some("finch"));
        assert!(record.best_score < 0.9);
    }

    #[test]
    fn test_score_equal_to_threshold_is_accepted() {
        let set = support(&[("finch", &[&[1.0, 0.0]])]);
        let scores = SimilarityClassifier::score(&[1.0, 0.0], &set).unwrap();
        assert!(!scores.is_rejected(scores.best_score()));
    }

    #[test]
    fn test_unknown_count_monotonic_in_threshold() {
        let set = support(&[("finch", &[&[1.0, 0.0, 0.0]]), ("wren", &[&[0.0, 1.0, 0.0]])]);
        let queries: Vec<Vec<f32>> = (0..40)
            .map(|i| {
                let t = i as f32 / 7.0;
                unit(&[t.cos(), t.sin(), (t * 0.3).sin()])
            })
            .collect();
        let scores: Vec<ClassScores> = queries
            .iter()
            .map(|q| SimilarityClassifier::score(q, &set).unwrap())
            .collect();

        let mut previous = 0;
        for step in 0..=20 {
            let threshold = -1.0 + step as f32 * 0.1;
            let unknown = scores.iter().filter(|s| s.is_rejected(threshold)).count();
            assert!(unknown >= previous, "threshold {threshold}");
            previous = unknown;
        }
    }

    #[test]
    fn test_grouping_independent_of_rejection() {
        let set = support(&[("finch", &[&[1.0, 0.0]])]);
        let q = query("unknown_background");

        let accepted = SimilarityClassifier::classify(&q, &[1.0, 0.0], &set, 0.5, true).unwrap();
        assert!(!accepted.is_unknown);
        assert_eq!(accepted.predicted_class, "finch");
        assert_eq!(accepted.reported_class.as_deref(), Some("unknown"));
        assert_eq!(accepted.true_class.as_deref(), Some("unknown_background"));

        let ungrouped = SimilarityClassifier::classify(&q, &[1.0, 0.0], &set, 0.5, false).unwrap();
        assert_eq!(
            ungrouped.reported_class.as_deref(),
            Some("unknown_background")
        );
    }

    #[test]
    fn test_empty_support_set_is_error() {
        let set = SupportSet::new(5, 0);
        let err = SimilarityClassifier::score(&[1.0], &set).unwrap_err();
        assert_eq!(err, ClassifierError::EmptySupportSet { shot_count: 5 });
    }

    #[test]
    fn test_dimension_mismatch_is_error() {
        let set = support(&[("finch", &[&[1.0, 0.0, 0.0]])]);
        let err = SimilarityClassifier::score(&[1.0, 0.0], &set).unwrap_err();
        assert!(matches!(err, ClassifierError::DimensionMismatch { query: 2, exemplar: 3 }));
    }

    #[test]
    fn test_absent_class_never_predicted() {
        let set = support(&[("finch", &[&[1.0, 0.0]])]);
        let record =
            SimilarityClassifier::classify(&query("wren"), &[0.0, 1.0], &set, -1.0, true).unwrap();
        assert_ne!(record.predicted_class, "wren");
        assert!(!record.scores.contains_key("wren"));
    }
}
