//! Configuration validation with range checks.

use std::collections::HashSet;

use crate::dataset::layout::threshold_label;
use crate::dataset::registry::is_safe_component;
use crate::error::ConfigError;

use super::Config;

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.processing.parallel_workers == 0 {
            return Err(ConfigError::ValidationError(
                "processing.parallel_workers must be > 0".into(),
            ));
        }
        if self.processing.supported_formats.is_empty() {
            return Err(ConfigError::ValidationError(
                "processing.supported_formats must not be empty".into(),
            ));
        }
        if self.embedding.image_size == 0 {
            return Err(ConfigError::ValidationError(
                "embedding.image_size must be > 0".into(),
            ));
        }
        if self.embedding.norm_std <= 0.0 {
            return Err(ConfigError::ValidationError(
                "embedding.norm_std must be > 0".into(),
            ));
        }
        if self.limits.max_file_size_mb == 0 {
            return Err(ConfigError::ValidationError(
                "limits.max_file_size_mb must be > 0".into(),
            ));
        }
        if self.limits.max_image_dimension == 0 {
            return Err(ConfigError::ValidationError(
                "limits.max_image_dimension must be > 0".into(),
            ));
        }
        if self.limits.embed_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "limits.embed_timeout_ms must be > 0".into(),
            ));
        }
        validate_shot_counts(&self.experiment.shot_counts)?;
        validate_thresholds(&self.experiment.thresholds)?;

        let label = self.model_label();
        if !is_safe_component(&label) {
            return Err(ConfigError::ValidationError(format!(
                "results folder name {label:?} (output.model_label or embedding.model) \
                 must be a single folder name"
            )));
        }
        Ok(())
    }
}

/// Shot counts must be non-empty, strictly positive and distinct.
pub fn validate_shot_counts(shot_counts: &[usize]) -> Result<(), ConfigError> {
    if shot_counts.is_empty() {
        return Err(ConfigError::ValidationError(
            "experiment.shot_counts must not be empty".into(),
        ));
    }
    if shot_counts.contains(&0) {
        return Err(ConfigError::ValidationError(
            "experiment.shot_counts must all be > 0".into(),
        ));
    }
    let mut seen = HashSet::new();
    if let Some(dup) = shot_counts.iter().find(|k| !seen.insert(**k)) {
        return Err(ConfigError::ValidationError(format!(
            "experiment.shot_counts has duplicate value {dup}"
        )));
    }
    Ok(())
}

/// Thresholds must be non-empty, distinct and lie within the cosine range [-1, 1].
///
/// Two thresholds are duplicates when they name the same `threshold_<T>` folder.
pub fn validate_thresholds(thresholds: &[f32]) -> Result<(), ConfigError> {
    if thresholds.is_empty() {
        return Err(ConfigError::ValidationError(
            "experiment.thresholds must not be empty".into(),
        ));
    }
    if let Some(bad) = thresholds
        .iter()
        .find(|t| !t.is_finite() || **t < -1.0 || **t > 1.0)
    {
        return Err(ConfigError::ValidationError(format!(
            "experiment.thresholds must be between -1.0 and 1.0 (got {bad})"
        )));
    }
    let mut seen = HashSet::new();
    if let Some(dup) = thresholds.iter().find(|t| !seen.insert(threshold_label(**t))) {
        return Err(ConfigError::ValidationError(format!(
            "experiment.thresholds has duplicate value {dup}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_passes_validation() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_parallel_workers() {
        let mut config = Config::default();
        config.processing.parallel_workers = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("parallel_workers"));
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let mut config = Config::default();
        config.limits.embed_timeout_ms = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("embed_timeout_ms"));
    }

    #[test]
    fn test_validate_rejects_zero_shot() {
        let mut config = Config::default();
        config.experiment.shot_counts = vec![1, 0, 5];
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("shot_counts"));

        config.experiment.shot_counts.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_out_of_range_threshold() {
        let mut config = Config::default();
        config.experiment.thresholds = vec![0.3, 1.5];
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("thresholds"));

        config.experiment.thresholds = vec![f32::NAN];
        assert!(config.validate().is_err());

        config.experiment.thresholds = vec![-1.0, 1.0];
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_duplicate_axes() {
        let mut config = Config::default();
        config.experiment.shot_counts = vec![1, 5, 1];
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate value 1"));

        config.experiment.shot_counts = vec![1, 5];
        config.experiment.thresholds = vec![0.5, 0.7, 0.5];
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate value 0.5"));

        config.experiment.thresholds = vec![0.5, 0.7];
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_unsafe_model_label() {
        let mut config = Config::default();
        for bad in ["../x", "a/b", "..", "", ".hidden"] {
            config.output.model_label = Some(bad.to_string());
            assert!(config.validate().is_err(), "{bad:?} accepted");
        }
        config.output.model_label = Some("siglip-run 2".to_string());
        assert!(config.validate().is_ok());

        config.output.model_label = None;
        config.embedding.model = "../../models/siglip".to_string();
        assert!(config.validate().is_err());
    }
}
