//! Configuration management for Exemplar.
//!
//! Configuration is loaded from the platform config directory with sensible
//! defaults. Every section implements `Default`, so a partial file is valid.

mod types;
mod validate;

pub use types::*;
pub use validate::{validate_shot_counts, validate_thresholds};

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration structure for Exemplar.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Embedding backbone settings
    pub embedding: EmbeddingConfig,

    /// Processing settings
    pub processing: ProcessingConfig,

    /// Resource limits
    pub limits: LimitsConfig,

    /// Grid sweep settings
    pub experiment: ExperimentConfig,

    /// Output settings
    pub output: OutputConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Returns default configuration if the file doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default config file path.
    ///
    /// - macOS: ~/Library/Application Support/com.exemplar.exemplar/config.toml
    /// - Linux: ~/.config/exemplar/config.toml
    /// - Windows: C:\Users\<User>\AppData\Roaming\exemplar\config\config.toml
    ///
    /// Falls back to ~/.exemplar/config.toml if directory detection fails.
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("com", "exemplar", "exemplar")
            .map(|dirs| dirs.config_dir().to_path_buf().join("config.toml"))
            .unwrap_or_else(|| {
                let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
                PathBuf::from(home).join(".exemplar").join("config.toml")
            })
    }

    /// Get the resolved model directory path (with ~ expansion).
    pub fn model_dir(&self) -> PathBuf {
        let path_str = self.general.model_dir.to_string_lossy();
        let expanded = shellexpand::tilde(&path_str);
        PathBuf::from(expanded.into_owned())
    }

    /// Folder name used under `7.results/` for this run.
    pub fn model_label(&self) -> String {
        self.output
            .model_label
            .clone()
            .unwrap_or_else(|| self.embedding.model.clone())
    }

    /// Serialize the config to a pretty TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.processing.parallel_workers, 4);
        assert_eq!(config.experiment.seed, 42);
        assert_eq!(config.limits.max_file_size_mb, 100);
        assert!(config.experiment.group_unknown);
    }

    #[test]
    fn test_config_to_toml() {
        let config = Config::default();
        let toml = config.to_toml().unwrap();
        assert!(toml.contains("[experiment]"));
        assert!(toml.contains("[embedding]"));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[experiment]\nshot_counts = [1, 3]\nthresholds = [0.25]\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.experiment.shot_counts, vec![1, 3]);
        assert_eq!(config.experiment.thresholds, vec![0.25]);
        assert_eq!(config.experiment.seed, 42);
        assert_eq!(config.embedding.image_size, 224);
    }

    #[test]
    fn test_model_label_defaults_to_model_name() {
        let mut config = Config::default();
        assert_eq!(config.model_label(), "siglip-base-patch16");
        config.output.model_label = Some("siglip-run-2".to_string());
        assert_eq!(config.model_label(), "siglip-run-2");
    }
}
