//! Sub-configuration structs with their defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Directory where models are stored
    pub model_dir: PathBuf,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("~/.exemplar/models"),
        }
    }
}

/// Embedding backbone settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Model name; resolved as `{model_dir}/{model}/visual.onnx`
    pub model: String,

    /// Square input size in pixels. 224 for base, 384 for the 384 variant.
    pub image_size: u32,

    /// Name of the pooled embedding output tensor
    pub output_name: String,

    /// Per-channel normalization mean
    pub norm_mean: f32,

    /// Per-channel normalization std
    pub norm_std: f32,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "siglip-base-patch16".to_string(),
            image_size: 224,
            output_name: "pooler_output".to_string(),
            norm_mean: 0.5,
            norm_std: 0.5,
        }
    }
}

impl EmbeddingConfig {
    /// Resolve image size from model name.
    pub fn image_size_for_model(model: &str) -> u32 {
        if model.contains("384") {
            384
        } else {
            224
        }
    }
}

/// Processing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Number of concurrent embedding workers
    pub parallel_workers: usize,

    /// Image extensions picked up from the support pool and query corpus
    pub supported_formats: Vec<String>,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            parallel_workers: 4,
            supported_formats: ["jpg", "jpeg", "png", "webp", "bmp", "tif", "tiff"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// Resource limits to protect against problematic inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum file size in megabytes
    pub max_file_size_mb: u64,

    /// Maximum image dimension (width or height)
    pub max_image_dimension: u32,

    /// Per-image decode + embed timeout in milliseconds
    pub embed_timeout_ms: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_file_size_mb: 100,
            max_image_dimension: 10000,
            embed_timeout_ms: 30000,
        }
    }
}

/// Grid sweep settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    /// Exemplars per class, one grid row each
    pub shot_counts: Vec<usize>,

    /// Open-set rejection thresholds, one grid column each
    pub thresholds: Vec<f32>,

    /// Seed for support set sampling
    pub seed: u64,

    /// Fold every `unknown_*` ground truth into a single "unknown" reporting bucket
    pub group_unknown: bool,

    /// Copy query images into per-class folders under each cell
    pub visualize: bool,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            shot_counts: vec![1, 5, 10],
            thresholds: vec![0.5, 0.6, 0.7, 0.8, 0.9],
            seed: 42,
            group_unknown: true,
            visualize: false,
        }
    }
}

/// Output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Results folder name under `7.results/`. Defaults to the embedding model name.
    pub model_label: Option<String>,

    /// Write `summary.json` next to `summary.csv`
    pub write_json_summary: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            model_label: None,
            write_json_summary: true,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log format: "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
